use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{extracted_record::ExtractedRecord, search_kind::SearchKind, search_request::SearchQuery};

/// The persisted unit, one per (user, kind).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub kind: SearchKind,
    pub timestamp: DateTime<Utc>,
    pub query: SearchQuery,
    pub scraped: Vec<ExtractedRecord>,
    pub external_response: Option<Value>,
    pub external_failed: bool,
}
