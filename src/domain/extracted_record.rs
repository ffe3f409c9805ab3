use serde::{Deserialize, Serialize};

/// One listing card as read off a results page. Every field is best effort
/// except `raw_text`, which always carries the card's visible text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    pub title: String,
    pub organization: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub raw_text: String,
}
