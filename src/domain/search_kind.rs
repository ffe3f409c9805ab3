use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Jobs,
    Internships,
    Colleges,
}

impl SearchKind {
    pub const ALL: [SearchKind; 3] = [
        SearchKind::Jobs,
        SearchKind::Internships,
        SearchKind::Colleges,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Jobs => "jobs",
            SearchKind::Internships => "internships",
            SearchKind::Colleges => "colleges",
        }
    }

    /// Whether listings are scraped here before the webhook sees them.
    /// College searches hand the whole job to the external workflow.
    pub fn pre_scrapes(&self) -> bool {
        match self {
            SearchKind::Jobs | SearchKind::Internships => true,
            SearchKind::Colleges => false,
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown search kind: {}", s))
    }
}
