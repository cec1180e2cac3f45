use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage of the lead behind a conversation.
///
/// Stages the backend adds later survive as `Other` instead of failing
/// deserialization of the whole page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LeadStatus {
    Inquiry,
    Contacted,
    PreQualified,
    Qualified,
    Applied,
    Admitted,
    Enrolled,
    NoLead,
    Other(String),
}

impl LeadStatus {
    pub fn as_str(&self) -> &str {
        match self {
            LeadStatus::Inquiry => "INQUIRY",
            LeadStatus::Contacted => "CONTACTED",
            LeadStatus::PreQualified => "PRE_QUALIFIED",
            LeadStatus::Qualified => "QUALIFIED",
            LeadStatus::Applied => "APPLIED",
            LeadStatus::Admitted => "ADMITTED",
            LeadStatus::Enrolled => "ENROLLED",
            LeadStatus::NoLead => "NO_LEAD",
            LeadStatus::Other(s) => s,
        }
    }
}

impl From<&str> for LeadStatus {
    fn from(value: &str) -> Self {
        let upper = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match upper.as_str() {
            "INQUIRY" => LeadStatus::Inquiry,
            "CONTACTED" => LeadStatus::Contacted,
            "PRE_QUALIFIED" | "PREQUALIFIED" => LeadStatus::PreQualified,
            "QUALIFIED" => LeadStatus::Qualified,
            "APPLIED" => LeadStatus::Applied,
            "ADMITTED" => LeadStatus::Admitted,
            "ENROLLED" => LeadStatus::Enrolled,
            "NO_LEAD" | "" => LeadStatus::NoLead,
            _ => LeadStatus::Other(upper),
        }
    }
}

impl From<String> for LeadStatus {
    fn from(value: String) -> Self {
        LeadStatus::from(value.as_str())
    }
}

impl From<LeadStatus> for String {
    fn from(value: LeadStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
