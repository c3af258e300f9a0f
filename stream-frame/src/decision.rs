//! Approval decision normalization at the API boundary.
//!
//! Clients encode decisions as a boolean or a string tag (some runtimes
//! cannot carry a literal false). Everything downstream of the HTTP layer
//! sees only the canonical enum.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Canonical approval decision for prompts and workflow interrupts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Cancelled,
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalDecision::Approved)
    }

    /// Parses the accepted wire encodings. `true`/`"approve"`/`"approved"`/
    /// `"APPROVED"` approve; `false`/`"cancel"`/`"cancelled"`/`"reject"` cancel.
    pub fn parse(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(true) => Some(ApprovalDecision::Approved),
            serde_json::Value::Bool(false) => Some(ApprovalDecision::Cancelled),
            serde_json::Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "approve" | "approved" | "yes" | "true" => Some(ApprovalDecision::Approved),
                "cancel" | "cancelled" | "reject" | "rejected" | "no" | "false" => {
                    Some(ApprovalDecision::Cancelled)
                }
                _ => None,
            },
            _ => None,
        }
    }
}

impl Serialize for ApprovalDecision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ApprovalDecision::Approved => serializer.serialize_str("approve"),
            ApprovalDecision::Cancelled => serializer.serialize_str("cancel"),
        }
    }
}

impl<'de> Deserialize<'de> for ApprovalDecision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        ApprovalDecision::parse(&value)
            .ok_or_else(|| de::Error::custom(format!("unrecognized decision: {}", value)))
    }
}
