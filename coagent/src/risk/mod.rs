//! Risk classification for proposed tool invocations.
//!
//! A pure function over three signals, combined by maximum: operation kind,
//! field sensitivity, and scope. Identical inputs always yield identical
//! assessments; nothing here is stored.

use serde_json::Value;

/// Computed risk level of a proposed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// The assessment handed to the approval gate.
#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub requires_approval: bool,
    pub reasoning: String,
}

/// Deployment-configurable approval threshold.
#[derive(Debug, Clone, Copy)]
pub struct RiskThresholds {
    /// Levels at or above this require approval.
    pub approval_at: RiskLevel,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            approval_at: RiskLevel::Medium,
        }
    }
}

const READ_TOOLS: &[&str] = &[
    "search_doc",
    "get_doc",
    "run_report",
    "room_availability",
];

const SUBMIT_TOOLS: &[&str] = &["submit_doc", "cancel_doc"];

const WRITE_TOOLS: &[&str] = &["create_doc", "update_doc", "bulk_update"];

/// Fields whose mutation always marks an invocation high-risk: money, status
/// and link fields.
const SENSITIVE_FIELDS: &[&str] = &[
    "amount",
    "rate",
    "price",
    "total",
    "grand_total",
    "paid_amount",
    "outstanding_amount",
    "status",
    "docstatus",
    "workflow_state",
    "customer",
    "supplier",
    "party",
    "account",
];

/// Fields considered annotation-only.
const NOTE_FIELDS: &[&str] = &["note", "notes", "description", "comment", "remarks"];

fn operation_signal(tool_name: &str, document_state: Option<&str>) -> (RiskLevel, &'static str) {
    if matches!(document_state, Some("submitted") | Some("cancelled")) {
        return (RiskLevel::High, "operation on a submitted or cancelled document");
    }
    if READ_TOOLS.contains(&tool_name) {
        (RiskLevel::Low, "read-only operation")
    } else if SUBMIT_TOOLS.contains(&tool_name) {
        (RiskLevel::High, "submit or cancel changes document lifecycle")
    } else if WRITE_TOOLS.contains(&tool_name) {
        (RiskLevel::Medium, "write on a draft document")
    } else if tool_name == "execute_workflow_graph" {
        // Workflows carry their own approval gates.
        (RiskLevel::Low, "workflow invocation gated by its own approval nodes")
    } else {
        (RiskLevel::Medium, "unrecognized operation")
    }
}

fn field_signal(input: &Value) -> (RiskLevel, &'static str) {
    let Some(data) = input.get("data").and_then(Value::as_object) else {
        return (RiskLevel::Low, "no fields touched");
    };
    if data.is_empty() {
        return (RiskLevel::Low, "no fields touched");
    }
    if data.keys().any(|k| SENSITIVE_FIELDS.contains(&k.as_str())) {
        return (
            RiskLevel::High,
            "touches financial, status or relationship fields",
        );
    }
    if data.keys().all(|k| NOTE_FIELDS.contains(&k.as_str())) {
        return (RiskLevel::Low, "touches note fields only");
    }
    (RiskLevel::Medium, "touches general business fields")
}

fn scope_signal(tool_name: &str, input: &Value) -> (RiskLevel, String) {
    if tool_name == "bulk_update" {
        let count = input
            .get("updates")
            .and_then(Value::as_array)
            .map(|a| a.len())
            .unwrap_or(0);
        return match count {
            0..=1 => (RiskLevel::Low, format!("{} document", count)),
            2..=10 => (RiskLevel::Medium, format!("{} documents", count)),
            _ => (RiskLevel::High, format!("{} documents", count)),
        };
    }
    let is_write = WRITE_TOOLS.contains(&tool_name) || SUBMIT_TOOLS.contains(&tool_name);
    let has_name = input.get("name").is_some() || input.get("data").is_some();
    if is_write && !has_name && input.get("filters").is_some() {
        return (RiskLevel::High, "write across a filtered doctype".to_string());
    }
    (RiskLevel::Low, "single document".to_string())
}

/// Classifies one proposed invocation. Deterministic and side-effect-free.
pub fn assess(
    tool_name: &str,
    input: &Value,
    document_state: Option<&str>,
    thresholds: &RiskThresholds,
) -> RiskAssessment {
    let (op_level, op_reason) = operation_signal(tool_name, document_state);
    let (field_level, field_reason) = field_signal(input);
    let (scope_level, scope_reason) = scope_signal(tool_name, input);

    let level = op_level.max(field_level).max(scope_level);
    let reasoning = format!(
        "operation: {}; fields: {}; scope: {}",
        op_reason, field_reason, scope_reason
    );

    RiskAssessment {
        level,
        requires_approval: level >= thresholds.approval_at,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn default_assess(tool: &str, input: Value) -> RiskAssessment {
        assess(tool, &input, None, &RiskThresholds::default())
    }

    /// **Scenario**: Reads are low risk and need no approval.
    #[test]
    fn reads_are_low() {
        let a = default_assess("search_doc", json!({"doctype": "Room", "filters": {}}));
        assert_eq!(a.level, RiskLevel::Low);
        assert!(!a.requires_approval);
    }

    /// **Scenario**: Creating a draft with general fields is medium and
    /// requires approval at the default threshold.
    #[test]
    fn create_draft_is_medium() {
        let a = default_assess(
            "create_doc",
            json!({"doctype": "Reservation", "data": {"guest_name": "John", "room": "101"}}),
        );
        assert_eq!(a.level, RiskLevel::Medium);
        assert!(a.requires_approval);
    }

    /// **Scenario**: Note-only updates stay low even though update_doc is a write.
    #[test]
    fn note_only_update_is_medium_by_operation() {
        let a = default_assess(
            "update_doc",
            json!({"doctype": "Reservation", "name": "R1", "data": {"note": "late checkout"}}),
        );
        // Operation signal keeps the write at medium; fields alone would be low.
        assert_eq!(a.level, RiskLevel::Medium);
    }

    /// **Scenario**: Financial fields force high risk.
    #[test]
    fn financial_fields_are_high() {
        let a = default_assess(
            "update_doc",
            json!({"doctype": "Invoice", "name": "I1", "data": {"grand_total": 990}}),
        );
        assert_eq!(a.level, RiskLevel::High);
        assert!(a.requires_approval);
        assert!(a.reasoning.contains("financial"));
    }

    /// **Scenario**: Submit and cancel are high, as is any op on a submitted doc.
    #[test]
    fn lifecycle_operations_are_high() {
        let a = default_assess("submit_doc", json!({"doctype": "Invoice", "name": "I1"}));
        assert_eq!(a.level, RiskLevel::High);

        let a = assess(
            "update_doc",
            &json!({"doctype": "Invoice", "name": "I1", "data": {"note": "x"}}),
            Some("submitted"),
            &RiskThresholds::default(),
        );
        assert_eq!(a.level, RiskLevel::High);
    }

    /// **Scenario**: Bulk scope escalates with the batch size.
    #[test]
    fn bulk_scope_escalates() {
        let small = default_assess(
            "bulk_update",
            json!({"doctype": "Room", "updates": [{"name": "101", "data": {"floor": 1}}]}),
        );
        assert_eq!(small.level, RiskLevel::Medium); // operation signal

        let medium = default_assess(
            "bulk_update",
            json!({"doctype": "Room", "updates": (0..5).map(|i| json!({"name": i.to_string(), "data": {}})).collect::<Vec<_>>()}),
        );
        assert_eq!(medium.level, RiskLevel::Medium);

        let large = default_assess(
            "bulk_update",
            json!({"doctype": "Room", "updates": (0..11).map(|i| json!({"name": i.to_string(), "data": {}})).collect::<Vec<_>>()}),
        );
        assert_eq!(large.level, RiskLevel::High);
    }

    /// **Scenario**: Identical inputs always yield identical assessments.
    #[test]
    fn assessment_is_deterministic() {
        let input = json!({"doctype": "Invoice", "name": "I1", "data": {"status": "Paid"}});
        let a = default_assess("update_doc", input.clone());
        let b = default_assess("update_doc", input);
        assert_eq!(a.level, b.level);
        assert_eq!(a.requires_approval, b.requires_approval);
        assert_eq!(a.reasoning, b.reasoning);
    }

    /// **Scenario**: A raised threshold stops medium writes from gating.
    #[test]
    fn threshold_is_configurable() {
        let thresholds = RiskThresholds {
            approval_at: RiskLevel::High,
        };
        let a = assess(
            "create_doc",
            &json!({"doctype": "Reservation", "data": {"guest_name": "John"}}),
            None,
            &thresholds,
        );
        assert_eq!(a.level, RiskLevel::Medium);
        assert!(!a.requires_approval);
    }
}
