//! Built-in ERP tools: document reads/writes, reports, bulk writes, and the
//! hotel reference industry tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::erp::BulkItem;
use crate::error::GatewayError;

use super::{Tool, ToolContext, ToolRegistry, ToolSpec};

fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, GatewayError> {
    input
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidInput(format!("missing '{}'", key)))
}

struct SearchDocTool;

#[async_trait]
impl Tool for SearchDocTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "search_doc".into(),
            description: "Search ERP documents of a doctype with optional filters and fields"
                .into(),
            input_schema: json!({
                "type": "object",
                "required": ["doctype"],
                "properties": {
                    "doctype": {"type": "string"},
                    "filters": {"type": "object"},
                    "fields": {"type": "array", "items": {"type": "string"}},
                    "limit": {"type": "integer"}
                }
            }),
            industry: None,
        }
    }

    async fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value, GatewayError> {
        let doctype = required_str(&input, "doctype")?;
        let filters = input.get("filters").cloned().unwrap_or_else(|| json!({}));
        let limit = input.get("limit").and_then(Value::as_u64).map(|v| v as u32);
        ctx.erp
            .search(doctype, &filters, input.get("fields"), limit)
            .await
    }
}

struct GetDocTool;

#[async_trait]
impl Tool for GetDocTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_doc".into(),
            description: "Fetch one ERP document by doctype and name".into(),
            input_schema: json!({
                "type": "object",
                "required": ["doctype", "name"],
                "properties": {
                    "doctype": {"type": "string"},
                    "name": {"type": "string"}
                }
            }),
            industry: None,
        }
    }

    async fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value, GatewayError> {
        ctx.erp
            .get(required_str(&input, "doctype")?, required_str(&input, "name")?)
            .await
    }
}

struct CreateDocTool;

#[async_trait]
impl Tool for CreateDocTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "create_doc".into(),
            description: "Create a new ERP document".into(),
            input_schema: json!({
                "type": "object",
                "required": ["doctype", "data"],
                "properties": {
                    "doctype": {"type": "string"},
                    "data": {"type": "object"}
                }
            }),
            industry: None,
        }
    }

    async fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value, GatewayError> {
        let doctype = required_str(&input, "doctype")?;
        let data = input
            .get("data")
            .ok_or_else(|| GatewayError::InvalidInput("missing 'data'".into()))?;
        ctx.erp.create(doctype, data).await
    }
}

struct UpdateDocTool;

#[async_trait]
impl Tool for UpdateDocTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "update_doc".into(),
            description: "Update fields of an existing ERP document".into(),
            input_schema: json!({
                "type": "object",
                "required": ["doctype", "name", "data"],
                "properties": {
                    "doctype": {"type": "string"},
                    "name": {"type": "string"},
                    "data": {"type": "object"}
                }
            }),
            industry: None,
        }
    }

    async fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value, GatewayError> {
        let doctype = required_str(&input, "doctype")?;
        let name = required_str(&input, "name")?;
        let data = input
            .get("data")
            .ok_or_else(|| GatewayError::InvalidInput("missing 'data'".into()))?;
        ctx.erp.update(doctype, name, data).await
    }
}

struct SubmitDocTool;

#[async_trait]
impl Tool for SubmitDocTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "submit_doc".into(),
            description: "Submit a draft ERP document, finalizing it".into(),
            input_schema: json!({
                "type": "object",
                "required": ["doctype", "name"],
                "properties": {
                    "doctype": {"type": "string"},
                    "name": {"type": "string"}
                }
            }),
            industry: None,
        }
    }

    async fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value, GatewayError> {
        ctx.erp
            .submit(required_str(&input, "doctype")?, required_str(&input, "name")?)
            .await
    }
}

struct CancelDocTool;

#[async_trait]
impl Tool for CancelDocTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "cancel_doc".into(),
            description: "Cancel a submitted ERP document".into(),
            input_schema: json!({
                "type": "object",
                "required": ["doctype", "name"],
                "properties": {
                    "doctype": {"type": "string"},
                    "name": {"type": "string"}
                }
            }),
            industry: None,
        }
    }

    async fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value, GatewayError> {
        ctx.erp
            .cancel(required_str(&input, "doctype")?, required_str(&input, "name")?)
            .await
    }
}

struct RunReportTool;

#[async_trait]
impl Tool for RunReportTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "run_report".into(),
            description: "Run a named ERP report with filters".into(),
            input_schema: json!({
                "type": "object",
                "required": ["report_name"],
                "properties": {
                    "report_name": {"type": "string"},
                    "filters": {"type": "object"}
                }
            }),
            industry: None,
        }
    }

    async fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value, GatewayError> {
        let report_name = required_str(&input, "report_name")?;
        let filters = input.get("filters").cloned().unwrap_or_else(|| json!({}));
        ctx.erp.run_report(report_name, &filters).await
    }
}

struct BulkUpdateTool;

#[async_trait]
impl Tool for BulkUpdateTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "bulk_update".into(),
            description: "Update many documents of one doctype in a single batch".into(),
            input_schema: json!({
                "type": "object",
                "required": ["doctype", "updates"],
                "properties": {
                    "doctype": {"type": "string"},
                    "updates": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["name", "data"],
                            "properties": {
                                "name": {"type": "string"},
                                "data": {"type": "object"}
                            }
                        }
                    }
                }
            }),
            industry: None,
        }
    }

    async fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value, GatewayError> {
        let doctype = required_str(&input, "doctype")?;
        let updates: Vec<BulkItem> = serde_json::from_value(
            input.get("updates").cloned().unwrap_or_else(|| json!([])),
        )
        .map_err(|e| GatewayError::InvalidInput(format!("bad updates array: {}", e)))?;
        let outcome = ctx.erp.bulk_update(doctype, &updates).await?;
        serde_json::to_value(outcome)
            .map_err(|e| GatewayError::Internal(format!("bulk result serialization: {}", e)))
    }
}

/// Hotel industry reference tool: available rooms for a stay window.
struct RoomAvailabilityTool;

#[async_trait]
impl Tool for RoomAvailabilityTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "room_availability".into(),
            description: "List available hotel rooms for a date range and guest count".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "check_in": {"type": "string"},
                    "check_out": {"type": "string"},
                    "guests": {"type": "integer"}
                }
            }),
            industry: Some("hotel".into()),
        }
    }

    async fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value, GatewayError> {
        let mut filters = json!({"status": "Available"});
        if let Some(guests) = input.get("guests").and_then(Value::as_u64) {
            filters["capacity"] = json!([">=", guests]);
        }
        let rooms = ctx
            .erp
            .search("Room", &filters, Some(&json!(["name", "room_type", "rate"])), None)
            .await?;
        Ok(json!({
            "available_rooms": rooms,
            "check_in": input.get("check_in"),
            "check_out": input.get("check_out"),
        }))
    }
}

/// Registers the common ERP tools and the hotel reference tool.
pub fn register_erp_tools(registry: &mut ToolRegistry) {
    registry.register(Arc::new(SearchDocTool));
    registry.register(Arc::new(GetDocTool));
    registry.register(Arc::new(CreateDocTool));
    registry.register(Arc::new(UpdateDocTool));
    registry.register(Arc::new(SubmitDocTool));
    registry.register(Arc::new(CancelDocTool));
    registry.register(Arc::new(RunReportTool));
    registry.register(Arc::new(BulkUpdateTool));
    registry.register(Arc::new(RoomAvailabilityTool));
}
