//! Reusable workflow nodes: approval gates, retry wrappers, escalation and
//! notification.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use stream_frame::ApprovalDecision;

use crate::error::GatewayError;
use crate::graph::{interrupt, Command, Node, NodeContext, RetryPolicy, WorkflowState};

/// Renders `{field}` placeholders from state into a preview template.
fn render_template(template: &str, state: &WorkflowState) -> String {
    let mut out = template.to_string();
    for (key, value) in state.as_map() {
        let placeholder = format!("{{{}}}", key);
        if out.contains(&placeholder) {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out = out.replace(&placeholder, &text);
        }
    }
    out
}

/// Approval gate: interrupts with an operation + preview payload, stores the
/// decision under `decision_field` and continues along the declared
/// conditional edges (which route on that field).
pub struct ApprovalNode {
    id: String,
    operation: String,
    preview_template: String,
    decision_field: String,
}

impl ApprovalNode {
    pub fn new(
        id: impl Into<String>,
        operation: impl Into<String>,
        preview_template: impl Into<String>,
        decision_field: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            operation: operation.into(),
            preview_template: preview_template.into(),
            decision_field: decision_field.into(),
        }
    }

    /// Router for this gate's conditional edges: `approved` / `rejected`.
    pub fn router(decision_field: &str) -> crate::graph::RouterFn {
        let field = decision_field.to_string();
        Arc::new(move |state: &WorkflowState| {
            if state.get_bool(&field) == Some(true) {
                "approved".to_string()
            } else {
                "rejected".to_string()
            }
        })
    }
}

#[async_trait]
impl Node for ApprovalNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: WorkflowState, ctx: &NodeContext) -> Result<Command, GatewayError> {
        let preview = render_template(&self.preview_template, &state);
        let payload = json!({
            "operation": self.operation,
            "preview": preview,
            "node": self.id,
        });
        let decision = interrupt(ctx, payload)?;
        let approved = ApprovalDecision::parse(&decision)
            .map(|d| d.is_approved())
            .unwrap_or(false);
        Ok(Command::next().with(&self.decision_field, json!(approved)))
    }
}

/// Retry wrapper: runs the inner node, retrying transient failures with the
/// policy's backoff. On success the inner command passes through (flagged
/// `retry_exhausted: false`); on exhaustion the node continues with
/// `retry_exhausted: true` and the failure message, so the declared
/// conditional edges can route to an escalation target.
pub struct RetryNode {
    id: String,
    inner: Arc<dyn Node>,
    policy: RetryPolicy,
}

impl RetryNode {
    pub fn new(id: impl Into<String>, inner: Arc<dyn Node>, policy: RetryPolicy) -> Self {
        Self {
            id: id.into(),
            inner,
            policy,
        }
    }

    /// Router for the wrapper's conditional edges: `ok` / `escalate`.
    pub fn router() -> crate::graph::RouterFn {
        Arc::new(|state: &WorkflowState| {
            if state.get_bool("retry_exhausted") == Some(true) {
                "escalate".to_string()
            } else {
                "ok".to_string()
            }
        })
    }
}

#[async_trait]
impl Node for RetryNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: WorkflowState, ctx: &NodeContext) -> Result<Command, GatewayError> {
        let mut attempt = 0;
        loop {
            match self.inner.run(state.clone(), ctx).await {
                Ok(command) => {
                    return Ok(command.with("retry_exhausted", json!(false)));
                }
                Err(GatewayError::Interrupted(i)) => return Err(GatewayError::Interrupted(i)),
                Err(e) if e.is_transient() => {
                    if self.policy.should_retry(attempt) {
                        let delay = self.policy.delay(attempt);
                        tracing::debug!(
                            node = %self.id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying after transient failure"
                        );
                        if delay > std::time::Duration::ZERO {
                            tokio::time::sleep(delay).await;
                        }
                        attempt += 1;
                        continue;
                    }
                    tracing::warn!(node = %self.id, attempts = attempt + 1, "retries exhausted");
                    return Ok(Command::next()
                        .with("retry_exhausted", json!(true))
                        .with("last_error", json!(e.to_string())));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// External notification sink for escalations.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &Value) -> Result<(), GatewayError>;
}

/// Default notifier: structured log lines only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &Value) -> Result<(), GatewayError> {
        tracing::warn!(subject, body = %body, "workflow notification");
        Ok(())
    }
}

/// Escalation: notifies a human and continues to the declared
/// human-intervention terminal. The instance stays resumable.
pub struct EscalateNode {
    id: String,
    notifier: Arc<dyn Notifier>,
    subject: String,
}

impl EscalateNode {
    pub fn new(id: impl Into<String>, notifier: Arc<dyn Notifier>, subject: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            notifier,
            subject: subject.into(),
        }
    }
}

#[async_trait]
impl Node for EscalateNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: WorkflowState, _ctx: &NodeContext) -> Result<Command, GatewayError> {
        let body = json!({
            "state": state.summary(),
            "last_error": state.get("last_error"),
        });
        self.notifier.notify(&self.subject, &body).await?;
        Ok(Command::next().with("escalated", json!(true)))
    }
}

/// Plain notification step; template placeholders render from state.
pub struct NotifyNode {
    id: String,
    notifier: Arc<dyn Notifier>,
    subject: String,
    message_template: String,
}

impl NotifyNode {
    pub fn new(
        id: impl Into<String>,
        notifier: Arc<dyn Notifier>,
        subject: impl Into<String>,
        message_template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            notifier,
            subject: subject.into(),
            message_template: message_template.into(),
        }
    }
}

#[async_trait]
impl Node for NotifyNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: WorkflowState, _ctx: &NodeContext) -> Result<Command, GatewayError> {
        let message = render_template(&self.message_template, &state);
        self.notifier
            .notify(&self.subject, &json!({"message": message}))
            .await?;
        Ok(Command::next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyNode {
        failures: Arc<AtomicUsize>,
        fail_until: usize,
    }

    #[async_trait]
    impl Node for FlakyNode {
        fn id(&self) -> &str {
            "flaky"
        }
        async fn run(
            &self,
            _state: WorkflowState,
            _ctx: &NodeContext,
        ) -> Result<Command, GatewayError> {
            let seen = self.failures.fetch_add(1, Ordering::SeqCst);
            if seen < self.fail_until {
                Err(GatewayError::ErpTransient("stock service timeout".into()))
            } else {
                Ok(Command::next().with("stock_reserved", json!(true)))
            }
        }
    }

    fn state_with(pairs: &[(&str, Value)]) -> WorkflowState {
        let map: serde_json::Map<String, Value> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        WorkflowState::from(map)
    }

    /// **Scenario**: The approval gate interrupts with a rendered preview,
    /// then stores the normalized decision on re-entry.
    #[tokio::test]
    async fn approval_gate_interrupts_then_records() {
        let node = ApprovalNode::new(
            "approve_folio",
            "open_folio",
            "Open folio for guest {guest_name}",
            "folio_approved",
        );
        let state = state_with(&[("guest_name", json!("Jane"))]);

        let err = node.run(state.clone(), &NodeContext::default()).await.unwrap_err();
        let GatewayError::Interrupted(i) = err else {
            panic!("expected interrupt")
        };
        assert_eq!(i.value["preview"], "Open folio for guest Jane");

        let cmd = node
            .run(state.clone(), &NodeContext::with_resume(json!("APPROVED")))
            .await
            .unwrap();
        assert_eq!(cmd.update["folio_approved"], json!(true));

        let cmd = node
            .run(state, &NodeContext::with_resume(json!(false)))
            .await
            .unwrap();
        assert_eq!(cmd.update["folio_approved"], json!(false));
    }

    /// **Scenario**: The retry wrapper retries transient failures and passes
    /// the inner command through on success.
    #[tokio::test]
    async fn retry_recovers_transient_failures() {
        let failures = Arc::new(AtomicUsize::new(0));
        let node = RetryNode::new(
            "reserve_stock",
            Arc::new(FlakyNode {
                failures: failures.clone(),
                fail_until: 2,
            }),
            RetryPolicy::exponential(
                3,
                std::time::Duration::from_millis(1),
                std::time::Duration::from_millis(4),
            ),
        );
        let cmd = node
            .run(WorkflowState::default(), &NodeContext::default())
            .await
            .unwrap();
        assert_eq!(failures.load(Ordering::SeqCst), 3);
        assert_eq!(cmd.update["stock_reserved"], json!(true));
        assert_eq!(cmd.update["retry_exhausted"], json!(false));
    }

    /// **Scenario**: Exhausted retries flag the state for escalation routing
    /// instead of failing the instance.
    #[tokio::test]
    async fn retry_exhaustion_routes_to_escalation() {
        let failures = Arc::new(AtomicUsize::new(0));
        let node = RetryNode::new(
            "reserve_stock",
            Arc::new(FlakyNode {
                failures: failures.clone(),
                fail_until: 10,
            }),
            RetryPolicy::fixed(2, std::time::Duration::from_millis(1)),
        );
        let cmd = node
            .run(WorkflowState::default(), &NodeContext::default())
            .await
            .unwrap();
        assert_eq!(failures.load(Ordering::SeqCst), 3);
        assert_eq!(cmd.update["retry_exhausted"], json!(true));
        assert!(cmd.update["last_error"].as_str().unwrap().contains("timeout"));

        let router = RetryNode::router();
        let routed = (router.as_ref())(&state_with(&[("retry_exhausted", json!(true))]));
        assert_eq!(routed, "escalate");
    }

    /// **Scenario**: Escalation notifies with the state summary attached.
    #[tokio::test]
    async fn escalate_notifies() {
        struct Recording(std::sync::Mutex<Vec<(String, Value)>>);

        #[async_trait]
        impl Notifier for Recording {
            async fn notify(&self, subject: &str, body: &Value) -> Result<(), GatewayError> {
                self.0.lock().unwrap().push((subject.to_string(), body.clone()));
                Ok(())
            }
        }

        let notifier = Arc::new(Recording(std::sync::Mutex::new(Vec::new())));
        let node = EscalateNode::new("escalate", notifier.clone(), "stock reservation failed");
        let cmd = node
            .run(
                state_with(&[("order_id", json!("SO-1")), ("last_error", json!("timeout"))]),
                &NodeContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(cmd.update["escalated"], json!(true));

        let sent = notifier.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "stock reservation failed");
        assert_eq!(sent[0].1["state"]["order_id"], "SO-1");
    }
}
