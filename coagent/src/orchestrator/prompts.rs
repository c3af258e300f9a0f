//! Prompts used by the orchestrator's classification and synthesis calls.

/// Classification prompt: a structured JSON verdict, nothing else.
pub const CLASSIFICATION_PROMPT: &str = "You route user requests for an ERP copilot. \
Reply with ONE JSON object and no other text:\n\
{\"industry\": string|null, \"complexity\": \"simple\"|\"moderate\"|\"complex\", \
\"routing_decision\": \"direct\"|\"delegate\"|\"multi_industry\"|\"deep_research\", \
\"requires_subagents\": [string], \"confidence\": number}\n\
Use \"direct\" for requests the general toolset handles, \"delegate\" when one \
specialized agent fits better (name it in requires_subagents), \"multi_industry\" \
when several industries must contribute, and \"deep_research\" for analytical \
questions over historical data.";

/// Aggregation prompt for multi-industry synthesis.
pub const SYNTHESIS_PROMPT: &str = "You merge answers from several specialized agents \
into one coherent reply. Resolve overlaps, keep every concrete number and document \
name, and answer the user's original question directly.";
