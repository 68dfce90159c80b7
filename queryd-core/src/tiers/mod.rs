//! Tier Processors (spec §4.9, C9): the tier-specific executors dispatched
//! by the router once a query has been classified.

pub mod tier1;
pub mod tier2;
pub mod tier3;

use queryd_commons::Usage;

use crate::types::{Response, ResponseContent, ResponseMetadata, ResponseType};

/// Build a plain-text response shared by the scaffolding the tiers have in
/// common; tier-specific fields (agent, provider, cost) are filled in by
/// each tier.
pub(crate) fn text_response(
    query_id: &str,
    response_type: ResponseType,
    text: String,
    agent_used: &str,
    provider: &str,
    token_usage: Usage,
    cost: f64,
    tools: Vec<String>,
) -> Response {
    Response {
        id: format!("resp-{query_id}"),
        query_id: query_id.to_string(),
        response_type,
        content: ResponseContent {
            text,
            code: None,
            search_hits: Vec::new(),
        },
        agent_used: agent_used.to_string(),
        provider: provider.to_string(),
        token_usage,
        cost,
        metadata: ResponseMetadata {
            tools,
            ..Default::default()
        },
    }
}
