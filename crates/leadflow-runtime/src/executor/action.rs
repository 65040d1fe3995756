//! Action executor: lead mutations
//!
//! `add_tag` is a read-modify-write on the lead's tag set and runs under the
//! lead's lock so concurrent runs for the same lead cannot lose updates.

use leadflow_core::{ActionKind, ExecutionContext, NodeExecutionError, NodeFailure};
use tracing::{debug, info};

use super::{Effect, NodeDispatcher, NodeOutcome};

/// New tag set, or `None` when the tag is already present
pub fn plan_add_tag(current: &[String], tag: &str) -> Option<Vec<String>> {
    if current.iter().any(|t| t == tag) {
        return None;
    }
    let mut tags = current.to_vec();
    tags.push(tag.to_string());
    Some(tags)
}

pub(crate) async fn execute(
    dispatcher: &NodeDispatcher,
    node_id: &str,
    action: &ActionKind,
    ctx: &ExecutionContext,
) -> Result<NodeOutcome, NodeExecutionError> {
    match action {
        ActionKind::AddTag { tag } => add_tag(dispatcher, node_id, tag, ctx).await,
        ActionKind::Unknown { action } => Ok(NodeOutcome::skipped(format!(
            "unknown action kind '{}'",
            action
        ))),
    }
}

async fn add_tag(
    dispatcher: &NodeDispatcher,
    node_id: &str,
    tag: &str,
    ctx: &ExecutionContext,
) -> Result<NodeOutcome, NodeExecutionError> {
    let _guard = dispatcher.locks().lock(ctx.lead_id()).await;

    let lead = dispatcher
        .lookup_lead(node_id, ctx)
        .await?
        .ok_or_else(|| {
            NodeExecutionError::new(node_id, NodeFailure::LeadNotFound(ctx.lead_id().to_string()))
        })?;

    let Some(tags) = plan_add_tag(&lead.tags, tag) else {
        debug!("Lead {} already tagged '{}'", ctx.lead_id(), tag);
        return Ok(NodeOutcome::done(Effect::TagAlreadyPresent {
            tag: tag.to_string(),
        }));
    };

    dispatcher
        .call_port(
            node_id,
            dispatcher.ports().mutations.set_tags(ctx.lead_id(), &tags),
        )
        .await?;
    info!("Action {} tagged lead {} with '{}'", node_id, ctx.lead_id(), tag);

    Ok(NodeOutcome::done(Effect::TagAdded {
        tag: tag.to_string(),
    }))
}
