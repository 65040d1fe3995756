//! Message executor: sends the node's literal text to the lead

use leadflow_core::{ExecutionContext, NodeExecutionError, NodeFailure};
use tracing::{info, warn};

use super::{Effect, NodeDispatcher, NodeOutcome};

/// Text goes out verbatim; there is no templating
pub fn render(text: &str) -> String {
    text.to_string()
}

pub(crate) async fn execute(
    dispatcher: &NodeDispatcher,
    node_id: &str,
    text: &str,
    ctx: &ExecutionContext,
) -> Result<NodeOutcome, NodeExecutionError> {
    let lead = dispatcher
        .lookup_lead(node_id, ctx)
        .await?
        .ok_or_else(|| {
            NodeExecutionError::new(node_id, NodeFailure::LeadNotFound(ctx.lead_id().to_string()))
        })?;

    let address = lead
        .phone
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| {
            NodeExecutionError::new(node_id, NodeFailure::MissingAddress(ctx.lead_id().to_string()))
        })?;

    let text = render(text);
    let ports = dispatcher.ports();

    dispatcher
        .call_port(node_id, ports.sender.send(ctx.channel_id(), &address, &text))
        .await?;
    info!("Message node {} sent to lead {} on {}", node_id, ctx.lead_id(), ctx.channel_id());

    dispatcher
        .call_port(
            node_id,
            ports
                .message_log
                .record_outbound_message(ctx.channel_id(), ctx.lead_id(), &text),
        )
        .await
        .map_err(|e| {
            warn!(
                "Message node {} sent to {} but the log write failed: {}",
                node_id, address, e.cause
            );
            NodeExecutionError::new(
                node_id,
                NodeFailure::Unrecorded {
                    address: address.clone(),
                    cause: Box::new(e.cause),
                },
            )
        })?;

    Ok(NodeOutcome::done(Effect::MessageSent { address, text }))
}
