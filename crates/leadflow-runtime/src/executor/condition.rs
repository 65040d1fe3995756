//! Condition executor: compares a lead attribute and picks a branch

use leadflow_core::{BranchLabel, ConditionSpec, ExecutionContext, LeadSnapshot, NodeExecutionError};
use tracing::debug;

use super::{Effect, NodeDispatcher, NodeOutcome};

/// Case-sensitive equality; a missing lead or field is `false`
pub fn evaluate(spec: &ConditionSpec, lead: Option<&LeadSnapshot>) -> BranchLabel {
    let matched = lead
        .and_then(|l| l.attribute(&spec.field))
        .map(|value| value == spec.equals)
        .unwrap_or(false);
    BranchLabel::from(matched)
}

pub(crate) async fn execute(
    dispatcher: &NodeDispatcher,
    node_id: &str,
    spec: &ConditionSpec,
    ctx: &ExecutionContext,
) -> Result<NodeOutcome, NodeExecutionError> {
    let lead = dispatcher.lookup_lead(node_id, ctx).await?;
    let branch = evaluate(spec, lead.as_ref());

    debug!(
        "Condition {}: {} == {:?} => {}",
        node_id, spec.field, spec.equals, branch
    );

    Ok(NodeOutcome::branch(
        Effect::ConditionEvaluated {
            field: spec.field.clone(),
            matched: branch == BranchLabel::True,
        },
        branch,
    ))
}
