//! Leadflow Triggers - Inbound event intake
//!
//! Turns an inbound chat message into flow runs:
//!
//! 1. the `FlowStore` lists the tenant's enabled flows,
//! 2. each record is validated into a `Flow` (invalid ones are excluded),
//! 3. the `TriggerMatcher` picks `(flow, entry node)` pairs,
//! 4. every pair runs concurrently through the `FlowRunner`.
//!
//! `FlowRegistry` is a file-backed `FlowStore` for the CLI and tests.

pub mod handler;
pub mod matcher;
pub mod registry;

pub use handler::{ExcludedFlow, HandlerStats, InboundHandler, InboundReport, StatsSnapshot};
pub use matcher::{keyword_matches, FlowMatch, MatchReason, TriggerMatcher};
pub use registry::FlowRegistry;
