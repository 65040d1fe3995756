// Leadflow Runtime - Flow execution
//
// The runner walks a flow graph from a matched entry node and dispatches each
// node to its executor. Executors reach the outside world only through the
// ports in `leadflow_core::Ports`, each call bounded by the configured
// timeout. Lead mutations are serialised per lead by `LeadLocks`.

pub mod executor;
pub mod locks;
pub mod retry;
pub mod runner;

pub use executor::{Effect, NodeDispatcher, NodeOutcome};
pub use locks::{LeadGuard, LeadLocks};
pub use retry::RetryingSender;
pub use runner::{FlowRunner, NodeResult, NodeStatus, RunEvent, RunResult, RunStatus};
