//! Leadflow Memory - In-memory implementations of the engine's ports
//!
//! These backends keep everything in process memory. They back the test
//! suites and `leadflowctl simulate`; production hosts implement the port
//! traits over their own database and channel client.
//!
//! ## Backends
//!
//! - **InMemoryLeadStore**: lead lookup + tag mutation over a `DashMap`
//! - **InMemoryMessageLog**: append-only outbound message history
//! - **RecordingSender**: captures sends, with failure and latency injection
//!
//! ## Usage
//!
//! ```rust,no_run
//! use leadflow_memory::InMemoryPorts;
//!
//! let ports = InMemoryPorts::new();
//! let bundle = ports.ports();
//! ```

pub mod backend;

pub use backend::leads::InMemoryLeadStore;
pub use backend::messages::{InMemoryMessageLog, OutboundRecord, RecordingSender, SentMessage};
pub use backend::InMemoryPorts;
