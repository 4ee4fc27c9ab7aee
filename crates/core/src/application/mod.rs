// Application Layer - Use Cases and Business Logic

pub mod commit_gate;
pub mod order_edit;

// Re-exports
pub use commit_gate::{commit_gate, CommitGate, CommitGateHandle, GateAbandoned};
pub use order_edit::{EditOutcome, EditSettings, LineResult, OrderEditService};
