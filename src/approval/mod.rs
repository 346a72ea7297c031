pub mod store;
pub mod workflow;

pub use store::ApprovalStore;
pub use workflow::{ApprovedUser, Identity, JoinWorkflow, PendingRequest};
