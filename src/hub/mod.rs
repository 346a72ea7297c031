pub mod actor;

pub use actor::{ConnectionId, Hub, HubHandle, OutboundSender};
