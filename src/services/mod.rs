/// AVRCP target player list and browse tree
pub mod avrcp;
/// Common utilities shared by services
pub mod common;

pub use avrcp::{AvrcpTargetService, TargetError, TargetUpdate};
