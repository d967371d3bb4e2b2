//! Outbound gateway port and the message shapes that cross it.

pub mod port;
pub mod types;
