//! `BotStore` / `ProductSource` implementations.

mod json;
mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

/// `WA-YYYYMMDD-NNNN`; the sequence is global so numbers never repeat.
pub(crate) fn format_order_number(now: DateTime<Utc>, seq: u64) -> String {
    format!("WA-{}-{seq:04}", now.format("%Y%m%d"))
}
