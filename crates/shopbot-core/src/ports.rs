use async_trait::async_trait;

use crate::{
    domain::{BotState, CatalogItem, ChatMessage, ConversationSnapshot, NotifiedParty, Order, OrderStatus},
    Result,
};

/// Durable storage for conversation snapshots and orders.
///
/// Callers on the conversation path treat every failure as best-effort: they
/// log it and keep the in-memory state authoritative.
#[async_trait]
pub trait BotStore: Send + Sync {
    /// Insert or replace the snapshot for `snap.phone`.
    async fn save_conversation(&self, snap: &ConversationSnapshot) -> Result<()>;

    /// Persisted state of the most recent conversation for `phone`, if any.
    async fn conversation_status(&self, phone: &str) -> Result<Option<BotState>>;

    /// Append `msg` to the stored log for `phone`. `false` when nothing is
    /// stored for that phone.
    async fn append_message(&self, phone: &str, msg: &ChatMessage) -> Result<bool>;

    /// Every conversation not escalated or closed.
    async fn load_open_conversations(&self) -> Result<Vec<ConversationSnapshot>>;

    /// Allocate a unique order number.
    async fn next_order_number(&self) -> Result<String>;

    async fn insert_order(&self, order: &Order) -> Result<()>;

    async fn mark_order_notified(&self, order_number: &str, party: NotifiedParty) -> Result<()>;

    /// Newest first.
    async fn list_orders(&self, limit: usize) -> Result<Vec<Order>>;

    async fn get_order(&self, order_number: &str) -> Result<Option<Order>>;

    /// Returns the updated order, or `None` when no such order exists.
    async fn update_order_status(
        &self,
        order_number: &str,
        status: OrderStatus,
    ) -> Result<Option<Order>>;
}

/// Where the catalog cache gets its items from.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Up to `limit` active items, newest first.
    async fn fetch_active(&self, limit: usize) -> Result<Vec<CatalogItem>>;
}
