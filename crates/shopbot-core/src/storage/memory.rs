use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    domain::{BotState, CatalogItem, ChatMessage, ConversationSnapshot, NotifiedParty, Order, OrderStatus},
    ports::{BotStore, ProductSource},
    storage::format_order_number,
    Error, Result,
};

#[derive(Default)]
struct Inner {
    conversations: HashMap<String, ConversationSnapshot>,
    orders: Vec<Order>,
    last_seq: u64,
    products: Vec<CatalogItem>,
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<CatalogItem>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                products,
                ..Inner::default()
            }),
        }
    }

    pub async fn set_products(&self, products: Vec<CatalogItem>) {
        self.inner.lock().await.products = products;
    }

    pub async fn conversation(&self, phone: &str) -> Option<ConversationSnapshot> {
        self.inner.lock().await.conversations.get(phone).cloned()
    }
}

#[async_trait]
impl BotStore for MemoryStore {
    async fn save_conversation(&self, snap: &ConversationSnapshot) -> Result<()> {
        self.inner
            .lock()
            .await
            .conversations
            .insert(snap.phone.clone(), snap.clone());
        Ok(())
    }

    async fn conversation_status(&self, phone: &str) -> Result<Option<BotState>> {
        Ok(self
            .inner
            .lock()
            .await
            .conversations
            .get(phone)
            .map(|s| s.status))
    }

    async fn append_message(&self, phone: &str, msg: &ChatMessage) -> Result<bool> {
        let mut st = self.inner.lock().await;
        let Some(snap) = st.conversations.get_mut(phone) else {
            return Ok(false);
        };
        snap.messages.push(msg.clone());
        snap.updated_at = msg.timestamp;
        Ok(true)
    }

    async fn load_open_conversations(&self) -> Result<Vec<ConversationSnapshot>> {
        Ok(self
            .inner
            .lock()
            .await
            .conversations
            .values()
            .filter(|s| !s.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn next_order_number(&self) -> Result<String> {
        let mut st = self.inner.lock().await;
        st.last_seq += 1;
        Ok(format_order_number(Utc::now(), st.last_seq))
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        self.inner.lock().await.orders.push(order.clone());
        Ok(())
    }

    async fn mark_order_notified(&self, order_number: &str, party: NotifiedParty) -> Result<()> {
        let mut st = self.inner.lock().await;
        let order = st
            .orders
            .iter_mut()
            .find(|o| o.order_number == order_number)
            .ok_or_else(|| Error::NotFound(format!("order {order_number}")))?;
        match party {
            NotifiedParty::Intermediary => order.notified_intermediary = true,
            NotifiedParty::Owner => order.notified_owner = true,
        }
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn list_orders(&self, limit: usize) -> Result<Vec<Order>> {
        let mut orders = self.inner.lock().await.orders.clone();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(limit);
        Ok(orders)
    }

    async fn get_order(&self, order_number: &str) -> Result<Option<Order>> {
        Ok(self
            .inner
            .lock()
            .await
            .orders
            .iter()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn update_order_status(
        &self,
        order_number: &str,
        status: OrderStatus,
    ) -> Result<Option<Order>> {
        let mut st = self.inner.lock().await;
        let Some(order) = st.orders.iter_mut().find(|o| o.order_number == order_number) else {
            return Ok(None);
        };
        order.status = status;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }
}

#[async_trait]
impl ProductSource for MemoryStore {
    async fn fetch_active(&self, limit: usize) -> Result<Vec<CatalogItem>> {
        Ok(self
            .inner
            .lock()
            .await
            .products
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }
}
