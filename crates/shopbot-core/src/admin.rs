//! Read models and order operations behind the administrative HTTP surface.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    catalog::CatalogCache,
    conversation::ConversationStore,
    domain::{BotState, CartLine, ChatMessage, Order, OrderStatus, Session, Style},
    ports::BotStore,
    Error, Result,
};

pub const ORDER_LIST_LIMIT: usize = 50;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StyleCounts {
    pub urbano: usize,
    pub clasico: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BotMetrics {
    pub total: usize,
    pub active: usize,
    pub escalated: usize,
    pub by_style: StyleCounts,
    pub catalog_size: usize,
}

pub async fn metrics(conversations: &ConversationStore, catalog: &CatalogCache) -> BotMetrics {
    let sessions = conversations.list_all().await;
    let mut m = BotMetrics {
        total: sessions.len(),
        catalog_size: catalog.len(),
        ..BotMetrics::default()
    };
    for s in &sessions {
        if s.state != BotState::Closed {
            m.active += 1;
        }
        if s.state == BotState::Escalate {
            m.escalated += 1;
        }
        match s.style {
            Some(Style::Urban) => m.by_style.urbano += 1,
            Some(Style::Classic) => m.by_style.clasico += 1,
            None => {}
        }
    }
    m
}

/// Full state of one conversation, as shown to operators.
#[derive(Clone, Debug, Serialize)]
pub struct SessionView {
    pub phone: String,
    pub state: BotState,
    pub customer_name: String,
    pub style: Option<Style>,
    pub budget: String,
    pub cart: Vec<CartLine>,
    pub cart_total: Decimal,
    pub pending_selection: Option<String>,
    pub message_count: usize,
    pub messages: Vec<ChatMessage>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
}

impl From<Session> for SessionView {
    fn from(s: Session) -> Self {
        Self {
            cart_total: s.subtotal(),
            message_count: s.messages.len(),
            phone: s.phone,
            state: s.state,
            customer_name: s.customer_name,
            style: s.style,
            budget: s.budget,
            cart: s.cart,
            pending_selection: s.pending_selection,
            messages: s.messages,
            escalated_at: s.escalated_at,
            closed_at: s.closed_at,
            last_activity: s.last_activity,
        }
    }
}

pub async fn session_view(conversations: &ConversationStore, phone: &str) -> Result<SessionView> {
    conversations
        .get(phone)
        .await
        .map(SessionView::from)
        .ok_or_else(|| Error::NotFound(format!("conversation {phone}")))
}

pub async fn list_orders(store: &dyn BotStore) -> Result<Vec<Order>> {
    store.list_orders(ORDER_LIST_LIMIT).await
}

pub async fn get_order(store: &dyn BotStore, order_number: &str) -> Result<Order> {
    store
        .get_order(order_number)
        .await?
        .ok_or_else(|| Error::NotFound(format!("order {order_number}")))
}

/// Parse and apply a status change. Unknown status names are rejected before
/// touching storage.
pub async fn update_order_status(
    store: &dyn BotStore,
    order_number: &str,
    status: &str,
) -> Result<Order> {
    let status: OrderStatus = status.trim().parse()?;
    store
        .update_order_status(order_number, status)
        .await?
        .ok_or_else(|| Error::NotFound(format!("order {order_number}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{storage::MemoryStore, testing::item};
    use std::sync::Arc;

    fn session(phone: &str, state: BotState, style: Option<Style>) -> Session {
        let mut s = Session::new(phone, Utc::now());
        s.state = state;
        s.style = style;
        s
    }

    #[tokio::test]
    async fn metrics_count_states_and_styles() {
        let mem = Arc::new(MemoryStore::with_products(vec![
            item("1", "Gorra", 45_000),
            item("2", "Buzo", 80_000),
        ]));
        let catalog = CatalogCache::new(mem.clone(), 100);
        catalog.refresh().await.unwrap();
        let conv = ConversationStore::new(mem);
        conv.upsert(session("1", BotState::AskStyle, None)).await;
        conv.upsert(session("2", BotState::Escalate, Some(Style::Urban))).await;
        conv.upsert(session("3", BotState::Closed, Some(Style::Classic))).await;
        conv.upsert(session("4", BotState::AskProducts, Some(Style::Urban))).await;

        let m = metrics(&conv, &catalog).await;
        assert_eq!(
            m,
            BotMetrics {
                total: 4,
                active: 3,
                escalated: 1,
                by_style: StyleCounts {
                    urbano: 2,
                    clasico: 1
                },
                catalog_size: 2,
            }
        );
    }

    #[tokio::test]
    async fn session_view_reports_cart_total() {
        let conv = ConversationStore::new(Arc::new(MemoryStore::new()));
        let mut s = session("1", BotState::ConfirmOrder, None);
        s.cart.push(CartLine {
            product_id: "1".into(),
            name: "Gorra".into(),
            price: Decimal::from(45_000),
            quantity: 2,
            size: None,
            color: None,
            note: None,
        });
        conv.upsert(s).await;

        let view = session_view(&conv, "1").await.unwrap();
        assert_eq!(view.cart_total, Decimal::from(90_000));
        assert_eq!(view.message_count, 0);
        assert!(matches!(
            session_view(&conv, "2").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn status_updates_are_validated() {
        let store = MemoryStore::new();
        let number = store.next_order_number().await.unwrap();
        let now = Utc::now();
        store
            .insert_order(&Order {
                order_number: number.clone(),
                customer_phone: "573001112233".into(),
                customer_name: "Andrea".into(),
                items: vec![],
                subtotal: Decimal::ZERO,
                commission_percentage: Decimal::from(10),
                commission_amount: Decimal::ZERO,
                net_amount: Decimal::ZERO,
                style: None,
                budget: String::new(),
                status: OrderStatus::Pending,
                notified_intermediary: false,
                notified_owner: false,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let updated = update_order_status(&store, &number, "completed").await.unwrap();
        assert_eq!(updated.status, OrderStatus::Completed);
        assert!(matches!(
            update_order_status(&store, &number, "shipped").await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            update_order_status(&store, "WA-00000000-9999", "pending").await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(list_orders(&store).await.unwrap().len(), 1);
        assert_eq!(get_order(&store, &number).await.unwrap().order_number, number);
    }
}
