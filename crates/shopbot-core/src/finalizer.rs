//! Turns a confirmed session into a durable order and notifies everyone involved.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::{
    config::Config,
    copy,
    domain::{BotState, Breakdown, NotifiedParty, Order, OrderStatus, Session},
    messaging::port::MessageGateway,
    ports::BotStore,
    Error, Result,
};

pub struct OrderFinalizer {
    config: Arc<Config>,
    store: Arc<dyn BotStore>,
    gateway: Arc<dyn MessageGateway>,
}

impl OrderFinalizer {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn BotStore>,
        gateway: Arc<dyn MessageGateway>,
    ) -> Self {
        Self {
            config,
            store,
            gateway,
        }
    }

    /// Persist the order, send the three notifications and close the session.
    ///
    /// The notifications are independent: a failed send only leaves its flag
    /// unset. Only a failure to allocate an order number aborts, before
    /// anything is sent, leaving the session in `OrderConfirmed`.
    pub async fn finalize(&self, session: &mut Session) -> Result<Order> {
        if session.state != BotState::OrderConfirmed {
            return Err(Error::InvalidState(format!(
                "cannot finalize conversation in state {}",
                session.state
            )));
        }
        if session.cart.is_empty() {
            return Err(Error::InvalidState("cannot finalize an empty cart".into()));
        }

        let breakdown = Breakdown::compute(session.subtotal(), self.config.commission_percentage);
        let order_number = self.store.next_order_number().await?;
        let now = Utc::now();

        let mut order = Order {
            order_number,
            customer_phone: session.phone.clone(),
            customer_name: session.customer_name.clone(),
            items: session.cart.clone(),
            subtotal: breakdown.subtotal,
            commission_percentage: breakdown.percentage,
            commission_amount: breakdown.commission,
            net_amount: breakdown.net,
            style: session.style,
            budget: session.budget.clone(),
            status: OrderStatus::Pending,
            notified_intermediary: false,
            notified_owner: false,
            created_at: now,
            updated_at: now,
        };

        let persisted = match self.store.insert_order(&order).await {
            Ok(()) => true,
            Err(e) => {
                warn!(order = %order.order_number, error = %e, "failed to persist order");
                false
            }
        };

        let summary = copy::intermediary_summary(&order);
        if self
            .gateway
            .send_text(&self.config.intermediary_phone, &summary, false)
            .await
        {
            order.notified_intermediary = true;
            self.flag(&order.order_number, NotifiedParty::Intermediary, persisted)
                .await;
        } else {
            warn!(order = %order.order_number, "intermediary notification failed");
        }

        match self.config.store_owner_phone.as_deref() {
            Some(owner) => {
                let notice = copy::owner_notice(&order);
                if self.gateway.send_text(owner, &notice, false).await {
                    order.notified_owner = true;
                    self.flag(&order.order_number, NotifiedParty::Owner, persisted)
                        .await;
                } else {
                    warn!(order = %order.order_number, "owner notification failed");
                }
            }
            None => info!("store owner phone not configured, skipping owner notification"),
        }

        let confirmation = copy::customer_confirmation(&order, &self.config.store_name);
        if !self
            .gateway
            .send_text(&session.phone, &confirmation, false)
            .await
        {
            warn!(order = %order.order_number, phone = %session.phone, "customer confirmation failed");
        }

        let closed_at = Utc::now();
        session.record_bot(&confirmation, closed_at);
        session.state = BotState::Closed;
        session.closed_at = Some(closed_at);
        if let Err(e) = self
            .store
            .save_conversation(&session.snapshot(closed_at))
            .await
        {
            warn!(phone = %session.phone, error = %e, "failed to persist closed conversation");
        }

        info!(
            order = %order.order_number,
            phone = %session.phone,
            subtotal = %order.subtotal,
            "order confirmed"
        );
        Ok(order)
    }

    async fn flag(&self, order_number: &str, party: NotifiedParty, persisted: bool) {
        if !persisted {
            return;
        }
        if let Err(e) = self.store.mark_order_notified(order_number, party).await {
            warn!(order = order_number, ?party, error = %e, "failed to flag order notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::CartLine,
        storage::MemoryStore,
        testing::{test_config, RecordingGateway},
    };
    use rust_decimal::Decimal;

    fn confirmed_session() -> Session {
        let mut s = Session::new("573001112233", Utc::now());
        s.customer_name = "Andrea".into();
        s.state = BotState::OrderConfirmed;
        s.cart.push(CartLine {
            product_id: "1".into(),
            name: "Camiseta Negra".into(),
            price: Decimal::from(35_000),
            quantity: 2,
            size: None,
            color: None,
            note: None,
        });
        s.cart.push(CartLine {
            product_id: "2".into(),
            name: "Gorra".into(),
            price: Decimal::from(30_000),
            quantity: 1,
            size: None,
            color: None,
            note: None,
        });
        s
    }

    fn finalizer(
        config: Arc<Config>,
    ) -> (Arc<MemoryStore>, Arc<RecordingGateway>, OrderFinalizer) {
        let store = Arc::new(MemoryStore::new());
        let gw = Arc::new(RecordingGateway::default());
        let f = OrderFinalizer::new(config, store.clone(), gw.clone());
        (store, gw, f)
    }

    #[tokio::test]
    async fn finalize_persists_notifies_and_closes() {
        let (store, gw, f) = finalizer(test_config());
        let mut session = confirmed_session();

        let order = f.finalize(&mut session).await.unwrap();
        assert_eq!(order.subtotal, Decimal::from(100_000));
        assert_eq!(order.commission_amount, Decimal::from(10_000));
        assert_eq!(order.net_amount, Decimal::from(90_000));
        assert!(order.notified_intermediary);
        assert!(order.notified_owner);

        let stored = store.get_order(&order.order_number).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert!(stored.notified_intermediary && stored.notified_owner);

        let sent = gw.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].to(), "573238020198");
        assert_eq!(sent[1].to(), "573009998877");
        assert_eq!(sent[2].to(), "573001112233");
        assert!(sent[2].body().contains(&order.order_number));

        assert_eq!(session.state, BotState::Closed);
        assert!(session.closed_at.is_some());
        let snap = store.conversation("573001112233").await.unwrap();
        assert_eq!(snap.status, BotState::Closed);
    }

    #[tokio::test]
    async fn missing_owner_is_skipped_without_error() {
        let mut cfg = (*test_config()).clone();
        cfg.store_owner_phone = None;
        let (store, gw, f) = finalizer(Arc::new(cfg));
        let mut session = confirmed_session();

        let order = f.finalize(&mut session).await.unwrap();
        assert!(!order.notified_owner);
        assert_eq!(gw.sent().len(), 2);
        let stored = store.get_order(&order.order_number).await.unwrap().unwrap();
        assert!(stored.notified_intermediary);
        assert!(!stored.notified_owner);
    }

    #[tokio::test]
    async fn failed_intermediary_send_does_not_stop_the_rest() {
        let (store, gw, f) = finalizer(test_config());
        gw.fail_for("573238020198");
        let mut session = confirmed_session();

        let order = f.finalize(&mut session).await.unwrap();
        assert!(!order.notified_intermediary);
        assert!(order.notified_owner);
        assert_eq!(gw.sent_to("573001112233").len(), 1);
        assert_eq!(session.state, BotState::Closed);

        let stored = store.get_order(&order.order_number).await.unwrap().unwrap();
        assert!(!stored.notified_intermediary);
        assert!(stored.notified_owner);
    }

    #[tokio::test]
    async fn fractional_commission_is_exact() {
        let mut cfg = (*test_config()).clone();
        cfg.commission_percentage = Decimal::new(125, 1);
        let (_store, _gw, f) = finalizer(Arc::new(cfg));
        let mut session = confirmed_session();

        let order = f.finalize(&mut session).await.unwrap();
        assert_eq!(order.commission_amount, Decimal::new(12_500, 0));
        assert_eq!(order.commission_amount + order.net_amount, order.subtotal);
    }

    #[tokio::test]
    async fn preconditions_are_enforced_before_sending() {
        let (_store, gw, f) = finalizer(test_config());

        let mut wrong_state = confirmed_session();
        wrong_state.state = BotState::ConfirmOrder;
        assert!(matches!(
            f.finalize(&mut wrong_state).await,
            Err(Error::InvalidState(_))
        ));

        let mut empty = confirmed_session();
        empty.cart.clear();
        assert!(matches!(
            f.finalize(&mut empty).await,
            Err(Error::InvalidState(_))
        ));

        assert!(gw.sent().is_empty());
        assert_eq!(empty.state, BotState::OrderConfirmed);
    }
}
