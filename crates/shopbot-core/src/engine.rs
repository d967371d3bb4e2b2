//! The ordering conversation: one state machine step per inbound message.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    catalog::CatalogCache,
    config::Config,
    conversation::ConversationStore,
    copy,
    domain::{BotState, Breakdown, CartLine, CatalogItem, Order, Session},
    finalizer::OrderFinalizer,
    formatting::format_price,
    matcher::{classify_catalog_choice, classify_style, extract_quantity, wants_more, CatalogChoice},
    messaging::{
        port::MessageGateway,
        types::{Button, InboundMessage, ListRow, ListSection},
    },
    Error, Result,
};

/// List row ids are `product_<catalog id>`.
pub const PRODUCT_ROW_PREFIX: &str = "product_";

const FEATURED_LIMIT: usize = 8;
const PLAIN_LISTING_LIMIT: usize = 10;
const SAMPLE_LIMIT: usize = 5;
const LIST_BUTTON_LABEL: &str = "Ver productos";
const FEATURED_SECTION_TITLE: &str = "🏆 Productos destacados";

pub struct ConversationEngine {
    config: Arc<Config>,
    conversations: Arc<ConversationStore>,
    catalog: Arc<CatalogCache>,
    gateway: Arc<dyn MessageGateway>,
    finalizer: OrderFinalizer,
}

impl ConversationEngine {
    pub fn new(
        config: Arc<Config>,
        conversations: Arc<ConversationStore>,
        catalog: Arc<CatalogCache>,
        gateway: Arc<dyn MessageGateway>,
    ) -> Self {
        let finalizer = OrderFinalizer::new(config.clone(), conversations.durable(), gateway.clone());
        Self {
            config,
            conversations,
            catalog,
            gateway,
            finalizer,
        }
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    pub fn catalog(&self) -> &Arc<CatalogCache> {
        &self.catalog
    }

    pub fn gateway(&self) -> &Arc<dyn MessageGateway> {
        &self.gateway
    }

    /// Process one inbound message. Messages for the same phone run strictly
    /// one after another.
    ///
    /// Returns the state the session ended in, or `None` when the phone has
    /// been handed to a human; the message is then only logged on the stored
    /// conversation.
    pub async fn handle(&self, msg: InboundMessage) -> Option<BotState> {
        let now = Utc::now();
        let Some(mut session) = self.conversations.open(&msg.from, now).await else {
            self.conversations
                .record_unattended(&msg.from, &msg.text, now)
                .await;
            return None;
        };
        session.record_customer(&msg.text, now);

        let before = session.state;
        match session.state {
            BotState::Greeting => self.greet(&mut session).await,
            BotState::AskName => self.on_name(&mut session, &msg.text).await,
            BotState::AskStyle => self.on_style(&mut session, &msg.text).await,
            BotState::AskCatalog => self.on_catalog_choice(&mut session, &msg.text).await,
            BotState::BrowseCatalog => self.on_browse(&mut session, &msg).await,
            BotState::AskProducts => self.on_products(&mut session, &msg.text).await,
            BotState::AskQuantities => self.on_quantities(&mut session, &msg.text).await,
            BotState::ConfirmOrder => self.on_confirm(&mut session, &msg.text).await,
            BotState::OrderConfirmed | BotState::Escalate | BotState::Closed => {
                debug!(phone = %session.phone, state = %session.state, "message recorded, no reply");
            }
        }
        if session.state != before {
            debug!(phone = %session.phone, from = %before, to = %session.state, "transition");
        }

        self.conversations.checkpoint(&session).await;
        Some(session.state)
    }

    /// External confirmation signal: finalize the order for `phone`.
    pub async fn confirm_order(&self, phone: &str) -> Result<Order> {
        let mut session = self
            .conversations
            .lock(phone)
            .await
            .ok_or_else(|| Error::NotFound(format!("conversation {phone}")))?;
        self.finalizer.finalize(&mut session).await
    }

    /// Hand the conversation to a human. The bot stops replying to it.
    pub async fn escalate(&self, phone: &str) -> Result<Session> {
        let mut session = self
            .conversations
            .lock(phone)
            .await
            .ok_or_else(|| Error::NotFound(format!("conversation {phone}")))?;
        if session.state == BotState::Closed {
            return Err(Error::InvalidState(format!(
                "conversation {phone} is already closed"
            )));
        }
        session.state = BotState::Escalate;
        session.escalated_at = Some(Utc::now());
        self.conversations.checkpoint(&session).await;
        info!(phone, "conversation escalated");
        Ok(session.clone())
    }

    async fn greet(&self, s: &mut Session) {
        let text = copy::greeting(&self.config.store_name);
        self.say(s, &text).await;
        s.state = BotState::AskName;
    }

    async fn on_name(&self, s: &mut Session, text: &str) {
        let name = text.trim();
        if name.is_empty() {
            self.say(s, copy::ask_name_again()).await;
            return;
        }
        s.customer_name = name.to_string();
        let body = copy::ask_style(name);
        self.ask(
            s,
            &body,
            &[
                Button::new("style_urbano", "🏙️ Urbano"),
                Button::new("style_clasico", "👔 Clásico"),
            ],
        )
        .await;
        s.state = BotState::AskStyle;
    }

    async fn on_style(&self, s: &mut Session, text: &str) {
        let Some(style) = classify_style(text) else {
            self.say(s, copy::style_reprompt()).await;
            return;
        };
        s.style = Some(style);
        self.ask(
            s,
            &copy::ask_catalog(style),
            &[
                Button::new("catalog_online", "🔗 Ver catálogo online"),
                Button::new("catalog_here", "🛒 Ver aquí mismo"),
            ],
        )
        .await;
        s.state = BotState::AskCatalog;
    }

    async fn on_catalog_choice(&self, s: &mut Session, text: &str) {
        match classify_catalog_choice(text) {
            CatalogChoice::Online => {
                let body = copy::online_catalog(&self.config.catalog_url);
                self.send_text(s, &body, true).await;
                s.state = BotState::AskProducts;
            }
            CatalogChoice::Here => self.show_featured(s).await,
        }
    }

    async fn show_featured(&self, s: &mut Session) {
        let featured = match s.style {
            Some(style) => self.catalog.by_style(style, FEATURED_LIMIT),
            None => self.catalog.first(FEATURED_LIMIT),
        };

        if featured.is_empty() {
            let body = copy::plain_listing(&self.catalog.first(PLAIN_LISTING_LIMIT));
            self.say(s, &body).await;
            s.state = BotState::AskProducts;
            return;
        }

        let rows = featured
            .iter()
            .map(|p| {
                ListRow::new(
                    format!("{PRODUCT_ROW_PREFIX}{}", p.id),
                    &p.name,
                    Some(format!("${}", format_price(p.price))),
                )
            })
            .collect();
        let sections = [ListSection {
            title: FEATURED_SECTION_TITLE.to_string(),
            rows,
        }];
        let body = copy::featured_list(featured.len());
        if !self
            .gateway
            .send_list(&s.phone, &body, LIST_BUTTON_LABEL, &sections)
            .await
        {
            warn!(phone = %s.phone, "product list not delivered");
        }
        s.record_bot(&body, Utc::now());
        s.state = BotState::BrowseCatalog;
    }

    async fn on_browse(&self, s: &mut Session, msg: &InboundMessage) {
        if let Some(item) = selected_product(msg).and_then(|id| self.catalog.find(id)) {
            self.say(s, &copy::product_detail(&item)).await;
            s.pending_selection = Some(item.id);
            s.state = BotState::AskQuantities;
            return;
        }

        let query = msg.text.trim();
        let hits = self.catalog.search(query);
        if !hits.is_empty() {
            self.say(s, &copy::browse_results(query, &hits)).await;
            return;
        }
        if let Some(item) = self.catalog.find_mentioned(query) {
            self.add_to_cart(s, item, extract_quantity(query)).await;
            return;
        }
        let sample = self.catalog.first(SAMPLE_LIMIT);
        self.say(s, &copy::browse_miss(query, &sample)).await;
    }

    async fn on_products(&self, s: &mut Session, text: &str) {
        let query = text.trim();
        let hits = self.catalog.search(query);
        if !hits.is_empty() {
            self.say(s, &copy::product_hits(query, &hits)).await;
            s.state = BotState::AskQuantities;
            return;
        }
        let popular = self.catalog.first(SAMPLE_LIMIT);
        self.say(s, &copy::product_miss(query, &popular)).await;
    }

    async fn on_quantities(&self, s: &mut Session, text: &str) {
        let quantity = extract_quantity(text);
        let product = s
            .pending_selection
            .take()
            .and_then(|id| self.catalog.find(&id))
            .or_else(|| self.catalog.find_mentioned(text));

        match product {
            Some(item) => self.add_to_cart(s, item, quantity).await,
            None => {
                let sample = self.catalog.first(SAMPLE_LIMIT);
                self.say(s, &copy::quantity_reprompt(&sample)).await;
            }
        }
    }

    async fn add_to_cart(&self, s: &mut Session, item: CatalogItem, quantity: u32) {
        let needle = item.name.to_lowercase();
        match s
            .cart
            .iter_mut()
            .find(|l| l.name.to_lowercase().contains(&needle))
        {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => s.cart.push(CartLine {
                product_id: item.id.clone(),
                name: item.name.clone(),
                price: item.price,
                quantity,
                size: None,
                color: None,
                note: None,
            }),
        }
        s.pending_selection = None;

        let breakdown = Breakdown::compute(s.subtotal(), self.config.commission_percentage);
        let body = copy::added_to_cart(quantity, &item.name, &s.cart, &breakdown);
        self.ask(
            s,
            &body,
            &[
                Button::new("cart_add_more", "✅ Sí, agregar más"),
                Button::new("cart_confirm", "📋 No, ver resumen"),
            ],
        )
        .await;
        s.state = BotState::ConfirmOrder;
    }

    async fn on_confirm(&self, s: &mut Session, text: &str) {
        // Carts are not restored after a restart.
        if wants_more(text) || s.cart.is_empty() {
            self.say(s, copy::add_more()).await;
            s.state = BotState::AskProducts;
            return;
        }

        let breakdown = Breakdown::compute(s.subtotal(), self.config.commission_percentage);
        let body = copy::order_summary(s, &breakdown);
        self.ask(
            s,
            &body,
            &[
                Button::new("order_confirm", "✅ Confirmar pedido"),
                Button::new("order_edit", "✏️ Editar pedido"),
            ],
        )
        .await;
        s.state = BotState::OrderConfirmed;
    }

    async fn say(&self, s: &mut Session, text: &str) {
        self.send_text(s, text, false).await;
    }

    async fn send_text(&self, s: &mut Session, text: &str, preview_url: bool) {
        if !self.gateway.send_text(&s.phone, text, preview_url).await {
            warn!(phone = %s.phone, "text message not delivered");
        }
        s.record_bot(text, Utc::now());
    }

    async fn ask(&self, s: &mut Session, body: &str, buttons: &[Button]) {
        if !self.gateway.send_buttons(&s.phone, body, buttons).await {
            warn!(phone = %s.phone, "button message not delivered");
        }
        s.record_bot(body, Utc::now());
    }
}

/// Catalog id picked from the product list, from the reply id or the text.
fn selected_product(msg: &InboundMessage) -> Option<&str> {
    msg.selection_id
        .as_deref()
        .and_then(|id| id.strip_prefix(PRODUCT_ROW_PREFIX))
        .or_else(|| msg.text.trim().strip_prefix(PRODUCT_ROW_PREFIX))
}
