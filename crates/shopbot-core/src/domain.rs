use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// A purchasable item as seen by the bot. Replaced wholesale on each catalog refresh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// One product entry in a session's in-progress order.
///
/// Name and price are copied from the catalog when the line is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CartLine {
    pub fn total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

pub fn cart_subtotal(cart: &[CartLine]) -> Decimal {
    cart.iter().map(CartLine::total).sum()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Style {
    #[serde(rename = "urbano")]
    Urban,
    #[serde(rename = "clasico")]
    Classic,
}

impl Style {
    /// Stored / matched keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Style::Urban => "urbano",
            Style::Classic => "clasico",
        }
    }

    /// Customer-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Style::Urban => "urbano",
            Style::Classic => "clásico",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotState {
    Greeting,
    AskName,
    AskStyle,
    AskCatalog,
    BrowseCatalog,
    AskProducts,
    AskQuantities,
    ConfirmOrder,
    OrderConfirmed,
    Escalate,
    Closed,
}

impl BotState {
    /// States in which the bot no longer acts on input; a human channel owns the phone.
    pub fn is_terminal(self) -> bool {
        matches!(self, BotState::Escalate | BotState::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BotState::Greeting => "greeting",
            BotState::AskName => "ask_name",
            BotState::AskStyle => "ask_style",
            BotState::AskCatalog => "ask_catalog",
            BotState::BrowseCatalog => "browse_catalog",
            BotState::AskProducts => "ask_products",
            BotState::AskQuantities => "ask_quantities",
            BotState::ConfirmOrder => "confirm_order",
            BotState::OrderConfirmed => "order_confirmed",
            BotState::Escalate => "escalate",
            BotState::Closed => "closed",
        }
    }
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Bot,
    Customer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub origin: Origin,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// One customer's ongoing bot conversation, keyed by phone number.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub phone: String,
    pub state: BotState,
    pub customer_name: String,
    pub style: Option<Style>,
    pub budget: String,
    pub cart: Vec<CartLine>,
    pub messages: Vec<ChatMessage>,
    /// Catalog item picked from the interactive list, waiting for a quantity.
    pub pending_selection: Option<String>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Set when an inactivity nudge was sent; cleared by the next customer message.
    pub nudged_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(phone: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            phone: phone.into(),
            state: BotState::Greeting,
            customer_name: String::new(),
            style: None,
            budget: String::new(),
            cart: Vec::new(),
            messages: Vec::new(),
            pending_selection: None,
            escalated_at: None,
            closed_at: None,
            nudged_at: None,
            last_activity: now,
        }
    }

    pub fn subtotal(&self) -> Decimal {
        cart_subtotal(&self.cart)
    }

    pub fn record_customer(&mut self, text: &str, now: DateTime<Utc>) {
        self.messages.push(ChatMessage {
            origin: Origin::Customer,
            text: text.to_string(),
            timestamp: now,
        });
        self.last_activity = now;
        self.nudged_at = None;
    }

    pub fn record_bot(&mut self, text: &str, now: DateTime<Utc>) {
        self.messages.push(ChatMessage {
            origin: Origin::Bot,
            text: text.to_string(),
            timestamp: now,
        });
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> ConversationSnapshot {
        ConversationSnapshot {
            phone: self.phone.clone(),
            customer_name: self.customer_name.clone(),
            style: self.style,
            budget: self.budget.clone(),
            products: self.cart.iter().map(|l| l.name.clone()).collect(),
            messages: self.messages.clone(),
            status: self.state,
            pending_selection: self.pending_selection.clone(),
            escalated_at: self.escalated_at,
            closed_at: self.closed_at,
            updated_at: now,
        }
    }

    /// Rebuild a session from its durable snapshot. Carts are not restored.
    pub fn from_snapshot(snap: ConversationSnapshot) -> Self {
        let last_activity = snap
            .messages
            .last()
            .map(|m| m.timestamp)
            .unwrap_or(snap.updated_at);
        Self {
            phone: snap.phone,
            state: snap.status,
            customer_name: snap.customer_name,
            style: snap.style,
            budget: snap.budget,
            cart: Vec::new(),
            messages: snap.messages,
            pending_selection: snap.pending_selection,
            escalated_at: snap.escalated_at,
            closed_at: snap.closed_at,
            nudged_at: None,
            last_activity,
        }
    }
}

/// Denormalized, persisted view of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub phone: String,
    pub customer_name: String,
    pub style: Option<Style>,
    pub budget: String,
    /// Cart item names only.
    pub products: Vec<String>,
    pub messages: Vec<ChatMessage>,
    pub status: BotState,
    #[serde(default)]
    pub pending_selection: Option<String>,
    pub escalated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Contacted,
    Confirmed,
    Cancelled,
    Completed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Contacted => "contacted",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Completed => "completed",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "contacted" => Ok(OrderStatus::Contacted),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "completed" => Ok(OrderStatus::Completed),
            other => Err(Error::InvalidState(format!("invalid order status: {other}"))),
        }
    }
}

/// Which party an order notification went to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifiedParty {
    Intermediary,
    Owner,
}

/// Subtotal split between the intermediary's commission and the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub subtotal: Decimal,
    pub percentage: Decimal,
    pub commission: Decimal,
    pub net: Decimal,
}

impl Breakdown {
    pub fn compute(subtotal: Decimal, percentage: Decimal) -> Self {
        let commission = subtotal * percentage / Decimal::ONE_HUNDRED;
        Self {
            subtotal,
            percentage,
            commission,
            net: subtotal - commission,
        }
    }
}

/// Durable order produced by the finalizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_number: String,
    pub customer_phone: String,
    pub customer_name: String,
    pub items: Vec<CartLine>,
    pub subtotal: Decimal,
    pub commission_percentage: Decimal,
    pub commission_amount: Decimal,
    pub net_amount: Decimal,
    pub style: Option<Style>,
    pub budget: String,
    pub status: OrderStatus,
    pub notified_intermediary: bool,
    pub notified_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
