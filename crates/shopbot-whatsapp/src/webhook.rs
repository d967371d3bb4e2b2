//! Cloud API webhook payloads and their normalization into engine input.

use serde::Deserialize;

use shopbot_core::messaging::types::InboundMessage;

pub const BUSINESS_ACCOUNT_OBJECT: &str = "whatsapp_business_account";

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
    #[serde(default)]
    pub statuses: Vec<DeliveryStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookMessage {
    pub from: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub button: Option<ButtonBody>,
    #[serde(default)]
    pub interactive: Option<Interactive>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: String,
}

/// Template quick-reply button.
#[derive(Debug, Default, Deserialize)]
pub struct ButtonBody {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub payload: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Interactive {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub button_reply: Option<Reply>,
    #[serde(default)]
    pub list_reply: Option<Reply>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeliveryStatus {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
}

impl WebhookMessage {
    fn is_conversational(&self) -> bool {
        matches!(self.kind.as_str(), "text" | "button" | "interactive")
    }

    fn reply(&self) -> Option<&Reply> {
        let i = self.interactive.as_ref()?;
        i.button_reply.as_ref().or(i.list_reply.as_ref())
    }

    /// What the customer "said": text body, else button text, else reply
    /// title, else reply id.
    pub fn text(&self) -> String {
        let candidates = [
            self.text.as_ref().map(|t| t.body.as_str()),
            self.button.as_ref().map(|b| b.text.as_str()),
            self.reply().map(|r| r.title.as_str()),
            self.reply().map(|r| r.id.as_str()),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    pub fn selection_id(&self) -> Option<String> {
        self.reply()
            .map(|r| r.id.as_str())
            .or_else(|| self.button.as_ref().map(|b| b.payload.as_str()))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    pub fn to_inbound(&self) -> InboundMessage {
        InboundMessage {
            from: self.from.clone(),
            text: self.text(),
            selection_id: self.selection_id(),
        }
    }
}

impl WebhookPayload {
    fn message_changes(&self) -> impl Iterator<Item = &ChangeValue> {
        self.entry
            .iter()
            .flat_map(|e| e.changes.iter())
            .filter(|c| c.field == "messages")
            .map(|c| &c.value)
    }

    /// Customer messages the engine should see, in payload order.
    pub fn inbound(&self) -> Vec<InboundMessage> {
        if self.object != BUSINESS_ACCOUNT_OBJECT {
            return Vec::new();
        }
        self.message_changes()
            .flat_map(|v| v.messages.iter())
            .filter(|m| m.is_conversational())
            .map(WebhookMessage::to_inbound)
            .collect()
    }

    pub fn statuses(&self) -> impl Iterator<Item = &DeliveryStatus> {
        self.message_changes().flat_map(|v| v.statuses.iter())
    }
}
