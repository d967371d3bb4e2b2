//! WhatsApp adapter.
//!
//! Implements the `shopbot-core` MessageGateway over the WhatsApp Cloud API and
//! exposes the webhook + admin HTTP surface.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub mod router;
pub mod webhook;

use shopbot_core::{
    config::Config,
    messaging::{
        port::MessageGateway,
        types::{
            truncate_chars, Button, ListSection, MAX_BUTTONS, MAX_BUTTON_TITLE_LEN,
            MAX_LIST_BUTTON_LEN,
        },
    },
};

#[derive(Clone)]
pub struct CloudApiClient {
    http: reqwest::Client,
    api_url: String,
    phone_number_id: String,
    access_token: String,
}

impl CloudApiClient {
    pub fn new(
        api_url: impl Into<String>,
        phone_number_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.whatsapp_api_url.clone(),
            cfg.whatsapp_phone_number_id.clone(),
            cfg.whatsapp_access_token.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/messages",
            self.api_url.trim_end_matches('/'),
            self.phone_number_id
        )
    }

    async fn post(&self, kind: &'static str, payload: Value) -> bool {
        let resp = match self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(kind, error = %e, "whatsapp request failed");
                return false;
            }
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(
                kind,
                %status,
                body = %body.chars().take(200).collect::<String>(),
                "whatsapp send rejected"
            );
            return false;
        }

        let v: Value = resp.json().await.unwrap_or(Value::Null);
        let id = v
            .pointer("/messages/0/id")
            .and_then(|id| id.as_str())
            .unwrap_or("");
        debug!(kind, message_id = id, "whatsapp message sent");
        true
    }

    fn unconfigured(&self, kind: &'static str, to: &str, body: &str) -> bool {
        info!(
            kind,
            to,
            body = %truncate_chars(body, 100),
            "whatsapp not configured, message not sent"
        );
        false
    }
}

#[async_trait]
impl MessageGateway for CloudApiClient {
    fn is_configured(&self) -> bool {
        !self.phone_number_id.is_empty() && !self.access_token.is_empty()
    }

    async fn send_text(&self, to: &str, body: &str, preview_url: bool) -> bool {
        if !self.is_configured() {
            return self.unconfigured("text", to, body);
        }
        self.post("text", text_payload(to, body, preview_url)).await
    }

    async fn send_buttons(&self, to: &str, body: &str, buttons: &[Button]) -> bool {
        if !self.is_configured() {
            return self.unconfigured("buttons", to, body);
        }
        self.post("buttons", buttons_payload(to, body, buttons)).await
    }

    async fn send_list(
        &self,
        to: &str,
        body: &str,
        button_label: &str,
        sections: &[ListSection],
    ) -> bool {
        if !self.is_configured() {
            return self.unconfigured("list", to, body);
        }
        self.post("list", list_payload(to, body, button_label, sections))
            .await
    }
}

/// Digits only, with the Colombian country code added to bare mobile numbers.
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 && digits.starts_with('3') {
        return format!("57{digits}");
    }
    digits
}

pub fn text_payload(to: &str, body: &str, preview_url: bool) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "to": normalize_phone(to),
        "type": "text",
        "text": { "body": body, "preview_url": preview_url },
    })
}

pub fn buttons_payload(to: &str, body: &str, buttons: &[Button]) -> Value {
    if buttons.len() > MAX_BUTTONS {
        warn!(
            count = buttons.len(),
            max = MAX_BUTTONS,
            "too many reply buttons, truncating"
        );
    }
    let buttons: Vec<Value> = buttons
        .iter()
        .take(MAX_BUTTONS)
        .map(|b| {
            json!({
                "type": "reply",
                "reply": { "id": b.id, "title": truncate_chars(&b.title, MAX_BUTTON_TITLE_LEN) },
            })
        })
        .collect();
    json!({
        "messaging_product": "whatsapp",
        "to": normalize_phone(to),
        "type": "interactive",
        "interactive": {
            "type": "button",
            "body": { "text": body },
            "action": { "buttons": buttons },
        },
    })
}

pub fn list_payload(to: &str, body: &str, button_label: &str, sections: &[ListSection]) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "to": normalize_phone(to),
        "type": "interactive",
        "interactive": {
            "type": "list",
            "body": { "text": body },
            "action": {
                "button": truncate_chars(button_label, MAX_LIST_BUTTON_LEN),
                "sections": sections,
            },
        },
    })
}
