use async_trait::async_trait;

use crate::messaging::types::{Button, ListSection};

/// Outbound messaging port (WhatsApp Cloud API today).
///
/// Every call reports delivery as a boolean and never fails past the call
/// boundary. An unconfigured gateway logs the message and returns `false`.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn send_text(&self, to: &str, body: &str, preview_url: bool) -> bool;

    /// Reply buttons; at most [`MAX_BUTTONS`](crate::messaging::types::MAX_BUTTONS).
    async fn send_buttons(&self, to: &str, body: &str, buttons: &[Button]) -> bool;

    async fn send_list(
        &self,
        to: &str,
        body: &str,
        button_label: &str,
        sections: &[ListSection],
    ) -> bool;
}
