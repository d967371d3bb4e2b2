//! Fakes shared by the unit tests.

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    config::Config,
    domain::CatalogItem,
    messaging::{
        port::MessageGateway,
        types::{Button, ListSection},
    },
};

pub fn item(id: &str, name: &str, price: i64) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        name: name.to_string(),
        price: Decimal::from(price),
        category: None,
        sizes: vec![],
        colors: vec![],
        description: None,
        image_url: None,
    }
}

pub fn test_config() -> Arc<Config> {
    Arc::new(Config {
        whatsapp_phone_number_id: String::new(),
        whatsapp_access_token: String::new(),
        whatsapp_webhook_token: "verify-me".to_string(),
        whatsapp_api_url: "http://localhost".to_string(),
        intermediary_phone: "573238020198".to_string(),
        store_owner_phone: Some("573009998877".to_string()),
        commission_percentage: Decimal::from(10),
        store_name: "Melo Sportt".to_string(),
        catalog_url: "https://example.test/products".to_string(),
        data_dir: PathBuf::from("/tmp/shopbot-test"),
        catalog_limit: 100,
        catalog_refresh_interval: Duration::from_secs(300),
        sweep_interval: Duration::from_secs(600),
        inactivity_timeout: Duration::from_secs(1800),
        bind_addr: "127.0.0.1:0".to_string(),
    })
}

#[derive(Clone, Debug, PartialEq)]
pub enum Sent {
    Text {
        to: String,
        body: String,
        preview_url: bool,
    },
    Buttons {
        to: String,
        body: String,
        buttons: Vec<Button>,
    },
    List {
        to: String,
        body: String,
        button_label: String,
        sections: Vec<ListSection>,
    },
}

impl Sent {
    pub fn to(&self) -> &str {
        match self {
            Sent::Text { to, .. } | Sent::Buttons { to, .. } | Sent::List { to, .. } => to,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Sent::Text { body, .. } | Sent::Buttons { body, .. } | Sent::List { body, .. } => body,
        }
    }
}

/// Gateway that records every send. Sends to phones in `failing` report `false`.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<Sent>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

impl RecordingGateway {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_for(&self, phone: &str) {
        self.failing.lock().unwrap().insert(phone.to_string());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, phone: &str) -> Vec<Sent> {
        self.sent().into_iter().filter(|s| s.to() == phone).collect()
    }

    pub fn last_body(&self) -> String {
        self.sent()
            .last()
            .map(|s| s.body().to_string())
            .unwrap_or_default()
    }

    async fn record(&self, msg: Sent) -> bool {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let ok = !self.failing.lock().unwrap().contains(msg.to());
        self.sent.lock().unwrap().push(msg);
        ok
    }
}

#[async_trait]
impl MessageGateway for RecordingGateway {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send_text(&self, to: &str, body: &str, preview_url: bool) -> bool {
        self.record(Sent::Text {
            to: to.to_string(),
            body: body.to_string(),
            preview_url,
        })
        .await
    }

    async fn send_buttons(&self, to: &str, body: &str, buttons: &[Button]) -> bool {
        self.record(Sent::Buttons {
            to: to.to_string(),
            body: body.to_string(),
            buttons: buttons.to_vec(),
        })
        .await
    }

    async fn send_list(
        &self,
        to: &str,
        body: &str,
        button_label: &str,
        sections: &[ListSection],
    ) -> bool {
        self.record(Sent::List {
            to: to.to_string(),
            body: body.to_string(),
            button_label: button_label.to_string(),
            sections: sections.to_vec(),
        })
        .await
    }
}
