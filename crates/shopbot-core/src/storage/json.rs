use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    domain::{BotState, CatalogItem, ChatMessage, ConversationSnapshot, NotifiedParty, Order, OrderStatus},
    ports::{BotStore, ProductSource},
    storage::format_order_number,
    Result,
};

const CONVERSATIONS_FILE: &str = "conversations.json";
const ORDERS_FILE: &str = "orders.json";
const PRODUCTS_FILE: &str = "products.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct OrdersFile {
    #[serde(default)]
    last_seq: u64,
    #[serde(default)]
    orders: Vec<Order>,
}

/// Product row as kept in `products.json`.
#[derive(Debug, Deserialize)]
struct ProductRecord {
    #[serde(flatten)]
    item: CatalogItem,
    #[serde(default = "default_active")]
    is_active: bool,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

/// JSON-file backed store rooted at a data directory.
///
/// One async mutex serializes all file access; writes go to a temp file that
/// is renamed over the target so readers never see a torn file.
pub struct JsonFileStore {
    dir: PathBuf,
    io: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            io: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    async fn read_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.path(name);
        let txt = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };
        if txt.trim().is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_str(&txt)?)
    }

    async fn write_atomic<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(name);
        let tmp = self.path(&format!("{name}.tmp"));
        let txt = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&tmp, txt).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn modify_orders<R>(&self, f: impl FnOnce(&mut OrdersFile) -> R) -> Result<R> {
        let _guard = self.io.lock().await;
        let mut file: OrdersFile = self.read_or_default(ORDERS_FILE).await?;
        let out = f(&mut file);
        self.write_atomic(ORDERS_FILE, &file).await?;
        Ok(out)
    }
}

#[async_trait]
impl BotStore for JsonFileStore {
    async fn save_conversation(&self, snap: &ConversationSnapshot) -> Result<()> {
        let _guard = self.io.lock().await;
        let mut all: BTreeMap<String, ConversationSnapshot> =
            self.read_or_default(CONVERSATIONS_FILE).await?;
        all.insert(snap.phone.clone(), snap.clone());
        self.write_atomic(CONVERSATIONS_FILE, &all).await
    }

    async fn conversation_status(&self, phone: &str) -> Result<Option<BotState>> {
        let _guard = self.io.lock().await;
        let all: BTreeMap<String, ConversationSnapshot> =
            self.read_or_default(CONVERSATIONS_FILE).await?;
        Ok(all.get(phone).map(|s| s.status))
    }

    async fn append_message(&self, phone: &str, msg: &ChatMessage) -> Result<bool> {
        let _guard = self.io.lock().await;
        let mut all: BTreeMap<String, ConversationSnapshot> =
            self.read_or_default(CONVERSATIONS_FILE).await?;
        let Some(snap) = all.get_mut(phone) else {
            return Ok(false);
        };
        snap.messages.push(msg.clone());
        snap.updated_at = msg.timestamp;
        self.write_atomic(CONVERSATIONS_FILE, &all).await?;
        Ok(true)
    }

    async fn load_open_conversations(&self) -> Result<Vec<ConversationSnapshot>> {
        let _guard = self.io.lock().await;
        let all: BTreeMap<String, ConversationSnapshot> =
            self.read_or_default(CONVERSATIONS_FILE).await?;
        Ok(all
            .into_values()
            .filter(|s| !s.status.is_terminal())
            .collect())
    }

    async fn next_order_number(&self) -> Result<String> {
        let now = Utc::now();
        self.modify_orders(|f| {
            f.last_seq += 1;
            format_order_number(now, f.last_seq)
        })
        .await
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let order = order.clone();
        self.modify_orders(move |f| f.orders.push(order)).await
    }

    async fn mark_order_notified(&self, order_number: &str, party: NotifiedParty) -> Result<()> {
        let found = self
            .modify_orders(|f| {
                let Some(o) = f.orders.iter_mut().find(|o| o.order_number == order_number) else {
                    return false;
                };
                match party {
                    NotifiedParty::Intermediary => o.notified_intermediary = true,
                    NotifiedParty::Owner => o.notified_owner = true,
                }
                o.updated_at = Utc::now();
                true
            })
            .await?;
        if !found {
            return Err(crate::Error::NotFound(format!("order {order_number}")));
        }
        Ok(())
    }

    async fn list_orders(&self, limit: usize) -> Result<Vec<Order>> {
        let _guard = self.io.lock().await;
        let file: OrdersFile = self.read_or_default(ORDERS_FILE).await?;
        let mut orders = file.orders;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(limit);
        Ok(orders)
    }

    async fn get_order(&self, order_number: &str) -> Result<Option<Order>> {
        let _guard = self.io.lock().await;
        let file: OrdersFile = self.read_or_default(ORDERS_FILE).await?;
        Ok(file
            .orders
            .into_iter()
            .find(|o| o.order_number == order_number))
    }

    async fn update_order_status(
        &self,
        order_number: &str,
        status: OrderStatus,
    ) -> Result<Option<Order>> {
        self.modify_orders(|f| {
            let o = f.orders.iter_mut().find(|o| o.order_number == order_number)?;
            o.status = status;
            o.updated_at = Utc::now();
            Some(o.clone())
        })
        .await
    }
}

#[async_trait]
impl ProductSource for JsonFileStore {
    async fn fetch_active(&self, limit: usize) -> Result<Vec<CatalogItem>> {
        let records: Vec<ProductRecord> = {
            let _guard = self.io.lock().await;
            self.read_or_default(PRODUCTS_FILE).await?
        };
        let mut active: Vec<ProductRecord> = records.into_iter().filter(|r| r.is_active).collect();
        // Stable: records without a timestamp keep file order after dated ones.
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active.into_iter().take(limit).map(|r| r.item).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatMessage, Origin, Style};
    use rust_decimal::Decimal;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("shopbot-json-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn snapshot(phone: &str, status: BotState) -> ConversationSnapshot {
        let now = Utc::now();
        ConversationSnapshot {
            phone: phone.into(),
            customer_name: "Andrea".into(),
            style: Some(Style::Urban),
            budget: String::new(),
            products: vec![],
            messages: vec![ChatMessage {
                origin: Origin::Customer,
                text: "hola".into(),
                timestamp: now,
            }],
            status,
            pending_selection: None,
            escalated_at: None,
            closed_at: None,
            updated_at: now,
        }
    }

    fn order(number: &str) -> Order {
        let now = Utc::now();
        Order {
            order_number: number.into(),
            customer_phone: "573001112233".into(),
            customer_name: "Andrea".into(),
            items: vec![],
            subtotal: Decimal::from(100_000),
            commission_percentage: Decimal::from(10),
            commission_amount: Decimal::from(10_000),
            net_amount: Decimal::from(90_000),
            style: None,
            budget: String::new(),
            status: OrderStatus::Pending,
            notified_intermediary: false,
            notified_owner: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn open_conversations_exclude_terminal_rows() {
        let dir = temp_dir("open");
        let store = JsonFileStore::new(&dir);
        store
            .save_conversation(&snapshot("1", BotState::AskStyle))
            .await
            .unwrap();
        store
            .save_conversation(&snapshot("2", BotState::Closed))
            .await
            .unwrap();
        store
            .save_conversation(&snapshot("3", BotState::Escalate))
            .await
            .unwrap();

        let open = store.load_open_conversations().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].phone, "1");
        assert_eq!(
            store.conversation_status("2").await.unwrap(),
            Some(BotState::Closed)
        );
        assert_eq!(store.conversation_status("9").await.unwrap(), None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn messages_append_to_closed_rows() {
        let dir = temp_dir("append");
        let store = JsonFileStore::new(&dir);
        store
            .save_conversation(&snapshot("1", BotState::Closed))
            .await
            .unwrap();
        let msg = ChatMessage {
            origin: Origin::Customer,
            text: "¿siguen abiertos?".into(),
            timestamp: Utc::now(),
        };

        assert!(store.append_message("1", &msg).await.unwrap());
        assert!(!store.append_message("9", &msg).await.unwrap());

        let reopened = JsonFileStore::new(&dir);
        assert_eq!(
            reopened.conversation_status("1").await.unwrap(),
            Some(BotState::Closed)
        );
        let all: BTreeMap<String, ConversationSnapshot> =
            reopened.read_or_default(CONVERSATIONS_FILE).await.unwrap();
        assert_eq!(all["1"].messages.len(), 2);
        assert_eq!(all["1"].messages[1].text, "¿siguen abiertos?");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn order_numbers_are_unique_and_flags_flip() {
        let dir = temp_dir("orders");
        let store = JsonFileStore::new(&dir);
        let a = store.next_order_number().await.unwrap();
        let b = store.next_order_number().await.unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("WA-"));

        store.insert_order(&order(&a)).await.unwrap();
        store
            .mark_order_notified(&a, NotifiedParty::Owner)
            .await
            .unwrap();
        let got = store.get_order(&a).await.unwrap().unwrap();
        assert!(got.notified_owner);
        assert!(!got.notified_intermediary);

        let updated = store
            .update_order_status(&a, OrderStatus::Contacted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Contacted);
        assert!(store
            .update_order_status("WA-missing", OrderStatus::Completed)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .mark_order_notified("WA-missing", NotifiedParty::Owner)
            .await
            .is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn products_filter_inactive_and_respect_limit() {
        let dir = temp_dir("products");
        std::fs::write(
            dir.join(PRODUCTS_FILE),
            r#"[
              {"id":"1","name":"Camiseta Negra","price":35000,"created_at":"2026-01-01T00:00:00Z"},
              {"id":"2","name":"Buzo Gris","price":"80000","is_active":false},
              {"id":"3","name":"Gorra","price":45000,"category":"Accesorios","created_at":"2026-02-01T00:00:00Z"},
              {"id":"4","name":"Pantaloneta","price":50000}
            ]"#,
        )
        .unwrap();
        let store = JsonFileStore::new(&dir);

        let items = store.fetch_active(10).await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "4"]);
        assert_eq!(items[0].category.as_deref(), Some("Accesorios"));

        let limited = store.fetch_active(2).await.unwrap();
        assert_eq!(limited.len(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_files_read_as_empty() {
        let dir = temp_dir("empty");
        let store = JsonFileStore::new(&dir);
        assert!(store.fetch_active(10).await.unwrap().is_empty());
        assert!(store.list_orders(50).await.unwrap().is_empty());
        assert!(store.load_open_conversations().await.unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
