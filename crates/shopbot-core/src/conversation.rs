//! In-memory registry of bot sessions keyed by phone number.
//!
//! Each session sits behind its own async mutex. Holding a [`SessionHandle`]
//! is the only way to mutate a session, which serializes all work for one
//! phone while different phones proceed in parallel. The map itself is only
//! locked long enough to look up or insert a slot.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::{
    copy,
    domain::{BotState, ChatMessage, Origin, Session},
    messaging::port::MessageGateway,
    ports::BotStore,
    Result,
};

/// Exclusive access to one session.
pub type SessionHandle = OwnedMutexGuard<Session>;

pub struct ConversationStore {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
    store: Arc<dyn BotStore>,
}

impl ConversationStore {
    pub fn new(store: Arc<dyn BotStore>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            store,
        }
    }

    pub fn durable(&self) -> Arc<dyn BotStore> {
        self.store.clone()
    }

    async fn slot(&self, phone: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.lock().await.get(phone).cloned()
    }

    async fn slots(&self) -> Vec<Arc<Mutex<Session>>> {
        self.sessions.lock().await.values().cloned().collect()
    }

    /// Copy of the current session state.
    pub async fn get(&self, phone: &str) -> Option<Session> {
        let slot = self.slot(phone).await?;
        let session = slot.lock().await;
        Some(session.clone())
    }

    /// Replace (or insert) the in-memory session for `session.phone`.
    pub async fn upsert(&self, session: Session) {
        if let Some(slot) = self.slot(&session.phone).await {
            *slot.lock().await = session;
            return;
        }
        let mut map = self.sessions.lock().await;
        match map.get(&session.phone) {
            Some(slot) => {
                let slot = slot.clone();
                drop(map);
                *slot.lock().await = session;
            }
            None => {
                map.insert(session.phone.clone(), Arc::new(Mutex::new(session)));
            }
        }
    }

    /// Every session that is not closed.
    pub async fn list_active(&self) -> Vec<Session> {
        self.list_all()
            .await
            .into_iter()
            .filter(|s| s.state != BotState::Closed)
            .collect()
    }

    pub async fn list_all(&self) -> Vec<Session> {
        let mut out = Vec::new();
        for slot in self.slots().await {
            out.push(slot.lock().await.clone());
        }
        out
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Exclusive handle on an existing session.
    pub async fn lock(&self, phone: &str) -> Option<SessionHandle> {
        let slot = self.slot(phone).await?;
        Some(slot.lock_owned().await)
    }

    /// Exclusive handle for an inbound message.
    ///
    /// Unknown phones get a fresh session in `Greeting`, unless durable
    /// storage says the phone was already escalated or closed, in which case
    /// the bot stays out of it and `None` is returned.
    pub async fn open(&self, phone: &str, now: DateTime<Utc>) -> Option<SessionHandle> {
        if let Some(slot) = self.slot(phone).await {
            return Some(slot.lock_owned().await);
        }

        match self.store.conversation_status(phone).await {
            Ok(Some(status)) if status.is_terminal() => {
                info!(phone, %status, "conversation handed off, bot will not reopen it");
                return None;
            }
            Ok(_) => {}
            Err(e) => warn!(phone, error = %e, "could not read stored conversation status"),
        }

        let slot = {
            let mut map = self.sessions.lock().await;
            map.entry(phone.to_string())
                .or_insert_with(|| {
                    debug!(phone, "new conversation");
                    Arc::new(Mutex::new(Session::new(phone, now)))
                })
                .clone()
        };
        Some(slot.lock_owned().await)
    }

    /// Log a message from a handed-off phone on its stored conversation
    /// without reopening it. Best-effort.
    pub async fn record_unattended(&self, phone: &str, text: &str, now: DateTime<Utc>) {
        let msg = ChatMessage {
            origin: Origin::Customer,
            text: text.to_string(),
            timestamp: now,
        };
        match self.store.append_message(phone, &msg).await {
            Ok(true) => debug!(phone, "message recorded on handed-off conversation"),
            Ok(false) => warn!(phone, "no stored conversation for handed-off phone"),
            Err(e) => warn!(phone, error = %e, "failed to record message on handed-off conversation"),
        }
    }

    /// Best-effort persist of the session snapshot. Failures are logged only.
    pub async fn checkpoint(&self, session: &Session) {
        if let Err(e) = self
            .store
            .save_conversation(&session.snapshot(Utc::now()))
            .await
        {
            warn!(phone = %session.phone, error = %e, "failed to persist conversation");
        }
    }

    /// Reload every open conversation from durable storage. Carts start empty.
    pub async fn restore(&self) -> Result<usize> {
        let snaps = self.store.load_open_conversations().await?;
        let n = snaps.len();
        for snap in snaps {
            self.upsert(Session::from_snapshot(snap)).await;
        }
        info!(conversations = n, "restored active conversations");
        Ok(n)
    }

    /// Nudge sessions idle for longer than `timeout`.
    ///
    /// A session is nudged at most once per idle period; the next customer
    /// message re-arms it. Sessions are never closed or escalated here.
    pub async fn sweep_inactive(
        &self,
        gateway: &dyn MessageGateway,
        timeout: Duration,
        now: DateTime<Utc>,
    ) -> usize {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let mut nudged = 0usize;

        for slot in self.slots().await {
            let mut session = slot.lock().await;
            if session.state == BotState::Closed || session.nudged_at.is_some() {
                continue;
            }
            let Some(last) = session.last_message_at() else {
                continue;
            };
            if now.signed_duration_since(last) <= timeout {
                continue;
            }

            let text = copy::inactivity_nudge(&session.customer_name);
            if !gateway.send_text(&session.phone, &text, false).await {
                warn!(phone = %session.phone, "inactivity nudge not delivered");
            }
            session.record_bot(&text, now);
            session.nudged_at = Some(now);
            self.checkpoint(&session).await;
            nudged += 1;
        }

        if nudged > 0 {
            info!(nudged, "inactivity sweep");
        }
        nudged
    }
}
