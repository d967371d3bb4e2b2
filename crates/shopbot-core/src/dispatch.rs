//! Ordered hand-off from the webhook to the engine.
//!
//! Every inbound message goes through one queue in arrival order. A single
//! routing task forwards it to a mailbox for its phone, and each mailbox has
//! one worker feeding the engine, so a phone's messages are handled in the
//! order they were queued while different phones proceed in parallel.

use std::{collections::HashMap, sync::Arc};

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::{JoinHandle, JoinSet},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{engine::ConversationEngine, messaging::types::InboundMessage};

/// Sending side of the inbound queue. Cheap to clone.
#[derive(Clone)]
pub struct InboundQueue {
    tx: UnboundedSender<InboundMessage>,
}

impl InboundQueue {
    /// Queue a message. Returns `false` once the dispatcher has stopped.
    pub fn enqueue(&self, msg: InboundMessage) -> bool {
        match self.tx.send(msg) {
            Ok(()) => true,
            Err(e) => {
                warn!(phone = %e.0.from, "dispatcher stopped, inbound message dropped");
                false
            }
        }
    }
}

pub struct Dispatcher {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Dispatcher {
    pub fn spawn(engine: Arc<ConversationEngine>) -> (InboundQueue, Dispatcher) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(route(engine, rx, cancel.clone()));
        (InboundQueue { tx }, Dispatcher { cancel, handle })
    }

    /// Stop accepting messages, finish the ones already queued, then return.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "inbound dispatcher ended abnormally");
        }
        info!("inbound dispatcher stopped");
    }
}

struct Mailboxes {
    engine: Arc<ConversationEngine>,
    by_phone: HashMap<String, UnboundedSender<InboundMessage>>,
    workers: JoinSet<()>,
}

impl Mailboxes {
    fn deliver(&mut self, msg: InboundMessage) {
        let engine = &self.engine;
        let workers = &mut self.workers;
        let tx = self.by_phone.entry(msg.from.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            workers.spawn(drain(engine.clone(), rx));
            debug!(phone = %msg.from, "mailbox opened");
            tx
        });
        if let Err(e) = tx.send(msg) {
            warn!(phone = %e.0.from, "mailbox closed, inbound message dropped");
        }
    }
}

async fn route(
    engine: Arc<ConversationEngine>,
    mut rx: UnboundedReceiver<InboundMessage>,
    cancel: CancellationToken,
) {
    let mut boxes = Mailboxes {
        engine,
        by_phone: HashMap::new(),
        workers: JoinSet::new(),
    };

    loop {
        tokio::select! {
          biased;
          _ = cancel.cancelled() => break,
          next = rx.recv() => match next {
            Some(msg) => boxes.deliver(msg),
            None => break,
          },
        }
    }

    rx.close();
    while let Ok(msg) = rx.try_recv() {
        boxes.deliver(msg);
    }

    // Closing every mailbox lets each worker finish its backlog and exit.
    boxes.by_phone.clear();
    while let Some(res) = boxes.workers.join_next().await {
        if let Err(e) = res {
            warn!(error = %e, "mailbox worker ended abnormally");
        }
    }
}

async fn drain(engine: Arc<ConversationEngine>, mut rx: UnboundedReceiver<InboundMessage>) {
    while let Some(msg) = rx.recv().await {
        engine.handle(msg).await;
    }
}
