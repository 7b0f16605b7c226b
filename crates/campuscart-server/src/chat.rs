//! Realtime chat between the two parties of a request.
//!
//! Messages are persisted first and then fanned out on a per-request
//! `broadcast` channel. A [`ChatSubscription`] yields each message id at
//! most once; dropping the last subscription removes the channel.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use campuscart_shared::error::Result;
use campuscart_shared::MarketError;
use campuscart_store::Message;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::SharedDb;

/// Per-request buffer of not-yet-received live messages.
const CHANNEL_CAPACITY: usize = 64;

type Channels = Arc<Mutex<HashMap<Uuid, broadcast::Sender<Message>>>>;

#[derive(Clone)]
pub struct ChatHub {
    db: SharedDb,
    channels: Channels,
}

impl ChatHub {
    pub fn new(db: SharedDb) -> Self {
        Self {
            db,
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Persist a message from `sender` and publish it to live subscribers.
    pub async fn send_message(&self, request_id: Uuid, sender: Uuid, text: &str) -> Result<Message> {
        if text.trim().is_empty() {
            return Err(MarketError::validation("message cannot be empty"));
        }

        let message = {
            let db = self.db.lock().await;
            ensure_party(&db, request_id, sender)?;
            db.append_message(request_id, sender, text)?
        };

        let receivers = match self.lock_channels().get(&request_id) {
            Some(tx) => tx.send(message.clone()).unwrap_or(0),
            None => 0,
        };
        tracing::debug!(
            request_id = %request_id,
            message_id = %message.id,
            receivers,
            "chat message sent"
        );
        Ok(message)
    }

    /// Whole conversation, oldest first.
    pub async fn load_history(&self, request_id: Uuid, viewer: Uuid) -> Result<Vec<Message>> {
        let db = self.db.lock().await;
        ensure_party(&db, request_id, viewer)?;
        Ok(db.get_messages_for_request(request_id)?)
    }

    /// Live messages inserted after this call.
    pub async fn subscribe(&self, request_id: Uuid, viewer: Uuid) -> Result<ChatSubscription> {
        {
            let db = self.db.lock().await;
            ensure_party(&db, request_id, viewer)?;
        }
        Ok(self.register(request_id))
    }

    /// Subscribe, then load history. Nothing sent in between is lost and
    /// nothing in the history is yielded again by the subscription.
    pub async fn open(&self, request_id: Uuid, viewer: Uuid) -> Result<(Vec<Message>, ChatSubscription)> {
        let mut subscription = self.subscribe(request_id, viewer).await?;
        let history = self.load_history(request_id, viewer).await?;
        subscription.mark_seen(history.iter().map(|m| m.id));
        Ok((history, subscription))
    }

    fn register(&self, request_id: Uuid) -> ChatSubscription {
        let rx = self
            .lock_channels()
            .entry(request_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();

        tracing::debug!(request_id = %request_id, "chat subscriber joined");
        ChatSubscription {
            request_id,
            rx,
            seen: HashSet::new(),
            channels: self.channels.clone(),
        }
    }

    fn lock_channels(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, broadcast::Sender<Message>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn channel_count(&self) -> usize {
        self.lock_channels().len()
    }
}

fn ensure_party(db: &campuscart_store::Database, request_id: Uuid, user: Uuid) -> Result<()> {
    let request = db.get_request(request_id)?;
    if request.party_of(user).is_none() {
        return Err(MarketError::Role {
            user,
            request: request_id,
        });
    }
    Ok(())
}

/// Handle on one request's live messages. Unsubscribes on drop.
pub struct ChatSubscription {
    request_id: Uuid,
    rx: broadcast::Receiver<Message>,
    seen: HashSet<Uuid>,
    channels: Channels,
}

impl ChatSubscription {
    /// Treat these ids as already delivered.
    pub fn mark_seen(&mut self, ids: impl IntoIterator<Item = Uuid>) {
        self.seen.extend(ids);
    }

    /// Next message not yet yielded. `None` once the channel is gone.
    pub async fn next(&mut self) -> Option<Message> {
        loop {
            match self.rx.recv().await {
                Ok(message) => {
                    if self.seen.insert(message.id) {
                        return Some(message);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        request_id = %self.request_id,
                        skipped,
                        "chat subscriber lagged, messages remain in history"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for ChatSubscription {
    fn drop(&mut self) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let last = channels
            .get(&self.request_id)
            .is_some_and(|tx| tx.receiver_count() <= 1);
        if last {
            channels.remove(&self.request_id);
            tracing::debug!(request_id = %self.request_id, "chat channel closed");
        }
    }
}
