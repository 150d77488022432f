//! Live Thought Feed
//!
//! Layers a push stream on top of the file-backed store without the store
//! having to know about push at all: one shared polling task, one `since`
//! read per tick, fan-out into per-subscriber channels. Low event rates make
//! a 1 s poll the simplest correct model; an in-process broadcast fed by
//! `append` would remove the poll delay if that ever stops being true.

use crate::models::ThoughtEvent;
use crate::thoughts::store::ThoughtStore;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const SUBSCRIBER_BUFFER: usize = 256;

pub struct ThoughtFeed {
    store: Arc<ThoughtStore>,
    cursor: Mutex<DateTime<Utc>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

struct Subscriber {
    connected_at: DateTime<Utc>,
    tx: mpsc::Sender<ThoughtEvent>,
}

impl ThoughtFeed {
    pub fn new(store: Arc<ThoughtStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            cursor: Mutex::new(Utc::now()),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Build the feed and start the shared polling loop.
    pub fn spawn(store: Arc<ThoughtStore>, tick: Duration) -> Arc<Self> {
        let feed = Self::new(store);
        let poller = feed.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                poller.poll_once();
            }
        });
        feed
    }

    /// Register a subscriber. It receives only thoughts appended after this
    /// call, never historical backlog.
    pub fn subscribe(&self) -> mpsc::Receiver<ThoughtEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.lock().push(Subscriber {
            connected_at: Utc::now(),
            tx,
        });
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// One poll cycle. Kept separate from the loop so tests drive ticks
    /// deterministically.
    pub fn poll_once(&self) {
        let mut cursor = self.cursor.lock();
        let new_thoughts = match self.store.since(*cursor) {
            Ok(thoughts) => thoughts,
            Err(e) => {
                // Cursor stays put: the next tick retries the same window,
                // so a failed read delays delivery but loses nothing.
                warn!("thought feed poll failed: {}", e);
                return;
            }
        };
        if new_thoughts.is_empty() {
            return;
        }
        *cursor = Utc::now();
        drop(cursor);

        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|sub| {
            // `since` returns newest-first; deliver oldest-first.
            for event in new_thoughts.iter().rev() {
                if event.timestamp <= sub.connected_at {
                    continue;
                }
                if sub.tx.try_send(event.clone()).is_err() {
                    // Closed or hopelessly backed up: deregister, no retry.
                    return false;
                }
            }
            true
        });
        if subs.len() < before {
            debug!("dropped {} closed stream subscriber(s)", before - subs.len());
        }
    }
}
