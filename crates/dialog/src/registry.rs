use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use cartbot_core::domain::order::{OrderPolicy, OrderSession, SessionId};

struct SessionEntry {
    session: OrderSession,
    last_seen: DateTime<Utc>,
}

/// In-memory store of one `OrderSession` per conversation.
///
/// Sessions are created lazily on first use and keyed by the conversation
/// session id, so unrelated conversations never observe each other's state.
/// Entries untouched for longer than the configured idle window are dropped
/// by `evict_idle`.
#[derive(Clone)]
pub struct SessionRegistry {
    policy: OrderPolicy,
    entries: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new(policy: OrderPolicy) -> Self {
        Self { policy, entries: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Runs `operation` against the session for `id`, creating it first if
    /// this conversation has not been seen yet. The registry lock is held
    /// for the duration of the closure; session operations are synchronous
    /// and cheap, so one conversation turn never blocks on another's I/O.
    pub async fn with_session<R>(
        &self,
        id: &SessionId,
        operation: impl FnOnce(&mut OrderSession) -> R,
    ) -> R {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(id.0.clone()).or_insert_with(|| SessionEntry {
            session: OrderSession::new(self.policy),
            last_seen: Utc::now(),
        });
        entry.last_seen = Utc::now();
        operation(&mut entry.session)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops sessions idle for longer than `max_idle`; returns how many
    /// were evicted.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.last_seen > cutoff);
        before - entries.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(OrderPolicy::default())
    }
}
