//! Runtime for executing dialogue turns
//!
//! `DialogueRuntime` runs a single turn; `RuntimeManager` makes sure turns
//! for the same user never overlap.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{failure_reply, DialogueRuntime, RuntimeConfig, TurnError};
pub use traits::*;

use crate::state_machine::state::HistoryEntry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Manager over trait objects, so the HTTP layer can run on real or mock I/O
pub type SharedRuntimeManager = RuntimeManager<
    Arc<dyn SessionStore>,
    Arc<dyn IntentClassifier>,
    Arc<dyn MarketplaceBackend>,
    Arc<dyn Notifier>,
>;

/// Serializes turns per user around a shared `DialogueRuntime`
pub struct RuntimeManager<S, C, M, N>
where
    S: SessionStore,
    C: IntentClassifier,
    M: MarketplaceBackend,
    N: Notifier + 'static,
{
    runtime: DialogueRuntime<S, C, M, N>,
    /// One lock per user with a turn in flight
    user_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S, C, M, N> RuntimeManager<S, C, M, N>
where
    S: SessionStore,
    C: IntentClassifier,
    M: MarketplaceBackend,
    N: Notifier + 'static,
{
    pub fn new(runtime: DialogueRuntime<S, C, M, N>) -> Self {
        Self {
            runtime,
            user_locks: RwLock::new(HashMap::new()),
        }
    }

    pub fn runtime(&self) -> &DialogueRuntime<S, C, M, N> {
        &self.runtime
    }

    /// Handle an inbound message and always produce a reply.
    ///
    /// Failures that stop the turn become an apology; a store outage gets
    /// its own reply so it can be told apart from a misunderstanding.
    pub async fn handle_message(&self, user_id: &str, text: &str) -> String {
        let lock = self.user_lock(user_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.runtime.handle_turn(user_id, text).await
        };
        drop(lock);
        self.prune(user_id).await;

        match result {
            Ok(reply) => reply,
            Err(e) => {
                match &e {
                    TurnError::StoreUnavailable(_) => {
                        tracing::error!(
                            user_id,
                            error = %e,
                            degraded = true,
                            "Session store unavailable"
                        );
                    }
                    TurnError::Transition(_) => {
                        tracing::error!(user_id, error = %e, "Turn aborted");
                    }
                }
                failure_reply(&e).to_string()
            }
        }
    }

    /// Explicit reset: forget the dialogue and the conversation log
    pub async fn reset(&self, user_id: &str) -> Result<(), StoreError> {
        let lock = self.user_lock(user_id).await;
        let result = {
            let _guard = lock.lock().await;
            let store = self.runtime.store();
            match store.clear_state(user_id).await {
                Ok(()) => store.clear_history(user_id).await,
                Err(e) => Err(e),
            }
        };
        drop(lock);
        self.prune(user_id).await;

        if result.is_ok() {
            tracing::info!(user_id, "Reset user session");
        }
        result
    }

    pub async fn history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        self.runtime.store().get_history(user_id).await
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.user_locks.read().await.get(user_id) {
            return Arc::clone(lock);
        }
        let mut locks = self.user_locks.write().await;
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }

    /// Drop the user's lock once nobody holds or waits on it
    async fn prune(&self, user_id: &str) {
        let mut locks = self.user_locks.write().await;
        if locks
            .get(user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(user_id);
        }
    }

    #[cfg(test)]
    pub(crate) async fn tracked_users(&self) -> usize {
        self.user_locks.read().await.len()
    }
}
