//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::classifier::{Classification, ClassificationFailure, LlmIntentClassifier};
use crate::db::{Database, DbError, DemandAlert};
use crate::marketplace::{BackendError, HttpMarketplace};
use crate::notify::{NotifyError, WebhookNotifier};
use crate::state_machine::state::{
    CommitRequest, ConversationState, HistoryEntry, MatchResult, Sender,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The session store could not be read or written
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        StoreError(e.to_string())
    }
}

/// Per-user dialogue state, conversation log and waiting buyers
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Live state for a user; expired state reads as absent
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, StoreError>;

    /// Store state; every write restarts the expiry window
    async fn set_state(
        &self,
        user_id: &str,
        state: &ConversationState,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn clear_state(&self, user_id: &str) -> Result<(), StoreError>;

    async fn append_history(
        &self,
        user_id: &str,
        sender: Sender,
        text: &str,
    ) -> Result<(), StoreError>;

    /// Conversation log, oldest first
    async fn get_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, StoreError>;

    async fn clear_history(&self, user_id: &str) -> Result<(), StoreError>;

    async fn record_demand(
        &self,
        user_id: &str,
        product_name: &str,
        location: &str,
    ) -> Result<(), StoreError>;

    /// Remove and return the buyers waiting on a product in a location
    async fn take_demand(
        &self,
        product_name: &str,
        location: &str,
    ) -> Result<Vec<DemandAlert>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Turns free text into an intent and fields
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        user_id: &str,
        text: &str,
    ) -> Result<Classification, ClassificationFailure>;
}

/// The remote marketplace
#[async_trait]
pub trait MarketplaceBackend: Send + Sync {
    async fn commit(&self, request: &CommitRequest) -> Result<(), BackendError>;

    async fn search(
        &self,
        product_name: Option<&str>,
        location: Option<&str>,
    ) -> Result<Vec<MatchResult>, BackendError>;
}

/// Outbound messages to other users
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, phone: &str, text: &str) -> Result<(), NotifyError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, StoreError> {
        (**self).get_state(user_id).await
    }

    async fn set_state(
        &self,
        user_id: &str,
        state: &ConversationState,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        (**self).set_state(user_id, state, ttl).await
    }

    async fn clear_state(&self, user_id: &str) -> Result<(), StoreError> {
        (**self).clear_state(user_id).await
    }

    async fn append_history(
        &self,
        user_id: &str,
        sender: Sender,
        text: &str,
    ) -> Result<(), StoreError> {
        (**self).append_history(user_id, sender, text).await
    }

    async fn get_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        (**self).get_history(user_id).await
    }

    async fn clear_history(&self, user_id: &str) -> Result<(), StoreError> {
        (**self).clear_history(user_id).await
    }

    async fn record_demand(
        &self,
        user_id: &str,
        product_name: &str,
        location: &str,
    ) -> Result<(), StoreError> {
        (**self).record_demand(user_id, product_name, location).await
    }

    async fn take_demand(
        &self,
        product_name: &str,
        location: &str,
    ) -> Result<Vec<DemandAlert>, StoreError> {
        (**self).take_demand(product_name, location).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        (**self).ping().await
    }
}

#[async_trait]
impl<T: IntentClassifier + ?Sized> IntentClassifier for Arc<T> {
    async fn classify(
        &self,
        user_id: &str,
        text: &str,
    ) -> Result<Classification, ClassificationFailure> {
        (**self).classify(user_id, text).await
    }
}

#[async_trait]
impl<T: MarketplaceBackend + ?Sized> MarketplaceBackend for Arc<T> {
    async fn commit(&self, request: &CommitRequest) -> Result<(), BackendError> {
        (**self).commit(request).await
    }

    async fn search(
        &self,
        product_name: Option<&str>,
        location: Option<&str>,
    ) -> Result<Vec<MatchResult>, BackendError> {
        (**self).search(product_name, location).await
    }
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn send(&self, phone: &str, text: &str) -> Result<(), NotifyError> {
        (**self).send(phone, text).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a SessionStore
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, StoreError> {
        match self.db.get_state(user_id, Utc::now()) {
            Ok(state) => Ok(state),
            // Unreadable state is as good as none; the user starts over
            Err(DbError::CorruptState { source, .. }) => {
                tracing::warn!(user_id, error = %source, "Discarding corrupt dialogue state");
                self.db.clear_state(user_id)?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_state(
        &self,
        user_id: &str,
        state: &ConversationState,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        Ok(self.db.set_state(user_id, state, ttl, Utc::now())?)
    }

    async fn clear_state(&self, user_id: &str) -> Result<(), StoreError> {
        Ok(self.db.clear_state(user_id)?)
    }

    async fn append_history(
        &self,
        user_id: &str,
        sender: Sender,
        text: &str,
    ) -> Result<(), StoreError> {
        Ok(self.db.append_history(user_id, sender, text, Utc::now())?)
    }

    async fn get_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self.db.get_history(user_id)?)
    }

    async fn clear_history(&self, user_id: &str) -> Result<(), StoreError> {
        Ok(self.db.clear_history(user_id)?)
    }

    async fn record_demand(
        &self,
        user_id: &str,
        product_name: &str,
        location: &str,
    ) -> Result<(), StoreError> {
        Ok(self
            .db
            .record_demand(user_id, product_name, location, Utc::now())?)
    }

    async fn take_demand(
        &self,
        product_name: &str,
        location: &str,
    ) -> Result<Vec<DemandAlert>, StoreError> {
        Ok(self.db.take_demand(product_name, location)?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(self.db.ping()?)
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(
        &self,
        user_id: &str,
        text: &str,
    ) -> Result<Classification, ClassificationFailure> {
        LlmIntentClassifier::classify(self, user_id, text).await
    }
}

#[async_trait]
impl MarketplaceBackend for HttpMarketplace {
    async fn commit(&self, request: &CommitRequest) -> Result<(), BackendError> {
        HttpMarketplace::commit(self, request).await
    }

    async fn search(
        &self,
        product_name: Option<&str>,
        location: Option<&str>,
    ) -> Result<Vec<MatchResult>, BackendError> {
        HttpMarketplace::search(self, product_name, location).await
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, phone: &str, text: &str) -> Result<(), NotifyError> {
        WebhookNotifier::send(self, phone, text).await
    }
}
