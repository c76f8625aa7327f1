//! Dialogue turn executor

use super::traits::{IntentClassifier, MarketplaceBackend, Notifier, SessionStore, StoreError};
use crate::classifier::{Classification, ClassificationFailure};
use crate::state_machine::replies;
use crate::state_machine::state::{ConversationState, DialoguePhase, FieldValue, MatchResult};
use crate::state_machine::{transition, ConvContext, Effect, Event, TransitionError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::Instrument;

/// A turn could not be completed
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("session store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Knobs the executor needs that are not dependencies
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    pub session_ttl: Duration,
    pub classifier_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(3600),
            classifier_timeout: Duration::from_secs(30),
        }
    }
}

/// Runs dialogue turns against any store, classifier, backend and notifier
pub struct DialogueRuntime<S, C, M, N>
where
    S: SessionStore,
    C: IntentClassifier,
    M: MarketplaceBackend,
    N: Notifier + 'static,
{
    store: S,
    classifier: C,
    marketplace: M,
    notifier: Arc<N>,
    config: RuntimeConfig,
}

impl<S, C, M, N> DialogueRuntime<S, C, M, N>
where
    S: SessionStore,
    C: IntentClassifier,
    M: MarketplaceBackend,
    N: Notifier + 'static,
{
    pub fn new(
        store: S,
        classifier: C,
        marketplace: M,
        notifier: N,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            store,
            classifier,
            marketplace,
            notifier: Arc::new(notifier),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Classify text, bounded by the configured timeout
    pub async fn classify(
        &self,
        user_id: &str,
        text: &str,
    ) -> Result<Classification, ClassificationFailure> {
        tokio::time::timeout(
            self.config.classifier_timeout,
            self.classifier.classify(user_id, text),
        )
        .await
        .unwrap_or(Err(ClassificationFailure::Timeout))
    }

    /// Run one inbound message to completion and return the reply text.
    ///
    /// The caller is responsible for serializing turns of the same user.
    pub async fn handle_turn(&self, user_id: &str, text: &str) -> Result<String, TurnError> {
        let span = tracing::info_span!(
            "turn",
            user_id,
            turn_id = %uuid::Uuid::new_v4(),
        );
        self.run_turn(user_id, text).instrument(span).await
    }

    async fn run_turn(&self, user_id: &str, text: &str) -> Result<String, TurnError> {
        let start = std::time::Instant::now();
        let context = ConvContext::new(user_id);
        let mut state = self.store.get_state(user_id).await?;
        let mut reply = None;

        // Process events in a loop - effects may produce follow-up events
        let mut events_to_process = vec![Event::UserMessage {
            text: text.to_string(),
        }];

        while let Some(event) = events_to_process.pop() {
            let result = transition(state.as_ref(), &context, event)?;
            for effect in result.effects {
                if let Some(next) = self
                    .execute_effect(&context, &mut state, &mut reply, effect)
                    .await?
                {
                    events_to_process.push(next);
                }
            }
        }

        let reply = reply.ok_or_else(|| {
            TransitionError::InvalidTransition("turn finished without a reply".to_string())
        })?;
        tracing::info!(
            duration_ms = %start.elapsed().as_millis(),
            phase = ?DialoguePhase::of(state.as_ref()),
            intent = ?state.as_ref().map(|s| s.intent),
            "Turn complete"
        );
        Ok(reply)
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(
        &self,
        context: &ConvContext,
        state: &mut Option<ConversationState>,
        reply: &mut Option<String>,
        effect: Effect,
    ) -> Result<Option<Event>, TurnError> {
        let user_id = context.user_id.as_str();
        match effect {
            Effect::AppendHistory { sender, text } => {
                self.store.append_history(user_id, sender, &text).await?;
                Ok(None)
            }

            Effect::PersistState(new_state) => {
                self.store
                    .set_state(user_id, &new_state, self.config.session_ttl)
                    .await?;
                *state = Some(new_state);
                Ok(None)
            }

            Effect::ClearState => {
                self.store.clear_state(user_id).await?;
                *state = None;
                Ok(None)
            }

            Effect::Classify { text } => {
                Ok(Some(match self.classify(user_id, &text).await {
                    Ok(c) => {
                        tracing::info!(
                            intent = %c.intent,
                            fields = c.fields.len(),
                            "Message classified"
                        );
                        Event::Classified {
                            intent: c.intent,
                            fields: c.fields,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Could not classify message");
                        Event::ClassificationFailed {
                            reason: e.to_string(),
                        }
                    }
                }))
            }

            Effect::Commit(request) => {
                let intent = request.intent();
                Ok(Some(match self.marketplace.commit(&request).await {
                    Ok(()) => {
                        tracing::info!(%intent, "Transaction committed");
                        Event::CommitSucceeded { request }
                    }
                    Err(e) => {
                        tracing::error!(%intent, error = %e, "Transaction commit failed");
                        Event::CommitFailed {
                            intent,
                            message: e.to_string(),
                        }
                    }
                }))
            }

            Effect::SearchSellers {
                product_name,
                location,
            } => {
                let search = self
                    .marketplace
                    .search(product_name.as_deref(), location.as_deref())
                    .await;
                Ok(Some(match search {
                    Ok(matches) => Event::SearchCompleted {
                        product_name,
                        location,
                        matches,
                    },
                    Err(e) => {
                        tracing::error!(
                            ?product_name,
                            ?location,
                            error = %e,
                            "Seller search failed"
                        );
                        Event::SearchFailed {
                            message: e.to_string(),
                        }
                    }
                }))
            }

            Effect::NotifySellers {
                product_name,
                location,
                matches,
            } => {
                self.notify_sellers(product_name.as_deref(), location.as_deref(), &matches);
                Ok(None)
            }

            Effect::RecordDemand {
                product_name,
                location,
            } => {
                // The buyer already has their answer; a lost alert never fails the turn
                if let Err(e) = self
                    .store
                    .record_demand(user_id, &product_name, &location)
                    .await
                {
                    tracing::warn!(%product_name, %location, error = %e, "Failed to record demand");
                }
                Ok(None)
            }

            Effect::NotifyWaitingBuyers {
                product_name,
                location,
                price,
                seller_phone,
            } => {
                self.notify_waiting_buyers(&product_name, &location, &price, &seller_phone)
                    .await;
                Ok(None)
            }

            Effect::Reply { text } => {
                *reply = Some(text);
                Ok(None)
            }
        }
    }

    fn notify_sellers(
        &self,
        product_name: Option<&str>,
        location: Option<&str>,
        matches: &[MatchResult],
    ) {
        for listing in matches {
            let text = replies::seller_notice(product_name, location, listing);
            self.spawn_notification(listing.seller_phone.clone(), text);
        }
    }

    async fn notify_waiting_buyers(
        &self,
        product_name: &str,
        location: &str,
        price: &FieldValue,
        seller_phone: &str,
    ) {
        let waiting = match self.store.take_demand(product_name, location).await {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(
                    %product_name,
                    %location,
                    error = %e,
                    "Failed to load waiting buyers"
                );
                return;
            }
        };

        for alert in waiting {
            if alert.user_id == seller_phone {
                continue;
            }
            let text = replies::buyer_alert(product_name, location, price, seller_phone);
            self.spawn_notification(alert.user_id, text);
        }
    }

    /// Fire-and-forget send; failures are logged, never surfaced to the turn
    fn spawn_notification(&self, phone: String, text: String) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(
            async move {
                if let Err(e) = notifier.send(&phone, &text).await {
                    tracing::warn!(%phone, error = %e, "Notification failed");
                }
            }
            .in_current_span(),
        );
    }
}

/// Reply for a turn that could not be completed
pub fn failure_reply(error: &TurnError) -> &'static str {
    match error {
        TurnError::StoreUnavailable(_) => replies::SERVICE_DEGRADED,
        TurnError::Transition(_) => replies::NOT_UNDERSTOOD,
    }
}

