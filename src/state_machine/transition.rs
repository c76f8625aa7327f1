//! Pure state transition function
//!
//! One turn is a chain of events: the user's message, then whatever the
//! classifier or marketplace reports back. Each event maps the stored state
//! to a list of effects; state changes are themselves effects
//! (`PersistState` / `ClearState`).

use super::replies;
use super::state::{CommitRequest, ConvContext, ConversationState, FieldValue, Fields, Intent};
use super::{Effect, Event};
use crate::slots;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug, Default)]
pub struct TransitionResult {
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    /// Append the bot reply to history, then hand it to the caller
    pub fn replying(self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.with_effect(Effect::bot_said(text.clone()))
            .with_effect(Effect::reply(text))
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Control words recognised before classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlWord {
    Yes,
    No,
}

fn control_word(text: &str) -> Option<ControlWord> {
    match text.trim().to_lowercase().as_str() {
        "yes" => Some(ControlWord::Yes),
        "no" => Some(ControlWord::No),
        _ => None,
    }
}

/// Pure transition function
///
/// Given the same stored state and event it always produces the same
/// effects, with no I/O.
pub fn transition(
    state: Option<&ConversationState>,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Inbound message
        // ============================================================
        (state, Event::UserMessage { text }) => {
            let result = TransitionResult::new().with_effect(Effect::user_said(text.clone()));

            match (control_word(&text), state) {
                (Some(ControlWord::Yes), Some(pending)) if pending.awaiting_confirmation => {
                    Ok(result.with_effects(confirm(pending, context).effects))
                }
                (Some(ControlWord::No), _) => Ok(result
                    .with_effect(Effect::ClearState)
                    .replying(replies::CANCELLED)),
                // "yes" with nothing to confirm is ordinary text
                _ => Ok(result.with_effect(Effect::Classify { text })),
            }
        }

        // ============================================================
        // Classification
        // ============================================================
        (_, Event::ClassificationFailed { .. }) => {
            Ok(TransitionResult::new().replying(replies::NOT_UNDERSTOOD))
        }

        (state, Event::Classified { intent, fields }) => {
            let existing = state.map(|s| s.fields.clone()).unwrap_or_default();
            let merged = slots::merge(&existing, &fields);

            if let Some(missing) = slots::next_missing(intent, &merged) {
                return Ok(TransitionResult::new()
                    .with_effect(Effect::PersistState(ConversationState::collecting(
                        intent, merged,
                    )))
                    .replying(replies::ask_for(missing)));
            }

            if intent == Intent::Buy {
                // Buy skips confirmation and goes straight to matching
                return Ok(TransitionResult::new().with_effect(Effect::SearchSellers {
                    product_name: field_text(&merged, "product_name"),
                    location: field_text(&merged, "location"),
                }));
            }

            let prompt = replies::confirmation(intent, &merged);
            Ok(TransitionResult::new()
                .with_effect(Effect::PersistState(ConversationState::confirming(
                    intent, merged,
                )))
                .replying(prompt))
        }

        // ============================================================
        // Commit outcome
        // ============================================================
        (Some(pending), Event::CommitSucceeded { request }) if pending.awaiting_confirmation => {
            let intent = request.intent();
            let mut result = TransitionResult::new().with_effect(Effect::ClearState);
            if let CommitRequest::CreateListing {
                phone,
                product_name,
                location,
                price,
                ..
            } = request
            {
                if let (Some(product_name), Some(location)) =
                    (product_name.as_text(), location.as_text())
                {
                    result = result.with_effect(Effect::NotifyWaitingBuyers {
                        product_name,
                        location,
                        price,
                        seller_phone: phone,
                    });
                }
            }
            Ok(result.replying(replies::committed(intent)))
        }

        (Some(pending), Event::CommitFailed { intent, .. }) if pending.awaiting_confirmation => {
            Ok(TransitionResult::new()
                .with_effect(Effect::ClearState)
                .replying(replies::commit_failed(intent)))
        }

        (state, Event::CommitSucceeded { .. } | Event::CommitFailed { .. }) => {
            Err(TransitionError::InvalidTransition(format!(
                "commit outcome without a pending confirmation (state: {state:?})"
            )))
        }

        // ============================================================
        // Buyer/seller matching
        // ============================================================
        (
            state,
            Event::SearchCompleted {
                product_name,
                location,
                matches,
            },
        ) => {
            let mut result = TransitionResult::new().with_effects(clear_stale_buy(state));

            if matches.is_empty() {
                let text = replies::no_sellers(product_name.as_deref(), location.as_deref());
                // An alert needs both terms to match a future listing
                if let (Some(product_name), Some(location)) = (product_name, location) {
                    result = result.with_effect(Effect::RecordDemand {
                        product_name,
                        location,
                    });
                }
                return Ok(result.replying(text));
            }

            let summary =
                replies::matches_found(product_name.as_deref(), location.as_deref(), &matches);
            Ok(result
                .with_effect(Effect::bot_said(summary.clone()))
                .with_effect(Effect::NotifySellers {
                    product_name,
                    location,
                    matches,
                })
                .with_effect(Effect::reply(summary)))
        }

        (state, Event::SearchFailed { .. }) => Ok(TransitionResult::new()
            .with_effects(clear_stale_buy(state))
            .replying(replies::SEARCH_FAILED)),
    }
}

/// Handle YES while a confirmation is pending
fn confirm(pending: &ConversationState, context: &ConvContext) -> TransitionResult {
    let fields = &pending.fields;
    let phone = context.user_id.clone();

    let request = match pending.intent {
        Intent::Sell => CommitRequest::CreateListing {
            phone,
            product_name: field(fields, "product_name"),
            quantity: field(fields, "quantity"),
            price: field(fields, "price"),
            location: field(fields, "location"),
            category: field(fields, "category"),
            description: optional_text(fields, "description"),
        },
        Intent::Register => CommitRequest::RegisterSeller {
            phone,
            business_name: field(fields, "business_name"),
            location: field(fields, "location"),
            payment_method: field(fields, "payment_method"),
        },
        Intent::Review => {
            let rating = fields
                .get("rating")
                .and_then(FieldValue::as_integer)
                .filter(|r| (1..=5).contains(r));
            let Some(rating) = rating else {
                // Local rejection: the pending confirmation stays as it is
                return TransitionResult::new().replying(replies::INVALID_RATING);
            };
            CommitRequest::SubmitReview {
                phone,
                rating,
                comment: optional_text(fields, "comment"),
            }
        }
        Intent::Buy | Intent::ProductInfo => {
            return TransitionResult::new()
                .with_effect(Effect::ClearState)
                .replying(replies::CANNOT_CONFIRM);
        }
    };

    TransitionResult::new().with_effect(Effect::Commit(request))
}

fn field(fields: &Fields, name: &str) -> FieldValue {
    fields.get(name).cloned().unwrap_or(FieldValue::Null)
}

fn optional_text(fields: &Fields, name: &str) -> FieldValue {
    fields
        .get(name)
        .cloned()
        .unwrap_or_else(|| FieldValue::Text(String::new()))
}

fn field_text(fields: &Fields, name: &str) -> Option<String> {
    fields.get(name).and_then(FieldValue::as_text)
}

/// A finished search ends a buy slot-fill, but leaves any other pending dialogue alone
fn clear_stale_buy(state: Option<&ConversationState>) -> Option<Effect> {
    state
        .filter(|s| s.intent == Intent::Buy)
        .map(|_| Effect::ClearState)
}
