//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::classifier::{Classification, ClassificationFailure};
use crate::db::DemandAlert;
use crate::marketplace::BackendError;
use crate::notify::NotifyError;
use crate::state_machine::state::{
    CommitRequest, ConversationState, Fields, HistoryEntry, Intent, MatchResult, Sender,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Classifier
// ============================================================================

/// Classifier that returns queued results in order
#[derive(Default)]
pub struct MockClassifier {
    results: Mutex<VecDeque<Result<Classification, ClassificationFailure>>>,
    delay: Option<Duration>,
    /// Every text handed to the classifier
    pub calls: Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering (for timeout and ordering tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue(&self, intent: Intent, fields: Fields) {
        self.results
            .lock()
            .unwrap()
            .push_back(Ok(Classification { intent, fields }));
    }

    pub fn queue_failure(&self, failure: ClassificationFailure) {
        self.results.lock().unwrap().push_back(Err(failure));
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntentClassifier for MockClassifier {
    async fn classify(
        &self,
        _user_id: &str,
        text: &str,
    ) -> Result<Classification, ClassificationFailure> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ClassificationFailure::MissingIntent))
    }
}

// ============================================================================
// Mock Marketplace
// ============================================================================

/// Backend that records requests; commits succeed and searches come back
/// empty unless told otherwise
#[derive(Default)]
pub struct MockMarketplace {
    commit_results: Mutex<VecDeque<Result<(), BackendError>>>,
    search_results: Mutex<VecDeque<Result<Vec<MatchResult>, BackendError>>>,
    pub commits: Mutex<Vec<CommitRequest>>,
    pub searches: Mutex<Vec<(Option<String>, Option<String>)>>,
}

impl MockMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_commit(&self, result: Result<(), BackendError>) {
        self.commit_results.lock().unwrap().push_back(result);
    }

    pub fn queue_search(&self, result: Result<Vec<MatchResult>, BackendError>) {
        self.search_results.lock().unwrap().push_back(result);
    }

    pub fn recorded_commits(&self) -> Vec<CommitRequest> {
        self.commits.lock().unwrap().clone()
    }

    pub fn recorded_searches(&self) -> Vec<(Option<String>, Option<String>)> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketplaceBackend for MockMarketplace {
    async fn commit(&self, request: &CommitRequest) -> Result<(), BackendError> {
        self.commits.lock().unwrap().push(request.clone());
        self.commit_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn search(
        &self,
        product_name: Option<&str>,
        location: Option<&str>,
    ) -> Result<Vec<MatchResult>, BackendError> {
        self.searches
            .lock()
            .unwrap()
            .push((product_name.map(str::to_string), location.map(str::to_string)));
        self.search_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ============================================================================
// Mock Notifier
// ============================================================================

/// Notifier that records every outbound message
#[derive(Default)]
pub struct MockNotifier {
    fail: bool,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails after being recorded
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Sends happen on spawned tasks; wait until `count` have been recorded
    pub async fn wait_for(&self, count: usize) -> Vec<(String, String)> {
        for _ in 0..200 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.recorded()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, phone: &str, text: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), text.to_string()));
        if self.fail {
            return Err(NotifyError::Status(503));
        }
        Ok(())
    }
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Session store backed by hash maps. Expiry is not modelled; the last TTL
/// used per user is recorded instead.
#[derive(Default)]
pub struct InMemoryStore {
    states: Mutex<HashMap<String, ConversationState>>,
    ttls: Mutex<HashMap<String, Duration>>,
    history: Mutex<HashMap<String, Vec<HistoryEntry>>>,
    demand: Mutex<Vec<DemandAlert>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, user_id: &str) -> Option<ConversationState> {
        self.states.lock().unwrap().get(user_id).cloned()
    }

    pub fn ttl(&self, user_id: &str) -> Option<Duration> {
        self.ttls.lock().unwrap().get(user_id).copied()
    }

    pub fn history(&self, user_id: &str) -> Vec<HistoryEntry> {
        self.history
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn demand(&self) -> Vec<DemandAlert> {
        self.demand.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, StoreError> {
        Ok(self.state(user_id))
    }

    async fn set_state(
        &self,
        user_id: &str,
        state: &ConversationState,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.states
            .lock()
            .unwrap()
            .insert(user_id.to_string(), state.clone());
        self.ttls.lock().unwrap().insert(user_id.to_string(), ttl);
        Ok(())
    }

    async fn clear_state(&self, user_id: &str) -> Result<(), StoreError> {
        self.states.lock().unwrap().remove(user_id);
        Ok(())
    }

    async fn append_history(
        &self,
        user_id: &str,
        sender: Sender,
        text: &str,
    ) -> Result<(), StoreError> {
        self.history
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push(HistoryEntry {
                sender,
                text: text.to_string(),
            });
        Ok(())
    }

    async fn get_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self.history(user_id))
    }

    async fn clear_history(&self, user_id: &str) -> Result<(), StoreError> {
        self.history.lock().unwrap().remove(user_id);
        Ok(())
    }

    async fn record_demand(
        &self,
        user_id: &str,
        product_name: &str,
        location: &str,
    ) -> Result<(), StoreError> {
        let mut demand = self.demand.lock().unwrap();
        demand.retain(|a| {
            !(a.user_id == user_id && a.product_name == product_name && a.location == location)
        });
        demand.push(DemandAlert {
            user_id: user_id.to_string(),
            product_name: product_name.to_string(),
            location: location.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn take_demand(
        &self,
        product_name: &str,
        location: &str,
    ) -> Result<Vec<DemandAlert>, StoreError> {
        let mut demand = self.demand.lock().unwrap();
        let (taken, kept) = demand.drain(..).partition(|a| {
            a.product_name.eq_ignore_ascii_case(product_name)
                && a.location.eq_ignore_ascii_case(location)
        });
        *demand = kept;
        Ok(taken)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// Failing Store
// ============================================================================

/// Store whose every operation fails, as when the database is gone
pub struct FailingStore;

impl FailingStore {
    fn err<T>() -> Result<T, StoreError> {
        Err(StoreError("connection refused".to_string()))
    }
}

#[async_trait]
impl SessionStore for FailingStore {
    async fn get_state(&self, _: &str) -> Result<Option<ConversationState>, StoreError> {
        Self::err()
    }

    async fn set_state(
        &self,
        _: &str,
        _: &ConversationState,
        _: Duration,
    ) -> Result<(), StoreError> {
        Self::err()
    }

    async fn clear_state(&self, _: &str) -> Result<(), StoreError> {
        Self::err()
    }

    async fn append_history(&self, _: &str, _: Sender, _: &str) -> Result<(), StoreError> {
        Self::err()
    }

    async fn get_history(&self, _: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        Self::err()
    }

    async fn clear_history(&self, _: &str) -> Result<(), StoreError> {
        Self::err()
    }

    async fn record_demand(&self, _: &str, _: &str, _: &str) -> Result<(), StoreError> {
        Self::err()
    }

    async fn take_demand(&self, _: &str, _: &str) -> Result<Vec<DemandAlert>, StoreError> {
        Self::err()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Self::err()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{DialogueRuntime, RuntimeConfig, RuntimeManager};
    use crate::state_machine::replies;
    use crate::state_machine::state::FieldValue;
    use std::sync::Arc;

    const BUYER: &str = "+263770000001";
    const SELLER: &str = "+263771000002";

    type TestRuntime = DialogueRuntime<
        Arc<InMemoryStore>,
        Arc<MockClassifier>,
        Arc<MockMarketplace>,
        Arc<MockNotifier>,
    >;

    struct Harness {
        store: Arc<InMemoryStore>,
        classifier: Arc<MockClassifier>,
        marketplace: Arc<MockMarketplace>,
        notifier: Arc<MockNotifier>,
        runtime: TestRuntime,
    }

    impl Harness {
        fn new() -> Self {
            Self::with(MockClassifier::new(), MockNotifier::new(), RuntimeConfig::default())
        }

        fn with(classifier: MockClassifier, notifier: MockNotifier, config: RuntimeConfig) -> Self {
            let store = Arc::new(InMemoryStore::new());
            let classifier = Arc::new(classifier);
            let marketplace = Arc::new(MockMarketplace::new());
            let notifier = Arc::new(notifier);
            let runtime = DialogueRuntime::new(
                store.clone(),
                classifier.clone(),
                marketplace.clone(),
                notifier.clone(),
                config,
            );
            Self {
                store,
                classifier,
                marketplace,
                notifier,
                runtime,
            }
        }

        async fn say(&self, user: &str, text: &str) -> String {
            self.runtime.handle_turn(user, text).await.unwrap()
        }
    }

    fn fields(pairs: &[(&str, FieldValue)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn maize_listing(seller: &str) -> MatchResult {
        MatchResult {
            product_name: "maize".into(),
            price: FieldValue::Integer(8),
            location: "Gweru Urban".into(),
            seller_phone: seller.into(),
        }
    }

    /// Scenarios A, B and C: collect, confirm, commit
    #[tokio::test]
    async fn test_sell_flow_collects_confirms_and_commits() {
        let h = Harness::new();

        h.classifier.queue(
            Intent::Sell,
            fields(&[
                ("product_name", "maize".into()),
                ("quantity", "10kg".into()),
                ("location", "Gweru Urban".into()),
                ("price", FieldValue::Integer(8)),
            ]),
        );
        let reply = h.say(SELLER, "I want to sell 10kg maize in Gweru for $8").await;
        assert_eq!(reply, "Thanks! Can you tell me your category?");
        let state = h.store.state(SELLER).unwrap();
        assert!(!state.awaiting_confirmation);
        assert_eq!(state.fields.len(), 4);
        assert_eq!(h.store.ttl(SELLER), Some(Duration::from_secs(3600)));

        h.classifier
            .queue(Intent::Sell, fields(&[("category", "grains".into())]));
        let reply = h.say(SELLER, "grains").await;
        assert!(reply.starts_with("You're trying to sell with:"));
        for line in [
            "- product name: maize",
            "- quantity: 10kg",
            "- location: Gweru Urban",
            "- price: 8",
            "- category: grains",
        ] {
            assert!(reply.contains(line), "missing {line} in {reply}");
        }
        assert!(h.store.state(SELLER).unwrap().awaiting_confirmation);

        let reply = h.say(SELLER, "  YES ").await;
        assert_eq!(reply, "✅ Your sell information has been saved!");
        assert_eq!(h.store.state(SELLER), None);

        let commits = h.marketplace.recorded_commits();
        assert_eq!(commits.len(), 1);
        match &commits[0] {
            CommitRequest::CreateListing {
                phone,
                price,
                description,
                ..
            } => {
                assert_eq!(phone, SELLER);
                assert_eq!(price, &FieldValue::Integer(8));
                assert_eq!(description, &FieldValue::Text(String::new()));
            }
            other => panic!("unexpected commit {other:?}"),
        }
        // "yes" on a pending confirmation never reaches the classifier
        assert_eq!(h.classifier.recorded_calls().len(), 2);
    }

    /// Scenario D: an out-of-range rating is rejected and the confirmation stays
    #[tokio::test]
    async fn test_invalid_rating_keeps_confirmation() {
        let h = Harness::new();
        h.classifier
            .queue(Intent::Review, fields(&[("rating", FieldValue::Integer(6))]));

        let reply = h.say(BUYER, "review them 6 stars").await;
        assert!(reply.contains("- rating: 6"));
        let before = h.store.state(BUYER).unwrap();
        assert!(before.awaiting_confirmation);

        let reply = h.say(BUYER, "yes").await;
        assert_eq!(reply, replies::INVALID_RATING);
        assert_eq!(h.store.state(BUYER), Some(before));
        assert!(h.marketplace.recorded_commits().is_empty());

        let reply = h.say(BUYER, "no").await;
        assert_eq!(reply, replies::CANCELLED);
        assert_eq!(h.store.state(BUYER), None);
    }

    /// Scenario E: a complete buy with no matches never enters confirmation
    #[tokio::test]
    async fn test_buy_without_matches_records_demand() {
        let h = Harness::new();
        h.classifier.queue(
            Intent::Buy,
            fields(&[
                ("product_name", "maize".into()),
                ("location", "Gweru Urban".into()),
            ]),
        );

        let reply = h.say(BUYER, "looking for maize in Gweru").await;
        assert_eq!(reply, replies::no_sellers(Some("maize"), Some("Gweru Urban")));
        assert_eq!(h.store.state(BUYER), None);
        assert_eq!(
            h.marketplace.recorded_searches(),
            vec![(Some("maize".to_string()), Some("Gweru Urban".to_string()))]
        );

        let demand = h.store.demand();
        assert_eq!(demand.len(), 1);
        assert_eq!(demand[0].user_id, BUYER);
    }

    #[tokio::test]
    async fn test_buy_with_matches_notifies_each_seller() {
        let h = Harness::new();
        h.classifier.queue(
            Intent::Buy,
            fields(&[
                ("product_name", "maize".into()),
                ("location", "Gweru Urban".into()),
            ]),
        );
        h.marketplace.queue_search(Ok(vec![
            maize_listing(SELLER),
            maize_listing("+263771000003"),
        ]));

        let reply = h.say(BUYER, "need maize in Gweru").await;
        assert!(reply.starts_with("✅ Found 2 match(es) for maize in Gweru Urban:"));

        let sent = h.notifier.wait_for(2).await;
        assert_eq!(sent.len(), 2);
        let phones: Vec<&str> = sent.iter().map(|(p, _)| p.as_str()).collect();
        assert!(phones.contains(&SELLER));
        assert!(phones.contains(&"+263771000003"));
        assert!(sent[0].1.contains("A buyer is looking for maize in Gweru Urban"));
        assert!(h.store.demand().is_empty());
    }

    #[tokio::test]
    async fn test_failed_notifications_do_not_change_the_reply() {
        let h = Harness::with(
            MockClassifier::new(),
            MockNotifier::failing(),
            RuntimeConfig::default(),
        );
        h.classifier.queue(
            Intent::Buy,
            fields(&[
                ("product_name", "maize".into()),
                ("location", "Gweru Urban".into()),
            ]),
        );
        h.marketplace.queue_search(Ok(vec![maize_listing(SELLER)]));

        let reply = h.say(BUYER, "need maize").await;
        assert!(reply.starts_with("✅ Found 1 match(es)"));
        assert_eq!(h.notifier.wait_for(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_new_listing_alerts_waiting_buyers() {
        let h = Harness::new();
        h.classifier.queue(
            Intent::Buy,
            fields(&[
                ("product_name", "maize".into()),
                ("location", "Gweru Urban".into()),
            ]),
        );
        h.say(BUYER, "need maize in Gweru").await;
        assert_eq!(h.store.demand().len(), 1);

        h.classifier.queue(
            Intent::Sell,
            fields(&[
                ("product_name", "Maize".into()),
                ("quantity", "10kg".into()),
                ("location", "gweru urban".into()),
                ("price", FieldValue::Integer(8)),
                ("category", "grains".into()),
            ]),
        );
        h.say(SELLER, "selling 10kg maize in Gweru for $8, grains").await;
        h.say(SELLER, "yes").await;

        let sent = h.notifier.wait_for(1).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, BUYER);
        assert!(sent[0].1.contains("Contact the seller: +263771000002"));
        assert!(h.store.demand().is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_clears_and_apologizes() {
        let h = Harness::new();
        h.classifier.queue(
            Intent::Register,
            fields(&[
                ("business_name", "Moyo Farms".into()),
                ("location", "Gweru Urban".into()),
                ("payment_method", "ecocash".into()),
            ]),
        );
        h.say(SELLER, "register Moyo Farms").await;
        h.marketplace.queue_commit(Err(BackendError::Status {
            status: 500,
            body: "boom".into(),
        }));

        let reply = h.say(SELLER, "yes").await;
        assert_eq!(reply, replies::commit_failed(Intent::Register));
        assert_eq!(h.store.state(SELLER), None);
        assert!(h.notifier.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_clears_and_apologizes() {
        let h = Harness::new();
        h.classifier.queue(
            Intent::Buy,
            fields(&[("product_name", "goats".into())]),
        );
        h.say(BUYER, "I want goats").await;
        assert!(h.store.state(BUYER).is_some());

        h.classifier
            .queue(Intent::Buy, fields(&[("location", "Gweru Urban".into())]));
        h.marketplace.queue_search(Err(BackendError::Timeout));
        let reply = h.say(BUYER, "in Gweru").await;
        assert_eq!(reply, replies::SEARCH_FAILED);
        assert_eq!(h.store.state(BUYER), None);
        assert_eq!(
            h.marketplace.recorded_searches(),
            vec![(Some("goats".to_string()), Some("Gweru Urban".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_buy_keeps_pending_listing_confirmation() {
        let h = Harness::new();
        h.classifier.queue(
            Intent::Sell,
            fields(&[
                ("product_name", "maize".into()),
                ("quantity", "10kg".into()),
                ("location", "Gweru Urban".into()),
                ("price", FieldValue::Integer(8)),
                ("category", "grains".into()),
            ]),
        );
        let reply = h.say(SELLER, "selling 10kg maize in Gweru for $8, grains").await;
        assert!(reply.starts_with("You're trying to sell with:"));
        let pending = h.store.state(SELLER).unwrap();

        h.classifier.queue(
            Intent::Buy,
            fields(&[
                ("product_name", "beans".into()),
                ("location", "Harare".into()),
            ]),
        );
        let reply = h.say(SELLER, "also looking for beans in Harare").await;
        assert_eq!(reply, replies::no_sellers(Some("beans"), Some("Harare")));
        assert_eq!(h.store.state(SELLER), Some(pending));

        let reply = h.say(SELLER, "yes").await;
        assert_eq!(reply, "✅ Your sell information has been saved!");
        assert_eq!(h.marketplace.recorded_commits().len(), 1);
        assert_eq!(h.store.state(SELLER), None);
    }

    #[tokio::test]
    async fn test_null_product_is_searched_as_absent() {
        let h = Harness::new();
        h.classifier.queue(
            Intent::Buy,
            fields(&[
                ("product_name", FieldValue::Null),
                ("location", "Harare".into()),
            ]),
        );

        let reply = h.say(BUYER, "anything in Harare?").await;
        assert_eq!(reply, replies::no_sellers(None, Some("Harare")));
        assert!(!reply.contains("(none)"));
        assert_eq!(
            h.marketplace.recorded_searches(),
            vec![(None, Some("Harare".to_string()))]
        );
        assert!(h.store.demand().is_empty());
    }

    #[tokio::test]
    async fn test_classification_failure_keeps_state() {
        let h = Harness::new();
        h.classifier
            .queue(Intent::Buy, fields(&[("product_name", "goats".into())]));
        h.say(BUYER, "I want goats").await;
        let before = h.store.state(BUYER);

        h.classifier
            .queue_failure(ClassificationFailure::NotJson("oops".into()));
        let reply = h.say(BUYER, "???").await;
        assert_eq!(reply, replies::NOT_UNDERSTOOD);
        assert_eq!(h.store.state(BUYER), before);
    }

    #[tokio::test]
    async fn test_slow_classifier_times_out() {
        let h = Harness::with(
            MockClassifier::new().with_delay(Duration::from_millis(200)),
            MockNotifier::new(),
            RuntimeConfig {
                classifier_timeout: Duration::from_millis(20),
                ..RuntimeConfig::default()
            },
        );
        h.classifier.queue(Intent::Sell, Fields::new());

        let reply = h.say(BUYER, "hello").await;
        assert_eq!(reply, replies::NOT_UNDERSTOOD);
        assert_eq!(h.store.state(BUYER), None);
    }

    #[tokio::test]
    async fn test_product_info_cannot_be_confirmed() {
        let h = Harness::new();
        h.classifier
            .queue(Intent::ProductInfo, fields(&[("product_name", "maize".into())]));

        let reply = h.say(BUYER, "what is maize going for?").await;
        assert!(reply.starts_with("You're trying to product_info with:"));

        let reply = h.say(BUYER, "yes").await;
        assert_eq!(reply, replies::CANNOT_CONFIRM);
        assert_eq!(h.store.state(BUYER), None);
    }

    #[tokio::test]
    async fn test_every_exchange_is_logged_in_order() {
        let h = Harness::new();
        let reply = h.say(BUYER, "no").await;

        assert_eq!(
            h.store.history(BUYER),
            vec![
                HistoryEntry {
                    sender: Sender::User,
                    text: "no".into()
                },
                HistoryEntry {
                    sender: Sender::Bot,
                    text: reply
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_store_outage_gets_degraded_reply() {
        let manager = RuntimeManager::new(DialogueRuntime::new(
            FailingStore,
            MockClassifier::new(),
            MockMarketplace::new(),
            MockNotifier::new(),
            RuntimeConfig::default(),
        ));

        let err = manager.runtime().handle_turn(BUYER, "hi").await.unwrap_err();
        assert!(matches!(err, crate::runtime::TurnError::StoreUnavailable(_)));

        let reply = manager.handle_message(BUYER, "hi").await;
        assert_eq!(reply, replies::SERVICE_DEGRADED);
        assert!(manager.reset(BUYER).await.is_err());
    }

    #[tokio::test]
    async fn test_turns_for_one_user_are_serialized() {
        let store = Arc::new(InMemoryStore::new());
        let classifier = Arc::new(MockClassifier::new().with_delay(Duration::from_millis(30)));
        classifier.queue(Intent::Buy, fields(&[("product_name", "goats".into())]));
        classifier.queue(Intent::Buy, fields(&[("location", "Gweru Urban".into())]));
        let manager = Arc::new(RuntimeManager::new(DialogueRuntime::new(
            store.clone(),
            classifier,
            Arc::new(MockMarketplace::new()),
            MockNotifier::new(),
            RuntimeConfig::default(),
        )));

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.handle_message(BUYER, "I want goats").await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = tokio::spawn({
            let manager = manager.clone();
            async move { manager.handle_message(BUYER, "in Gweru").await }
        });

        assert_eq!(first.await.unwrap(), "Thanks! Can you tell me your location?");
        // The second turn saw the first turn's fields, so the buy completed
        assert_eq!(
            second.await.unwrap(),
            replies::no_sellers(Some("goats"), Some("Gweru Urban"))
        );
        assert_eq!(manager.tracked_users().await, 0);
    }

    #[tokio::test]
    async fn test_reset_clears_state_and_history() {
        let store = Arc::new(InMemoryStore::new());
        let classifier = Arc::new(MockClassifier::new());
        classifier.queue(Intent::Buy, fields(&[("product_name", "goats".into())]));
        let manager = RuntimeManager::new(DialogueRuntime::new(
            store.clone(),
            classifier,
            MockMarketplace::new(),
            MockNotifier::new(),
            RuntimeConfig::default(),
        ));

        manager.handle_message(BUYER, "I want goats").await;
        assert!(store.state(BUYER).is_some());
        assert_eq!(manager.history(BUYER).await.unwrap().len(), 2);

        manager.reset(BUYER).await.unwrap();
        assert_eq!(store.state(BUYER), None);
        assert!(manager.history(BUYER).await.unwrap().is_empty());
    }
}
