use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use cartbot_core::domain::order::{
    AddOutcome, CheckoutOutcome, OrderId, PlacedOrder, RemoveOutcome, SessionId,
};
use cartbot_db::repositories::OrderRepository;

use crate::intent::{OrderIntent, OrderParameters, QueryResult};
use crate::registry::SessionRegistry;

pub const MISMATCHED_PAIRS_TEXT: &str =
    "Please provide both product and quantity for each item.";
pub const EMPTY_CHECKOUT_TEXT: &str =
    "Bro, why are you not ordering something before checkout?";
pub const INACTIVE_ORDER_TEXT: &str = "Please start a new order first.";

const NEW_ORDER_FALLBACK: &str = "Okay, starting a new order. What would you like?";
const ADD_FALLBACK: &str = "Got it. Anything else?";
const REMOVE_FALLBACK: &str = "Done. Anything else?";

/// Routes recognized intents to the per-conversation order session and maps
/// operation outcomes to fulfillment text.
pub struct IntentDispatcher {
    sessions: SessionRegistry,
    orders: Arc<dyn OrderRepository>,
}

impl IntentDispatcher {
    pub fn new(sessions: SessionRegistry, orders: Arc<dyn OrderRepository>) -> Self {
        Self { sessions, orders }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Handles one conversation turn. Intents outside the ordering flow
    /// pass the NLU's own fulfillment text through untouched.
    pub async fn dispatch(&self, session_id: &SessionId, result: &QueryResult) -> String {
        match OrderIntent::from_display_name(&result.intent.display_name) {
            Some(OrderIntent::NewOrder) => self.handle_new_order(session_id, result).await,
            Some(OrderIntent::AddItems) => self.handle_add(session_id, result).await,
            Some(OrderIntent::RemoveItems) => self.handle_remove(session_id, result).await,
            Some(OrderIntent::Checkout) => self.handle_checkout(session_id).await,
            None => result.fulfillment_text.clone(),
        }
    }

    async fn handle_new_order(&self, session_id: &SessionId, result: &QueryResult) -> String {
        self.sessions.with_session(session_id, |session| session.start_new_order()).await;

        tracing::debug!(
            event_name = "dialog.order.started",
            session_id = %session_id.0,
            "order marked active"
        );

        passthrough_or(result, NEW_ORDER_FALLBACK)
    }

    async fn handle_add(&self, session_id: &SessionId, result: &QueryResult) -> String {
        let params = OrderParameters::from(&result.parameters);
        let outcome = self
            .sessions
            .with_session(session_id, |session| {
                session.add_items(&params.products, &params.quantities)
            })
            .await;

        match outcome {
            AddOutcome::LengthMismatch => {
                tracing::warn!(
                    event_name = "dialog.order.add_rejected",
                    session_id = %session_id.0,
                    products = params.products.len(),
                    quantities = params.quantities.len(),
                    "mismatched product/quantity pairs"
                );
                MISMATCHED_PAIRS_TEXT.to_string()
            }
            AddOutcome::Inactive => INACTIVE_ORDER_TEXT.to_string(),
            AddOutcome::Added { count } => {
                tracing::debug!(
                    event_name = "dialog.order.items_added",
                    session_id = %session_id.0,
                    count,
                    "line items appended"
                );
                passthrough_or(result, ADD_FALLBACK)
            }
        }
    }

    async fn handle_remove(&self, session_id: &SessionId, result: &QueryResult) -> String {
        let params = OrderParameters::from(&result.parameters);
        let outcome = self
            .sessions
            .with_session(session_id, |session| {
                session.remove_items(&params.products, &params.quantities)
            })
            .await;

        match outcome {
            RemoveOutcome::Inactive => INACTIVE_ORDER_TEXT.to_string(),
            RemoveOutcome::Applied { removed, decremented } => {
                tracing::debug!(
                    event_name = "dialog.order.items_removed",
                    session_id = %session_id.0,
                    removed,
                    decremented,
                    "removal applied"
                );
                passthrough_or(result, REMOVE_FALLBACK)
            }
        }
    }

    async fn handle_checkout(&self, session_id: &SessionId) -> String {
        let outcome = self.sessions.with_session(session_id, |session| session.finalize()).await;

        match outcome {
            CheckoutOutcome::EmptyOrder => EMPTY_CHECKOUT_TEXT.to_string(),
            CheckoutOutcome::Completed { lines, summary } => {
                let order = PlacedOrder {
                    id: OrderId(Uuid::new_v4().to_string()),
                    session_id: session_id.clone(),
                    lines,
                    placed_at: Utc::now(),
                };

                tracing::info!(
                    event_name = "dialog.order.checkout_completed",
                    session_id = %session_id.0,
                    order_id = %order.id.0,
                    line_count = order.lines.len(),
                    "checkout completed"
                );

                self.store_detached(order);
                summary
            }
        }
    }

    /// The confirmation text must not wait on durability: the store write
    /// runs in its own task, and a failure is logged rather than surfaced
    /// to the conversation.
    fn store_detached(&self, order: PlacedOrder) {
        let orders = Arc::clone(&self.orders);
        tokio::spawn(async move {
            let order_id = order.id.0.clone();
            let session_id = order.session_id.0.clone();
            match orders.save(order).await {
                Ok(()) => tracing::info!(
                    event_name = "dialog.order.stored",
                    order_id = %order_id,
                    session_id = %session_id,
                    "order stored"
                ),
                Err(error) => tracing::error!(
                    event_name = "dialog.order.store_failed",
                    order_id = %order_id,
                    session_id = %session_id,
                    error = %error,
                    "order persistence failed"
                ),
            }
        });
    }
}

fn passthrough_or(result: &QueryResult, fallback: &str) -> String {
    let text = result.fulfillment_text.trim();
    if text.is_empty() {
        fallback.to_string()
    } else {
        result.fulfillment_text.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use cartbot_core::domain::order::{OrderId, PlacedOrder, SessionId};
    use cartbot_db::repositories::{
        InMemoryOrderRepository, OrderRepository, RepositoryError,
    };

    use crate::intent::{IntentRef, QueryResult, RawParameters};
    use crate::registry::SessionRegistry;

    use super::{IntentDispatcher, EMPTY_CHECKOUT_TEXT, MISMATCHED_PAIRS_TEXT};

    fn turn(intent: &str, products: &[&str], numbers: &[Value]) -> QueryResult {
        QueryResult {
            intent: IntentRef { display_name: intent.to_string() },
            parameters: RawParameters {
                product: products.iter().map(|name| name.to_string()).collect(),
                number: numbers.to_vec(),
            },
            ..QueryResult::default()
        }
    }

    fn dispatcher() -> (IntentDispatcher, Arc<InMemoryOrderRepository>) {
        let repo = Arc::new(InMemoryOrderRepository::default());
        let dispatcher = IntentDispatcher::new(SessionRegistry::default(), repo.clone());
        (dispatcher, repo)
    }

    async fn stored_orders(repo: &InMemoryOrderRepository) -> Vec<PlacedOrder> {
        // The store write is detached; yield until the spawned task lands.
        for _ in 0..100 {
            let saved = repo.saved().await;
            if !saved.is_empty() {
                return saved;
            }
            tokio::task::yield_now().await;
        }
        repo.saved().await
    }

    #[tokio::test]
    async fn full_conversation_produces_summary_and_persists_merged_order() {
        let (dispatcher, repo) = dispatcher();
        let session = SessionId("s-1".to_string());

        dispatcher.dispatch(&session, &turn("order.new", &[], &[])).await;
        dispatcher
            .dispatch(&session, &turn("order.add", &["pizza", "soda"], &[json!(2), json!(1)]))
            .await;
        dispatcher.dispatch(&session, &turn("order.add", &["pizza"], &[json!(1)])).await;
        dispatcher.dispatch(&session, &turn("order.remove", &["soda"], &[])).await;
        let summary = dispatcher.dispatch(&session, &turn("order.completed", &[], &[])).await;

        assert_eq!(summary, "You have ordered\n(pizza: 3)");

        let saved = stored_orders(&repo).await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].session_id, session);
        assert_eq!(saved[0].lines.len(), 1);
        assert_eq!(saved[0].lines[0].product, "pizza");
        assert_eq!(saved[0].lines[0].quantity, 3);
    }

    #[tokio::test]
    async fn mismatched_pairs_return_advisory_and_mutate_nothing() {
        let (dispatcher, _repo) = dispatcher();
        let session = SessionId("s-2".to_string());

        let reply = dispatcher
            .dispatch(&session, &turn("order.add", &["tea", "coffee"], &[json!(1)]))
            .await;

        assert_eq!(reply, MISMATCHED_PAIRS_TEXT);
        let items =
            dispatcher.sessions().with_session(&session, |s| s.line_items().len()).await;
        assert_eq!(items, 0);
    }

    #[tokio::test]
    async fn empty_checkout_returns_advisory_and_persists_nothing() {
        let (dispatcher, repo) = dispatcher();
        let session = SessionId("s-3".to_string());

        let reply = dispatcher.dispatch(&session, &turn("order.completed", &[], &[])).await;

        assert_eq!(reply, EMPTY_CHECKOUT_TEXT);
        tokio::task::yield_now().await;
        assert!(repo.saved().await.is_empty());
    }

    #[tokio::test]
    async fn checkout_twice_reports_empty_the_second_time() {
        let (dispatcher, _repo) = dispatcher();
        let session = SessionId("s-4".to_string());

        dispatcher.dispatch(&session, &turn("order.add", &["tea"], &[json!(2)])).await;
        let first = dispatcher.dispatch(&session, &turn("order.completed", &[], &[])).await;
        let second = dispatcher.dispatch(&session, &turn("order.completed", &[], &[])).await;

        assert_eq!(first, "You have ordered\n(tea: 2)");
        assert_eq!(second, EMPTY_CHECKOUT_TEXT);
    }

    #[tokio::test]
    async fn removal_of_absent_product_is_silent() {
        let (dispatcher, _repo) = dispatcher();
        let session = SessionId("s-5".to_string());

        dispatcher.dispatch(&session, &turn("order.add", &["tea"], &[json!(2)])).await;
        dispatcher.dispatch(&session, &turn("order.remove", &["soda"], &[json!(1)])).await;

        let items =
            dispatcher.sessions().with_session(&session, |s| s.line_items().to_vec()).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product, "tea");
    }

    #[tokio::test]
    async fn unrecognized_intents_pass_fulfillment_text_through() {
        let (dispatcher, _repo) = dispatcher();
        let session = SessionId("s-6".to_string());

        let mut result = turn("smalltalk.greeting", &[], &[]);
        result.fulfillment_text = "Hello there!".to_string();

        let reply = dispatcher.dispatch(&session, &result).await;

        assert_eq!(reply, "Hello there!");
    }

    #[tokio::test]
    async fn sessions_do_not_leak_items_across_conversations() {
        let (dispatcher, _repo) = dispatcher();

        dispatcher
            .dispatch(&SessionId("alice".to_string()), &turn("order.add", &["tea"], &[json!(2)]))
            .await;
        let reply = dispatcher
            .dispatch(&SessionId("bob".to_string()), &turn("order.completed", &[], &[]))
            .await;

        assert_eq!(reply, EMPTY_CHECKOUT_TEXT);
    }

    struct FailingOrderRepository;

    #[async_trait::async_trait]
    impl OrderRepository for FailingOrderRepository {
        async fn save(&self, _order: PlacedOrder) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("disk on fire".to_string()))
        }

        async fn find_by_id(
            &self,
            _id: &OrderId,
        ) -> Result<Option<PlacedOrder>, RepositoryError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn checkout_confirms_even_when_persistence_fails() {
        let dispatcher = IntentDispatcher::new(
            SessionRegistry::default(),
            Arc::new(FailingOrderRepository),
        );
        let session = SessionId("s-7".to_string());

        dispatcher.dispatch(&session, &turn("order.add", &["pizza"], &[json!(1)])).await;
        let reply = dispatcher.dispatch(&session, &turn("order.completed", &[], &[])).await;

        assert_eq!(reply, "You have ordered\n(pizza: 1)");
    }
}
