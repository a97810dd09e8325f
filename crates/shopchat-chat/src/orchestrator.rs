//! Query orchestrator: drives one user turn against the search service.
//!
//! A turn appends the user message, calls the search service once, ranks
//! whatever comes back against the answer prose, and appends exactly one
//! bot reply. Search failures become an apology message, never an error.

use tracing::{debug, error, info};

use shopchat_core::{Message, MessageId};

use crate::conversation::{select_primary, Clock, Conversation, IdGenerator, SystemClock};
use crate::error::ChatError;
use crate::ranker::{ProductRanker, SubstringMatcher, TitleMatcher};
use crate::search::{SearchResponse, SearchService};

/// Maximum number of products requested per query.
pub const RESULT_LIMIT: usize = 5;

/// Answer shown when the service returns products but no prose.
pub const FALLBACK_ANSWER: &str = "I couldn't find anything specific, but here are some options.";

/// Reply shown when the search call fails.
pub const APOLOGY: &str =
    "Sorry, I couldn't reach the store just now. Please try again in a moment.";

// =============================================================================
// Turn state
// =============================================================================

/// Whether a query is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Pending {
        user_message: MessageId,
        reply_id: MessageId,
    },
}

/// A turn that has been accepted and is waiting for its search result.
///
/// Only [`ShoppingAssistant::begin_turn`] creates one, and
/// [`ShoppingAssistant::complete_turn`] consumes it.
#[derive(Debug)]
pub struct PendingTurn {
    query: String,
    user_message: MessageId,
    reply_id: MessageId,
}

impl PendingTurn {
    /// The trimmed query text to send to the search service.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn user_message(&self) -> MessageId {
        self.user_message
    }

    pub fn reply_id(&self) -> MessageId {
        self.reply_id
    }
}

// =============================================================================
// ShoppingAssistant
// =============================================================================

/// Owns one conversation and the turn state that guards it.
pub struct ShoppingAssistant<S, C = SystemClock, M = SubstringMatcher> {
    search: S,
    ranker: ProductRanker<M>,
    conversation: Conversation,
    state: TurnState,
    ids: IdGenerator<C>,
    input: String,
}

impl<S: SearchService> ShoppingAssistant<S, SystemClock> {
    /// A new assistant with a seeded conversation and the system clock.
    pub fn new(search: S) -> Self {
        Self::with_clock(search, SystemClock)
    }
}

impl<S: SearchService, C: Clock> ShoppingAssistant<S, C> {
    pub fn with_clock(search: S, clock: C) -> Self {
        let conversation = Conversation::new();
        let ids = IdGenerator::new(clock, conversation.last_id());
        info!(session_id = %conversation.session_id(), "Conversation started");
        Self {
            search,
            ranker: ProductRanker::new(),
            conversation,
            state: TurnState::Idle,
            ids,
            input: String::new(),
        }
    }
}

impl<S: SearchService, C: Clock, M: TitleMatcher> ShoppingAssistant<S, C, M> {
    /// Replace the ranker, e.g. to plug in a different title matcher.
    pub fn with_ranker<N: TitleMatcher>(
        self,
        ranker: ProductRanker<N>,
    ) -> ShoppingAssistant<S, C, N> {
        ShoppingAssistant {
            search: self.search,
            ranker,
            conversation: self.conversation,
            state: self.state,
            ids: self.ids,
            input: self.input,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// False while a turn is pending. UIs disable their submit trigger on it.
    pub fn can_submit(&self) -> bool {
        self.state == TurnState::Idle
    }

    pub fn input_buffer(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Run a full turn for `raw`.
    ///
    /// Returns the id of the bot reply, or `None` if the input was blank or
    /// another turn is still pending.
    pub async fn submit(&mut self, raw: &str) -> Option<MessageId> {
        let turn = self.begin_turn(raw).ok()?;
        let outcome = self.search.search(turn.query(), RESULT_LIMIT).await;
        Some(self.complete_turn(turn, outcome))
    }

    /// Run a full turn for the current input buffer.
    pub async fn submit_input(&mut self) -> Option<MessageId> {
        let raw = self.input.clone();
        self.submit(&raw).await
    }

    /// Accept a submission: append the user message and enter `Pending`.
    ///
    /// Blank input and submissions while pending are rejected without any
    /// state change.
    pub fn begin_turn(&mut self, raw: &str) -> Result<PendingTurn, ChatError> {
        if let TurnState::Pending { reply_id, .. } = self.state {
            debug!(%reply_id, "Ignoring submission while a turn is pending");
            return Err(ChatError::TurnInFlight);
        }
        let query = raw.trim();
        if query.is_empty() {
            debug!("Ignoring blank submission");
            return Err(ChatError::EmptyMessage);
        }

        let user_message = self.ids.next_id();
        let reply_id = self.ids.next_id();
        self.conversation
            .append(Message::user(user_message, query))
            .inspect_err(|e| error!(error = %e, "Failed to record user message"))?;

        self.input.clear();
        self.state = TurnState::Pending {
            user_message,
            reply_id,
        };
        debug!(%user_message, %reply_id, "Turn pending");

        Ok(PendingTurn {
            query: query.to_string(),
            user_message,
            reply_id,
        })
    }

    /// Finish a turn with the search outcome and return to `Idle`.
    ///
    /// Appends exactly one bot message and returns its id.
    pub fn complete_turn(
        &mut self,
        turn: PendingTurn,
        outcome: Result<SearchResponse, ChatError>,
    ) -> MessageId {
        let reply = match outcome {
            Ok(response) => self.build_reply(turn.reply_id, response),
            Err(e) => {
                error!(error = %e, query = %turn.query, "Search failed");
                Message::bot(turn.reply_id, APOLOGY)
            }
        };

        if let Err(e) = self.conversation.append(reply) {
            error!(error = %e, reply_id = %turn.reply_id, "Failed to record bot reply");
        }
        self.state = TurnState::Idle;
        turn.reply_id
    }

    fn build_reply(&self, reply_id: MessageId, response: SearchResponse) -> Message {
        let answer = response
            .answer
            .unwrap_or_else(|| FALLBACK_ANSWER.to_string());
        let ranked = self.ranker.order(&response.results, &answer);
        let primary = select_primary(response.primary_product_id.as_ref(), &ranked);

        debug!(
            %reply_id,
            products = ranked.len(),
            primary = ?primary.as_ref().map(|p| p.as_str()),
            "Search answered"
        );
        Message::bot_with_products(reply_id, answer, ranked, primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use shopchat_core::{ProductId, Sender};

    /// Clock frozen at one instant.
    struct FrozenClock(u64);

    impl Clock for FrozenClock {
        fn now_millis(&self) -> u64 {
            self.0
        }
    }

    /// Search double that replays a canned body or fails.
    #[derive(Clone)]
    struct MockSearch {
        reply: Result<Value, String>,
        calls: Arc<Mutex<Vec<(String, usize)>>>,
    }

    impl MockSearch {
        fn answering(body: Value) -> Self {
            Self {
                reply: Ok(body),
                calls: Arc::default(),
            }
        }

        fn failing(reason: &str) -> Self {
            Self {
                reply: Err(reason.to_string()),
                calls: Arc::default(),
            }
        }

        fn calls(&self) -> Vec<(String, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchService for MockSearch {
        async fn search(&self, query: &str, limit: usize) -> Result<SearchResponse, ChatError> {
            self.calls.lock().unwrap().push((query.to_string(), limit));
            match &self.reply {
                Ok(body) => SearchResponse::from_value(body),
                Err(reason) => Err(ChatError::Transport(reason.clone())),
            }
        }
    }

    fn assistant(search: MockSearch) -> ShoppingAssistant<MockSearch, FrozenClock> {
        ShoppingAssistant::with_clock(search, FrozenClock(1_700_000_000_000))
    }

    fn hoodie_body() -> Value {
        json!({
            "answer": "The **Classic Hoodie** is perfect.",
            "results": [
                {"id": 2, "title": "Classic Hoodie", "rank": 1},
                {"id": 1, "title": "Denim Jacket", "rank": 0}
            ]
        })
    }

    // =========================================================================
    // Happy path
    // =========================================================================

    #[tokio::test]
    async fn test_text_mention_orders_products_and_picks_primary() {
        let search = MockSearch::answering(hoodie_body());
        let mut bot = assistant(search.clone());

        let reply_id = bot.submit("show me oversized hoodies under 2000").await.unwrap();

        let convo = bot.conversation();
        assert_eq!(convo.len(), 3);
        let reply = convo.last().unwrap();
        assert_eq!(reply.id(), reply_id);
        assert_eq!(reply.sender(), Sender::Bot);
        let titles: Vec<&str> = reply.products().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Classic Hoodie", "Denim Jacket"]);
        assert_eq!(reply.primary_product_id(), Some(&ProductId::from(2)));
        assert_eq!(
            search.calls(),
            vec![("show me oversized hoodies under 2000".to_string(), RESULT_LIMIT)]
        );
        assert_eq!(bot.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn test_user_message_precedes_reply_in_same_instant() {
        let mut bot = assistant(MockSearch::answering(hoodie_body()));
        bot.submit("hoodies").await.unwrap();

        let messages = bot.conversation().messages();
        assert_eq!(messages[1].sender(), Sender::User);
        assert_eq!(messages[1].text(), "hoodies");
        assert!(messages[1].products().is_empty());
        assert!(messages[2].id() > messages[1].id());
    }

    #[tokio::test]
    async fn test_query_is_trimmed() {
        let search = MockSearch::answering(hoodie_body());
        let mut bot = assistant(search.clone());
        bot.submit("   crop tops  \n").await.unwrap();
        assert_eq!(bot.conversation().messages()[1].text(), "crop tops");
        assert_eq!(search.calls()[0].0, "crop tops");
    }

    #[tokio::test]
    async fn test_declared_primary_overrides_first_ranked() {
        let mut body = hoodie_body();
        body["primary_product_id"] = json!(1);
        let mut bot = assistant(MockSearch::answering(body));
        bot.submit("jackets").await.unwrap();

        let reply = bot.conversation().last().unwrap();
        assert_eq!(reply.products()[0].title, "Classic Hoodie");
        assert_eq!(reply.primary_product_id(), Some(&ProductId::from(1)));
    }

    #[tokio::test]
    async fn test_missing_answer_uses_fallback() {
        let body = json!({"results": [{"id": 3, "title": "Gym Shorts"}]});
        let mut bot = assistant(MockSearch::answering(body));
        bot.submit("shorts").await.unwrap();

        let reply = bot.conversation().last().unwrap();
        assert_eq!(reply.text(), FALLBACK_ANSWER);
        assert_eq!(reply.products().len(), 1);
        assert_eq!(reply.primary_product_id(), Some(&ProductId::from(3)));
    }

    #[tokio::test]
    async fn test_missing_results_yields_reply_without_products() {
        let body = json!({"answer": "Nothing in stock."});
        let mut bot = assistant(MockSearch::answering(body));
        bot.submit("capes").await.unwrap();

        let reply = bot.conversation().last().unwrap();
        assert_eq!(reply.text(), "Nothing in stock.");
        assert!(reply.products().is_empty());
        assert!(reply.primary_product_id().is_none());
    }

    // =========================================================================
    // Failure and rejection
    // =========================================================================

    #[tokio::test]
    async fn test_search_failure_appends_single_apology() {
        let mut bot = assistant(MockSearch::failing("connection refused"));
        let before = bot.conversation().len();

        bot.submit("hoodies").await.unwrap();

        let convo = bot.conversation();
        assert_eq!(convo.len(), before + 2);
        let reply = convo.last().unwrap();
        assert_eq!(reply.sender(), Sender::Bot);
        assert_eq!(reply.text(), APOLOGY);
        assert!(!reply.text().contains("connection refused"));
        assert!(reply.products().is_empty());
        assert_eq!(bot.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn test_malformed_body_is_recovered() {
        let mut bot = assistant(MockSearch::answering(json!("not an object")));
        bot.submit("hoodies").await.unwrap();
        assert_eq!(bot.conversation().last().unwrap().text(), APOLOGY);
    }

    #[tokio::test]
    async fn test_blank_submission_is_ignored() {
        let search = MockSearch::answering(hoodie_body());
        let mut bot = assistant(search.clone());
        bot.set_input("   ");

        assert!(bot.submit("").await.is_none());
        assert!(bot.submit(" \t\n ").await.is_none());
        assert!(bot.submit_input().await.is_none());

        assert_eq!(bot.conversation().len(), 1);
        assert_eq!(bot.input_buffer(), "   ");
        assert!(search.calls().is_empty());
        assert!(matches!(bot.begin_turn("  "), Err(ChatError::EmptyMessage)));
        assert!(bot.can_submit());
    }

    #[test]
    fn test_second_submission_rejected_while_pending() {
        let mut bot = assistant(MockSearch::answering(hoodie_body()));

        let turn = bot.begin_turn("hoodies").unwrap();
        assert!(!bot.can_submit());
        assert_eq!(
            bot.state(),
            TurnState::Pending {
                user_message: turn.user_message(),
                reply_id: turn.reply_id(),
            }
        );
        assert!(matches!(
            bot.begin_turn("jackets"),
            Err(ChatError::TurnInFlight)
        ));
        assert_eq!(bot.conversation().len(), 2);

        let outcome = SearchResponse::from_value(&hoodie_body());
        let reply_id = bot.complete_turn(turn, outcome);
        assert!(bot.can_submit());
        assert_eq!(bot.conversation().last().unwrap().id(), reply_id);
        assert!(bot.begin_turn("jackets").is_ok());
    }

    /// Ignores titles entirely, so only rank and id decide.
    struct BlindMatcher;

    impl TitleMatcher for BlindMatcher {
        fn locate(&self, _answer: &str, _title: &str) -> Option<usize> {
            None
        }
    }

    #[tokio::test]
    async fn test_custom_matcher_plugs_into_assistant() {
        let mut bot = assistant(MockSearch::answering(hoodie_body()))
            .with_ranker(ProductRanker::with_matcher(BlindMatcher));
        bot.submit("hoodies").await.unwrap();

        let reply = bot.conversation().last().unwrap();
        let titles: Vec<&str> = reply.products().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Denim Jacket", "Classic Hoodie"]);
        assert_eq!(reply.primary_product_id(), Some(&ProductId::from(1)));
    }

    #[tokio::test]
    async fn test_input_buffer_cleared_on_accept() {
        let mut bot = assistant(MockSearch::answering(hoodie_body()));
        bot.set_input("tank tops");
        bot.submit_input().await.unwrap();
        assert_eq!(bot.input_buffer(), "");
        assert_eq!(bot.conversation().messages()[1].text(), "tank tops");
    }

    #[tokio::test]
    async fn test_many_turns_stay_ordered() {
        let mut bot = assistant(MockSearch::answering(hoodie_body()));
        for query in ["a", "b", "c"] {
            bot.submit(query).await.unwrap();
        }
        let ids: Vec<MessageId> = bot.conversation().messages().iter().map(|m| m.id()).collect();
        assert_eq!(ids.len(), 7);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
