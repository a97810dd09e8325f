//! Conversation store.
//!
//! An append-only, strictly ordered log of messages for one session, plus
//! the id source that keeps it ordered and the per-message render view.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use shopchat_core::{Message, MessageId, ProductId, ProductRef, Sender};

use crate::error::ChatError;
use crate::render::{render, ParagraphBlock};

/// Text of the message every conversation starts with.
pub const GREETING: &str =
    "Hi! Tell me what you're looking for and I'll pull up some options.";

/// Id of the seeded greeting.
pub const GREETING_ID: MessageId = MessageId(1);

// =============================================================================
// Clock and ids
// =============================================================================

/// Source of wall-clock time in milliseconds.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Wall clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Issues strictly increasing message ids from a clock.
///
/// Each id is the current time, bumped past the previous id when the clock
/// has not advanced (or went backwards).
#[derive(Debug, Clone)]
pub struct IdGenerator<C> {
    clock: C,
    last: MessageId,
}

impl<C: Clock> IdGenerator<C> {
    /// Start issuing ids strictly after `last`.
    pub fn new(clock: C, last: MessageId) -> Self {
        Self { clock, last }
    }

    pub fn next_id(&mut self) -> MessageId {
        let now = self.clock.now_millis();
        let next = now.max(self.last.0.saturating_add(1));
        self.last = MessageId(next);
        self.last
    }

    pub fn last(&self) -> MessageId {
        self.last
    }
}

// =============================================================================
// Primary product
// =============================================================================

/// Pick the product to highlight in a bot reply.
///
/// The service's declared primary wins when present and non-blank;
/// otherwise the first product of the already-ranked list.
pub fn select_primary(declared: Option<&ProductId>, ranked: &[ProductRef]) -> Option<ProductId> {
    declared
        .filter(|id| !id.as_str().trim().is_empty())
        .cloned()
        .or_else(|| ranked.first().map(|p| p.id.clone()))
}

// =============================================================================
// Conversation
// =============================================================================

/// The ordered message log of one session. Lives only in memory.
#[derive(Debug, Clone)]
pub struct Conversation {
    session_id: Uuid,
    messages: Vec<Message>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// A fresh conversation holding only the seeded greeting.
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            messages: vec![Message::bot(GREETING_ID, GREETING)],
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Append a message at the end of the log.
    ///
    /// Rejects ids that do not sort after the last message and user
    /// messages that carry products. Prior messages are never touched.
    pub fn append(&mut self, message: Message) -> Result<&Self, ChatError> {
        if let Some(last) = self.messages.last() {
            if message.id() <= last.id() {
                return Err(ChatError::NonMonotonicId {
                    last: last.id(),
                    attempted: message.id(),
                });
            }
        }
        if message.sender() == Sender::User && !message.products().is_empty() {
            return Err(ChatError::ProductsOnUserMessage);
        }

        tracing::debug!(
            session_id = %self.session_id,
            message_id = %message.id(),
            sender = ?message.sender(),
            products = message.products().len(),
            "Message appended"
        );
        self.messages.push(message);
        Ok(self)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_id(&self) -> MessageId {
        self.messages.last().map(Message::id).unwrap_or(MessageId(0))
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages
            .binary_search_by_key(&id, Message::id)
            .ok()
            .map(|index| &self.messages[index])
    }

    /// Messages appended after `id`, in order.
    pub fn since(&self, id: MessageId) -> &[Message] {
        let start = self.messages.partition_point(|m| m.id() <= id);
        &self.messages[start..]
    }

    /// Render-ready view of every message, in order.
    pub fn render(&self) -> Vec<RenderedMessage> {
        self.messages.iter().map(RenderedMessage::from_message).collect()
    }
}

/// The primary product marker of a message, if any.
pub fn current_primary(message: &Message) -> Option<&ProductId> {
    message.primary_product_id()
}

// =============================================================================
// Render view
// =============================================================================

/// A product as it appears under a rendered message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductCard {
    pub product: ProductRef,
    pub is_primary: bool,
}

/// Everything a presentation layer needs to lay out one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMessage {
    pub id: MessageId,
    pub sender: Sender,
    pub paragraphs: Vec<ParagraphBlock>,
    pub products: Vec<ProductCard>,
}

impl RenderedMessage {
    pub fn from_message(message: &Message) -> Self {
        let primary = message.primary_product_id();
        Self {
            id: message.id(),
            sender: message.sender(),
            paragraphs: render(message.text()),
            products: message
                .products()
                .iter()
                .map(|product| ProductCard {
                    product: product.clone(),
                    is_primary: primary == Some(&product.id),
                })
                .collect(),
        }
    }

    pub fn primary(&self) -> Option<&ProductCard> {
        self.products.iter().find(|card| card.is_primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Clock whose time is set by the test.
    #[derive(Clone, Default)]
    struct ManualClock(Rc<Cell<u64>>);

    impl Clock for ManualClock {
        fn now_millis(&self) -> u64 {
            self.0.get()
        }
    }

    // =========================================================================
    // Ids
    // =========================================================================

    #[test]
    fn test_ids_follow_clock() {
        let clock = ManualClock::default();
        clock.0.set(1_000);
        let mut ids = IdGenerator::new(clock.clone(), GREETING_ID);
        assert_eq!(ids.next_id(), MessageId(1_000));
        clock.0.set(2_500);
        assert_eq!(ids.next_id(), MessageId(2_500));
    }

    #[test]
    fn test_ids_strictly_increase_within_same_instant() {
        let clock = ManualClock::default();
        clock.0.set(5_000);
        let mut ids = IdGenerator::new(clock, GREETING_ID);
        let user = ids.next_id();
        let bot = ids.next_id();
        assert!(bot > user);
        assert_eq!(bot, MessageId(5_001));
    }

    #[test]
    fn test_ids_survive_clock_going_backwards() {
        let clock = ManualClock::default();
        clock.0.set(9_000);
        let mut ids = IdGenerator::new(clock.clone(), GREETING_ID);
        let first = ids.next_id();
        clock.0.set(10);
        assert!(ids.next_id() > first);
    }

    #[test]
    fn test_ids_start_after_seed() {
        let mut ids = IdGenerator::new(ManualClock::default(), GREETING_ID);
        assert_eq!(ids.next_id(), MessageId(2));
        assert_eq!(ids.last(), MessageId(2));
    }

    #[test]
    fn test_system_clock_is_positive() {
        assert!(SystemClock.now_millis() > 0);
    }

    // =========================================================================
    // Primary selection
    // =========================================================================

    #[test]
    fn test_declared_primary_wins() {
        let ranked = vec![ProductRef::new(2, "A"), ProductRef::new(7, "B")];
        let declared = ProductId::from(7);
        assert_eq!(select_primary(Some(&declared), &ranked), Some(declared));
    }

    #[test]
    fn test_blank_declared_primary_falls_back_to_first_ranked() {
        let ranked = vec![ProductRef::new(2, "A"), ProductRef::new(7, "B")];
        let blank = ProductId::from("");
        assert_eq!(select_primary(Some(&blank), &ranked), Some(ProductId::from(2)));
        assert_eq!(select_primary(None, &ranked), Some(ProductId::from(2)));
    }

    #[test]
    fn test_no_products_no_primary() {
        assert_eq!(select_primary(None, &[]), None);
    }

    // =========================================================================
    // Append
    // =========================================================================

    #[test]
    fn test_new_conversation_has_greeting() {
        let convo = Conversation::new();
        assert_eq!(convo.len(), 1);
        let greeting = &convo.messages()[0];
        assert_eq!(greeting.id(), GREETING_ID);
        assert_eq!(greeting.sender(), Sender::Bot);
        assert_eq!(greeting.text(), GREETING);
        assert!(greeting.products().is_empty());
    }

    #[test]
    fn test_append_keeps_order() {
        let mut convo = Conversation::new();
        convo.append(Message::user(MessageId(10), "hoodies")).unwrap();
        convo
            .append(Message::bot(MessageId(11), "Here you go."))
            .unwrap();
        let ids: Vec<u64> = convo.messages().iter().map(|m| m.id().0).collect();
        assert_eq!(ids, vec![1, 10, 11]);
        assert_eq!(convo.last_id(), MessageId(11));
    }

    #[test]
    fn test_append_rejects_non_increasing_id() {
        let mut convo = Conversation::new();
        convo.append(Message::user(MessageId(10), "a")).unwrap();
        let err = convo.append(Message::user(MessageId(10), "b")).unwrap_err();
        assert!(matches!(err, ChatError::NonMonotonicId { .. }));
        let err = convo.append(Message::user(MessageId(3), "c")).unwrap_err();
        assert!(matches!(err, ChatError::NonMonotonicId { .. }));
        assert_eq!(convo.len(), 2);
    }

    #[test]
    fn test_append_rejects_user_message_with_products() {
        let forged: Message = serde_json::from_value(serde_json::json!({
            "id": 50,
            "sender": "user",
            "text": "sneaky",
            "products": [{
                "id": "1", "title": "Hoodie", "brand": "", "price": 0.0,
                "image_url": "", "rank": null
            }],
            "primary_product_id": null,
            "created_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        let mut convo = Conversation::new();
        let err = convo.append(forged).unwrap_err();
        assert!(matches!(err, ChatError::ProductsOnUserMessage));
        assert_eq!(convo.len(), 1);
    }

    #[test]
    fn test_lookup_and_since() {
        let mut convo = Conversation::new();
        convo.append(Message::user(MessageId(4), "a")).unwrap();
        convo.append(Message::bot(MessageId(5), "b")).unwrap();
        assert_eq!(convo.get(MessageId(4)).map(Message::text), Some("a"));
        assert!(convo.get(MessageId(2)).is_none());
        assert_eq!(convo.since(GREETING_ID).len(), 2);
        assert_eq!(convo.since(MessageId(4))[0].text(), "b");
        assert!(convo.since(MessageId(5)).is_empty());
    }

    #[test]
    fn test_sessions_are_distinct() {
        assert_ne!(Conversation::new().session_id(), Conversation::new().session_id());
    }

    // =========================================================================
    // Render view
    // =========================================================================

    #[test]
    fn test_rendered_message_flags_primary() {
        let msg = Message::bot_with_products(
            MessageId(20),
            "The **Classic Hoodie** is perfect.\n\nAlso consider the jacket.",
            vec![ProductRef::new(2, "Classic Hoodie"), ProductRef::new(1, "Denim Jacket")],
            Some(ProductId::from(2)),
        );
        let view = RenderedMessage::from_message(&msg);
        assert_eq!(view.paragraphs.len(), 2);
        assert!(view.products[0].is_primary);
        assert!(!view.products[1].is_primary);
        assert_eq!(view.primary().map(|c| c.product.title.as_str()), Some("Classic Hoodie"));
        assert_eq!(current_primary(&msg), Some(&ProductId::from(2)));
    }

    #[test]
    fn test_render_whole_conversation() {
        let mut convo = Conversation::new();
        convo.append(Message::user(MessageId(30), "tees")).unwrap();
        let views = convo.render();
        assert_eq!(views.len(), 2);
        assert_eq!(views[1].sender, Sender::User);
        assert!(views[1].products.is_empty());
    }
}
