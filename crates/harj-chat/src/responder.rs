use std::time::Duration;

use rand::Rng;
use rand::seq::IndexedRandom;

use harj_types::{Conversation, Message};

/// What the counterpart will do after a message lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPlan {
    pub delay: Duration,
    pub text: String,
    /// Also flip the triggering message to read when the reply lands.
    pub mark_trigger_read: bool,
}

/// Stand-in for the other side of a conversation while there is no second
/// client. Production deployments with real peers use [`SilentResponder`].
pub trait CounterpartResponder: Send + Sync {
    fn plan_reply(&self, conversation: &Conversation, trigger: &Message) -> Option<ReplyPlan>;
}

pub const DEFAULT_REPLY_MIN: Duration = Duration::from_millis(2000);
pub const DEFAULT_REPLY_MAX: Duration = Duration::from_millis(3500);

const CANNED_REPLIES: &[&str] = &[
    "Okay, understood.",
    "Thanks a lot.",
    "Sure, I'll look into it.",
    "Okay, when suits you?",
    "Could you share more details?",
];

/// Answers every message with a random canned acknowledgement after a random
/// delay in `[min_delay, max_delay)`.
#[derive(Debug, Clone)]
pub struct SimulatedResponder {
    min_delay: Duration,
    max_delay: Duration,
    replies: Vec<String>,
    mark_trigger_read: bool,
}

impl SimulatedResponder {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            replies: CANNED_REPLIES.iter().map(|r| r.to_string()).collect(),
            mark_trigger_read: true,
        }
    }

    pub fn with_replies(mut self, replies: Vec<String>) -> Self {
        self.replies = replies;
        self
    }

    /// Stop treating the simulated reply as a read receipt for the trigger.
    pub fn without_read_receipts(mut self) -> Self {
        self.mark_trigger_read = false;
        self
    }

    fn pick_delay(&self, rng: &mut impl Rng) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        if max <= min {
            return self.min_delay;
        }
        Duration::from_millis(rng.random_range(min..max))
    }
}

impl Default for SimulatedResponder {
    fn default() -> Self {
        Self::new(DEFAULT_REPLY_MIN, DEFAULT_REPLY_MAX)
    }
}

impl CounterpartResponder for SimulatedResponder {
    fn plan_reply(&self, _conversation: &Conversation, _trigger: &Message) -> Option<ReplyPlan> {
        let mut rng = rand::rng();
        let text = self.replies.choose(&mut rng)?.clone();
        Some(ReplyPlan {
            delay: self.pick_delay(&mut rng),
            text,
            mark_trigger_read: self.mark_trigger_read,
        })
    }
}

/// Deterministic responder for tests.
#[derive(Debug, Clone)]
pub struct FixedResponder {
    pub delay: Duration,
    pub text: String,
    pub mark_trigger_read: bool,
}

impl FixedResponder {
    pub fn new(delay: Duration, text: impl Into<String>) -> Self {
        Self {
            delay,
            text: text.into(),
            mark_trigger_read: true,
        }
    }
}

impl CounterpartResponder for FixedResponder {
    fn plan_reply(&self, _conversation: &Conversation, _trigger: &Message) -> Option<ReplyPlan> {
        Some(ReplyPlan {
            delay: self.delay,
            text: self.text.clone(),
            mark_trigger_read: self.mark_trigger_read,
        })
    }
}

/// Never replies: the counterpart is a real client.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentResponder;

impl CounterpartResponder for SilentResponder {
    fn plan_reply(&self, _conversation: &Conversation, _trigger: &Message) -> Option<ReplyPlan> {
        None
    }
}
