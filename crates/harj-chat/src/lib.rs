//! Two-party messaging: conversations, read tracking, unread accounting and
//! the simulated counterpart that answers while no real peer client exists.

pub mod error;
pub mod responder;
mod scheduler;
pub mod service;

pub use error::{ChatError, ChatResult};
pub use responder::{
    CounterpartResponder, FixedResponder, ReplyPlan, SilentResponder, SimulatedResponder,
};
pub use service::MessagingService;
