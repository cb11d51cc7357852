//! Agent module for Stepwise
//!
//! This module contains the plan-and-act loop, the session and conversation
//! types it operates on, and the planner and executor steps.

pub mod conversation;
pub mod core;
pub mod executor;
pub mod planner;
pub mod session;

pub use conversation::Conversation;
pub use core::{route, Agent, LoopState, TurnOutcome};
pub use executor::{Executor, SilentObserver, TurnObserver};
pub use planner::Planner;
pub use session::Session;
