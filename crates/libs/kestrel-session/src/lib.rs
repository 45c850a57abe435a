//! Reply correlation for Kestrel client sessions.
//!
//! A session speaks an asynchronous, message-oriented binary protocol over a
//! persistent connection: replies arrive unsolicited and out of order, and
//! each must be handed to the request call site that is waiting for it. This
//! crate provides the piece that does the matching:
//!
//! - [`WaitQueue`] — holds delivered messages until a matching
//!   [`WaitQueue::wait`] claims them, FIFO per correlation key
//! - a housekeeper task owned by the queue that periodically evicts
//!   messages nobody ever claims
//! - [`WaitQueueConfig`] — hold time, sweep interval, default wait timeout
//!
//! The receive loop calls [`WaitQueue::deliver`] for every decoded message
//! and never blocks; request call sites await [`WaitQueue::wait`] with the
//! correlation key their request carried. One queue per connection, shut
//! down with it.

pub mod config;
pub mod error;
pub mod queue;

mod jobs;

pub use config::WaitQueueConfig;
pub use error::ConfigError;
pub use queue::WaitQueue;
