//! Message primitives for the Kestrel management protocol.

pub mod message;

pub use message::{CorrelationKey, Message};
