//! Execution engine.
//!
//! This module performs the outbound HTTP calls for job occurrences,
//! including retry with backoff and outcome recording.

mod dispatcher;
mod transport;

pub use dispatcher::Dispatcher;
pub use transport::{
    DEFAULT_TIMEOUT, DeliveryRequest, HttpTransport, Transport, TransportError, USER_AGENT,
};
