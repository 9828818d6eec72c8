//! Live stream ingestion: envelope decoding and dispatch into the stores.

mod envelope;
mod router;

pub use envelope::{decode, Envelope, EventKind, Inbound, Payload, PONG};
pub use router::{dispatch, Signal};
