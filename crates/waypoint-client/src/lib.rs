// ABOUTME: Client transport layer for waypoint: HTTP sending, diagnostics, and route resolution.
// ABOUTME: Exposes the Transport seam so callers can swap the reqwest backend for a scripted one.

pub mod diagnostics;
pub mod resolver;
pub mod testing;
pub mod transport;

pub use diagnostics::{TracingObserver, TransportObserver};
pub use resolver::{CandidateResolver, ResolveError};
pub use transport::{
    ApiResponse, HttpTransport, Transport, TransportError, classify, decode_body, server_message,
};
