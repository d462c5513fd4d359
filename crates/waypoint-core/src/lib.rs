// ABOUTME: Core library for waypoint, holding the types shared by the transport and session layers.
// ABOUTME: Endpoint configuration, candidate route catalog, user records, and session state live here.

pub mod config;
pub mod route;
pub mod session;
pub mod user;

pub use config::{EndpointConfig, RuntimeMode, normalize_prefix};
pub use route::{CandidateRequest, Endpoint, Method, OAuthProvider, RouteError, with_prefix};
pub use session::{SessionPhase, SessionState};
pub use user::{UserId, UserRecord, UserType};
