// ABOUTME: Session layer for waypoint: turns the resolver into one coherent authentication state.
// ABOUTME: Exposes the controller, the consumer-facing SessionContext, and admin user management.

pub mod admin;
pub mod context;
pub mod controller;
pub mod outcome;

pub use admin::{AdminApi, SessionError};
pub use context::SessionContext;
pub use controller::{AuthSession, user_from_identity};
pub use outcome::{AuthOutcome, Registration};
