// ABOUTME: Session module - isolated conversation sessions and their cost totals.
// ABOUTME: SessionService is the collaborator seam; an in-memory store ships for embedding and tests.

mod service;
mod types;

pub use service::{InMemorySessionService, SessionService};
pub use types::Session;
