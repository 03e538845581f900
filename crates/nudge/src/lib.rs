//! Nudge is a session-oriented backend that helps a user declutter a physical
//! space with the help of a vision model.
//!
//! The crate is organized around three pieces:
//!
//! - [`session`]: the session aggregate, its task/item lifecycles, and the
//!   [`session::SessionStore`] trait with in-memory and SQLite backends.
//! - [`vision`]: the [`vision::VisionProvider`] trait consumed for space
//!   analysis, task generation, and item identification, plus an
//!   OpenAI-compatible HTTP implementation.
//! - [`Nudge`]: the orchestrator tying a store and a provider together. This
//!   is what the HTTP service calls into.

pub mod error;
pub mod session;
pub mod vision;

mod app;

pub use app::Nudge;
pub use error::NudgeError;
