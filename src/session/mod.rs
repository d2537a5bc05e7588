//! Session lifecycle: resolve, announce, tail, classify and relay.

mod controller;
mod error;
mod state;
mod task;

pub use controller::SessionController;
pub use error::SessionError;
pub use state::{SessionPhase, SessionStats, SessionStatus, StatusPublisher};
pub use task::{SessionCommand, DEFAULT_DISPATCH_BUFFER};
