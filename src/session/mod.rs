pub mod controller;
pub mod error;
pub mod machine;
pub mod state;

pub use controller::SessionController;
pub use error::SessionError;
pub use machine::{Outcome, SessionMachine};
pub use state::{Command, SessionCounters, SessionSnapshot, SessionState, SessionSummary};
