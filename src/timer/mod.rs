pub mod engine;
pub mod state;

pub use engine::{AlarmId, TimerEngine, TimerFired};
pub use state::{CounterTimer, TimerHandle};
