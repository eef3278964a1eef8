//! Time-to-initial-display and time-to-full-display capture.
//!
//! One [`DisplayTimingStateMachine`] per screen visit. TTID is the first
//! rendered frame after `begin`. TTFD is decided by whichever strategy fires
//! first (stable frames, user interaction, manual signal, timeout, finalize)
//! through a single guarded capture transition.

pub mod config;
pub mod machine;
pub mod model;

pub use config::DisplayTimingConfig;
pub use machine::DisplayTimingStateMachine;
pub use model::{DisplayPhase, DisplayTiming, TtfdMode, TtfdSource};
