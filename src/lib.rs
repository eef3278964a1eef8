//! Screen rendering telemetry.
//!
//! A [`SessionRegistry`] owns one [`ScreenSession`] per tracked screen. Each
//! session combines a frame timing collector (jank and frozen frames), a
//! TTID/TTFD state machine and a bounded per-screen network buffer, and is
//! turned into a single [`Beacon`] when the screen is finalized.

pub mod alarm;
pub mod beacon;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod registry;
pub mod replay;
pub mod session;
pub mod transport;

pub use alarm::ManualTtfdAlarm;
pub use beacon::{Beacon, NOT_CAPTURED_MS};
pub use config::{EngineConfig, SessionConfig};
pub use errors::{EngineError, EngineResult};
pub use registry::SessionRegistry;
pub use replay::{parse_trace, replay, TraceEvent, TraceReplay};
pub use session::ScreenSession;
pub use transport::{
    BeaconTransport, BusTransport, CollectingTransport, NullTransport, TransportError,
};

pub use display_timing::{DisplayTiming, TtfdMode, TtfdSource};
pub use frame_timing::{FrameSummary, FrameTiming, FrozenFrame, JankCluster, RenderPhase};
pub use network_correlator::{AddOutcome, NetworkDescriptor};
pub use screenperf_core_types::{Clock, ManualClock, MonotonicClock, ScreenId};
