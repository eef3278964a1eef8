//! Frame timing collection for a single screen visit.
//!
//! The collector consumes "frame rendered at T" signals, classifies every
//! inter-frame duration as normal, janky or frozen, and on stop folds the
//! stream into a [`FrameSummary`] with ranked jank clusters.

pub mod cluster;
pub mod collector;
pub mod config;
pub mod model;

pub use collector::FrameTimingCollector;
pub use config::FrameTimingConfig;
pub use model::{FrameClass, FrameSummary, FrameTiming, FrozenFrame, JankCluster, RenderPhase};
