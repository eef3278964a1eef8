pub mod metrics;
pub mod policy;
pub mod tracing;

pub use policy::{ObsPolicyView, PolicyHandle};
