pub mod app;
pub mod commands;
pub mod config;
pub mod env;
pub mod metrics;
pub mod replay;
pub mod runtime;
