//! Phase-gated orchestration core with enforced parallel wave dispatch.
//!
//! - [`orchestrator`] walks a session through the eight [`phase::Phase`]s
//! - [`dag`] levels a task plan into waves and enforces their parallel dispatch
//! - [`config`] loads `.wavefront/wavefront.toml`

pub mod config;
pub mod dag;
pub mod errors;
pub mod orchestrator;
pub mod phase;
pub mod ui;
