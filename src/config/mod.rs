//! Configuration management for vatcalc
//!
//! - **app**: backend selection, store locations and remote timeouts

pub mod app;

pub use app::{AppConfig, BackendKind};
