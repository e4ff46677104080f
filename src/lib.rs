//! Shuro Client - Polling client for the shuro subtitle translation service
//!
//! Creates translation projects on a shuro server, follows their pipeline
//! progress by polling, and previews, edits and exports the generated
//! subtitles.

pub mod cli;
pub mod config;
pub mod error;
pub mod transport;
pub mod polling;
pub mod api;
pub mod history;
pub mod monitor;
