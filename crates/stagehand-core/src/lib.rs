//! Core of stagehand: following remote build traces and supervising
//! long-running pipeline actions.
//!
//! Nothing in here talks to the terminal directly; all output goes through
//! an [`output::OutputSink`] supplied by the frontend.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod output;
pub mod pipeline;
pub mod shell_client;
pub mod supervisor;
pub mod trace;
