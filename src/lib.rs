//! Panel and bot lifecycle backend.
//!
//! Keeps local bot, panel and server rows consistent with the remote panels that host
//! them: lifecycle operations with balance accounting, persistent panel connections,
//! and periodic reconciliation jobs.

pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod panel;
pub mod scheduler;
pub mod service;
pub mod startup;
pub mod state;
pub mod teamspeak;
