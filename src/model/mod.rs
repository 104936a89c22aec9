//! Domain models and parameter types.
//!
//! Domain models are converted from entity models at the repository boundary. Enum-like
//! string columns become typed enums and JSON columns become typed documents there, so
//! the service layer never handles raw column values.

pub mod billing;
pub mod bot;
pub mod package;
pub mod panel;
pub mod server;
pub mod user;
