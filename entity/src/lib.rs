//! SeaORM entity models for the panel orchestration schema.

pub mod prelude;

pub mod bot;
pub mod package;
pub mod panel;
pub mod permission_price;
pub mod server;
pub mod user;
