//! Database repository layer.
//!
//! Repositories hold a borrowed connection and are generic over `ConnectionTrait`, so the
//! same repository works on the pool and inside a `DatabaseTransaction`. They return
//! domain models converted at this boundary.

pub mod bot;
pub mod package;
pub mod panel;
pub mod server;
pub mod user;
