//! Panelsync Test Utils
//!
//! Shared testing utilities for the panelsync workspace. Provides a builder for test
//! contexts backed by an in-memory SQLite database whose schema is generated from the
//! `entity` crate, plus factories that insert rows with sensible defaults.
//!
//! # Usage
//!
//! ```rust,ignore
//! use test_utils::builder::TestBuilder;
//!
//! #[tokio::test]
//! async fn creates_bot() -> Result<(), TestError> {
//!     let mut test = TestBuilder::new().with_bot_tables().build().await?;
//!     let db = test.database().await?;
//!
//!     let user = test_utils::factory::create_user(db).await?;
//!     // ...
//!
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod context;
pub mod error;
pub mod factory;
