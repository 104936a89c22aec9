//! Factory methods for creating test data.
//!
//! Each entity has its own module with a `Factory` builder for customization and a
//! `create_*` convenience function for quick default creation.
//!
//! ```rust,ignore
//! use test_utils::factory;
//!
//! let user = factory::user::UserFactory::new(db).balance(5_000).build().await?;
//! let panel = factory::create_panel(db, "manager_bot").await?;
//! let bot = factory::bot::BotFactory::new(db, &user.username, "manager_bot")
//!     .panel_id(Some(panel.id))
//!     .build()
//!     .await?;
//! ```

pub mod bot;
pub mod helpers;
pub mod package;
pub mod panel;
pub mod permission_price;
pub mod server;
pub mod user;

pub use bot::create_bot;
pub use package::create_package;
pub use panel::create_panel;
pub use permission_price::create_permission_price;
pub use server::create_server;
pub use user::create_user;
