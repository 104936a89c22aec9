pub use super::bot::Entity as Bot;
pub use super::package::Entity as Package;
pub use super::panel::Entity as Panel;
pub use super::permission_price::Entity as PermissionPrice;
pub use super::server::Entity as Server;
pub use super::user::Entity as User;
