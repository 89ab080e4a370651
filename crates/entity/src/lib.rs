pub mod profile;
pub mod session;
pub mod store;
pub mod user;

pub use profile::Entity as Profile;
pub use session::Entity as Session;
pub use store::Entity as Store;
pub use user::Entity as User;
