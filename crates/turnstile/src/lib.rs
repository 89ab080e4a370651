pub mod app_state;
pub mod config;
pub mod cookies;
pub mod error;
pub mod flow;
pub mod guard;
pub mod handlers;
pub mod oauth_client;
pub mod profiles;
pub mod server;
pub mod session_store;

#[cfg(test)]
pub(crate) mod test_support;
