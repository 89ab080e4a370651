pub mod credentials;
pub mod crypto;
pub mod models;
pub mod oauth;
pub mod password;
pub mod pkce;
pub mod token;
