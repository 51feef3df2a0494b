pub mod auth;
pub mod cookie;
pub mod oauth;
pub mod token;
