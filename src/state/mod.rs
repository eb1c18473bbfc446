pub mod auth;
pub mod redirect;
