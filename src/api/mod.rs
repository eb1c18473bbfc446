mod auth;
pub mod client;
mod content;
mod profiles;
mod tables;
pub mod types;

pub use client::*;
pub use types::*;
