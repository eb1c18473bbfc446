//! Client core for the Spiritual Tablets app.
//!
//! Everything a screen needs sits in two layers: [`api::ApiClient`] talks to
//! the managed backend (auth endpoints plus filtered row access), and
//! [`state::auth::AuthStore`] keeps the process-wide session/profile pair in
//! sync with it. [`state::redirect::complete_sign_in`] turns an OAuth
//! redirect URL into an installed session.

pub mod api;
pub mod config;
pub mod state;

pub use api::{
    ApiClient, ApiError, AuthEvent, AuthUser, Profile, ProfileLookup, Role, Session,
};
pub use state::auth::{AuthPhase, AuthSnapshot, AuthStore};
pub use state::redirect::{complete_sign_in, RedirectOutcome};
