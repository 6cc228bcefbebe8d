//! Authentication core: credential issuance and verification, single-use
//! refresh rotation, a session registry, an access-credential blacklist,
//! a TOTP second factor, and one-time tokens for the out-of-band flows.
//!
//! Transport, rate limiting, and clustering live outside this crate; it
//! exposes [`AuthService`] and the component services over a [`Store`].

pub mod config;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::AuthConfig;
pub use services::{AuthError, AuthService, TokenPair, TokenService};
pub use store::{MemoryStore, PgStore, Store};
