pub mod auth;
pub mod blacklist;
pub mod email;
pub mod error;
pub mod one_time;
pub mod rotation;
pub mod sessions;
pub mod tokens;
pub mod two_factor;

pub use auth::{AuthService, SweepReport};
pub use blacklist::AccessBlacklist;
pub use email::{MockDispatcher, NotificationDispatcher, SentMail, SmtpDispatcher};
pub use error::AuthError;
pub use one_time::OneTimeTokenService;
pub use rotation::RefreshRotator;
pub use sessions::SessionRegistry;
pub use tokens::{AccessClaims, RefreshClaims, TokenPair, TokenService};
pub use two_factor::SecondFactorManager;
