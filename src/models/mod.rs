pub mod blacklist_entry;
pub mod one_time_token;
pub mod principal;
pub mod refresh_session;
pub mod second_factor;

pub use blacklist_entry::BlacklistEntry;
pub use one_time_token::{OneTimeToken, TokenPurpose};
pub use principal::{Principal, PrincipalResponse};
pub use refresh_session::{revoke_reason, RefreshSession, SessionContext, SessionInfo};
pub use second_factor::{SecondFactor, SecondFactorStatus};
