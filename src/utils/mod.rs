pub mod password;

pub use password::{Argon2Hasher, CredentialHasher, Password, PasswordHashString};
