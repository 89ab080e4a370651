use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use std::sync::OnceLock;

/// Turnstile password hashing.
///
/// Argon2id with hashes stored in the PHC string format, so the parameters travel with
/// the hash and can be raised later without invalidating existing rows.
///
/// Params are expressed as:
/// - m_cost: memory cost in KiB
/// - t_cost: iterations
/// - p_cost: parallelism
///
/// Current default: 19 MiB memory, 2 iterations, parallelism 1.
const DEFAULT_M_COST_KIB: u32 = 19_456;
const DEFAULT_T_COST: u32 = 2;
const DEFAULT_P_COST: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid Argon2 parameters: {0}")]
    Params(String),

    #[error("failed to hash password: {0}")]
    Hash(String),
}

fn argon2() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(DEFAULT_M_COST_KIB, DEFAULT_T_COST, DEFAULT_P_COST, None)
        .map_err(|e| PasswordError::Params(e.to_string()))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a plaintext password and return a PHC-encoded Argon2id hash string.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let argon2 = argon2()?;
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?
        .to_string();

    Ok(hash)
}

/// Verify a plaintext password against a stored PHC hash.
///
/// A malformed stored hash is logged and reported as a mismatch; callers only ever
/// learn "matches" or "does not match".
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = match PasswordHash::new(password_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::warn!("Stored password hash is malformed: {e}");
            return false;
        }
    };

    let argon2 = match argon2() {
        Ok(argon2) => argon2,
        Err(e) => {
            log::error!("{e}");
            return false;
        }
    };

    match argon2.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => true,
        Err(argon2::password_hash::Error::Password) => false,
        Err(e) => {
            log::warn!("Password verification failed unexpectedly: {e}");
            false
        }
    }
}

/// Burn roughly the same CPU as a real verification.
///
/// Used when the account does not exist (or has no password) so response timing does not
/// reveal which emails are registered.
pub fn verify_against_dummy(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    let dummy = DUMMY_HASH.get_or_init(|| hash_password("turnstile-dummy-password").ok());
    if let Some(hash) = dummy {
        let _ = verify_password(password, hash);
    }
}
