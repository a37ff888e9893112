use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Every stored hash is produced with these parameters; they are never tuned per call.
fn hasher() -> Argon2<'static> {
    Argon2::default()
}

fn argon_err(context: &'static str) -> impl FnOnce(password_hash::Error) -> anyhow::Error {
    move |e| {
        error!(error = %e, "{}", context);
        anyhow::anyhow!("{context}: {e}")
    }
}

/// PHC-encoded Argon2id hash with a fresh random salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(argon_err("argon2 hash failed"))?;
    Ok(hash.to_string())
}

/// `Ok(false)` for a wrong password; `Err` only when `hash` is not a PHC string.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(argon_err("stored hash unreadable"))?;
    Ok(hasher().verify_password(plain.as_bytes(), &parsed).is_ok())
}
