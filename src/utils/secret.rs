use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use uuid::Uuid;

use crate::error::ErrorMessage;

/// Upper bound on a confirmation code before it reaches Argon2.
///
/// Generated codes are 32 characters; anything much longer is not ours and
/// is rejected before paying for a hash.
const MAX_CODE_LENGTH: usize = 64;

/// Fresh single-use confirmation code: a v4 UUID in simple (hex) form.
pub fn generate_code() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Hash a confirmation code with Argon2id (default parameters, random salt).
///
/// Output is a PHC string (`$argon2id$v=19$...`) that embeds the salt, so it
/// is the only thing stored on the user row.
pub fn hash(code: impl Into<String>) -> Result<String, ErrorMessage> {
    let code = code.into();

    if code.is_empty() {
        return Err(ErrorMessage::EmptyCode);
    }

    if code.len() > MAX_CODE_LENGTH {
        return Err(ErrorMessage::ExceededMaxCodeLength(MAX_CODE_LENGTH));
    }

    let salt = SaltString::generate(&mut OsRng);

    let hashed_code = Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map_err(|_| ErrorMessage::HashingError)?
        .to_string();

    Ok(hashed_code)
}

/// Verify a presented code against a stored hash in constant time.
///
/// `Ok(false)` on mismatch; `Err` only for unusable input or a corrupt hash.
pub fn compare(code: &str, hashed_code: &str) -> Result<bool, ErrorMessage> {
    if code.is_empty() {
        return Err(ErrorMessage::EmptyCode);
    }

    if code.len() > MAX_CODE_LENGTH {
        return Err(ErrorMessage::ExceededMaxCodeLength(MAX_CODE_LENGTH));
    }

    let parsed_hash =
        PasswordHash::new(hashed_code).map_err(|_| ErrorMessage::InvalidHashFormat)?;

    let code_matched = Argon2::default()
        .verify_password(code.as_bytes(), &parsed_hash)
        .is_ok();

    Ok(code_matched)
}
