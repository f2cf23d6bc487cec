//! Confirmation codes: merchant initials plus a four digit suffix.

use rand::Rng;

use crate::domain::errors::OrderError;

/// Attempts before giving up on finding a free code.
pub const MAX_CODE_ATTEMPTS: u32 = 50;

/// First two characters of the merchant name, upper-cased.
pub fn code_prefix(merchant_name: &str) -> String {
    merchant_name
        .chars()
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn random_code<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> String {
    format!("{prefix}{}", rng.gen_range(1000..=9999))
}

/// Draws codes until `is_taken` reports a free one.
///
/// The caller must hold whatever lock makes `is_taken` and the following
/// insert atomic.
pub fn generate_unique<R, F>(merchant_name: &str, rng: &mut R, mut is_taken: F) -> Result<String, OrderError>
where
    R: Rng + ?Sized,
    F: FnMut(&str) -> bool,
{
    let prefix = code_prefix(merchant_name);

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = random_code(&prefix, rng);
        if !is_taken(&code) {
            return Ok(code);
        }
        tracing::debug!(attempt, %code, "confirmation code collision");
    }

    Err(OrderError::CodeGenerationExhausted {
        attempts: MAX_CODE_ATTEMPTS,
    })
}
