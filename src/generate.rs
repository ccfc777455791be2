//! Secure random values for generated defaults.

use rand::RngCore;

/// Length of a generated secret when a key does not ask for another one.
pub const DEFAULT_SECRET_LENGTH: usize = 64;

/// Generates a random lowercase hex string of exactly `length` characters.
///
/// Draws `ceil(length / 2)` bytes from the thread-local CSPRNG (ChaCha seeded
/// from the operating system), hex-encodes them and truncates.
///
/// # Examples
///
/// ```rust
/// use envcompose::generate_secure_value;
///
/// let secret = generate_secure_value(64);
/// assert_eq!(secret.len(), 64);
/// assert!(secret.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
/// ```
pub fn generate_secure_value(length: usize) -> String {
    let mut bytes = vec![0u8; length.div_ceil(2)];
    rand::rng().fill_bytes(&mut bytes);
    let mut out = hex::encode(bytes);
    out.truncate(length);
    out
}
