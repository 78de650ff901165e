//! Static API key check.

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Whether `presented` grants access when the server expects `expected`.
///
/// An empty `expected` disables the check. Keys are compared in time that
/// depends only on their lengths.
pub fn authorized(expected: &str, presented: Option<&[u8]>) -> bool {
    if expected.is_empty() {
        return true;
    }
    match presented {
        Some(presented) => constant_time_eq(expected.as_bytes(), presented),
        None => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
