//! Fingerprint folding
//!
//! The fold must stay bit-for-bit stable: visitor ids derived by any client
//! sharing the same signals have to agree.

/// Fold a string into a signed 32-bit hash
///
/// Iterates UTF-16 code units; each step computes `h * 31 + c` and truncates
/// to 32 bits.
pub fn fold_hash(input: &str) -> i32 {
    input
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_mul(31).wrapping_add(i32::from(unit))
        })
}

/// Render a number in lowercase base 36
pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::with_capacity(13);
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();

    // every byte comes from DIGITS
    out.into_iter().map(char::from).collect()
}

/// Derive the visitor id for a fingerprint string
pub fn identity_from_fingerprint(fingerprint: &str) -> String {
    let hash = fold_hash(fingerprint);
    to_base36(u64::from(hash.unsigned_abs()))
}
