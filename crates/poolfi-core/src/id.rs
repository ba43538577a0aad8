//! Deterministic entity identity
//!
//! Bank and account ids are derived from their identifying tuple so that
//! identical tuples produce identical ids across instances: the inputs are
//! sorted, concatenated, MD5-folded, and the digest is stamped with UUID
//! version/variant bits.

use uuid::Uuid;

/// Derive a UUID from a set of identifying strings.
///
/// The empty set maps to the digest of the nil UUID string.
pub fn uuid_from_strings(parts: &[&str]) -> Uuid {
    let nil = Uuid::nil().to_string();
    let mut sorted: Vec<&str> = if parts.is_empty() {
        vec![nil.as_str()]
    } else {
        parts.to_vec()
    };
    sorted.sort_unstable();

    let concatenated = sorted.concat();
    let mut sum = md5::compute(concatenated.as_bytes()).0;
    sum[6] = (sum[6] & 0x0f) | 0x30;
    sum[8] = (sum[8] & 0x3f) | 0x80;
    Uuid::from_bytes(sum)
}
