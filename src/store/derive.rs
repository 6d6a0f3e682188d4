//! Name to id derivation.
//!
//! Every record is keyed by a 64-bit id computed from its name: the first
//! eight bytes of the BLAKE3 digest of the UTF-8 name, read big-endian and
//! reinterpreted as a signed integer. The function is keyless and
//! unsalted, so ids are stable across restarts and platforms.
//!
//! Collisions between distinct names are not detected; two colliding names
//! share one record.

/// Number of digest bytes that make up an id.
const ID_BYTES: usize = 8;

/// Derive the storage id for `name`.
///
/// # Examples
///
/// ```
/// use upload_time::store::derive_id;
///
/// assert_eq!(derive_id("alarm"), derive_id("alarm"));
/// assert_ne!(derive_id("alarm"), derive_id("Alarm"));
/// ```
pub fn derive_id(name: &str) -> i64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());

    let mut out = [0u8; ID_BYTES];
    hasher.finalize_xof().fill(&mut out);
    i64::from_be_bytes(out)
}
