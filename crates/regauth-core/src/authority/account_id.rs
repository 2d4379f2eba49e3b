//! Account ID derivation.
//!
//! An account ID is a pure function of the cluster ID: the 64-bit FNV-1a hash
//! of its UTF-8 bytes, written as an unsigned integer in radix 32 (digits
//! `0-9` then `a-v`). The same cluster ID yields the same account ID in every
//! process, on every restart and under every token.
//!
//! The hash is not cryptographic. Account IDs only need to be stable and
//! unlikely to collide between the handful of clusters a test registers.

use thiserror::Error;

/// FNV-1a 64-bit offset basis.
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
const FNV_PRIME: u64 = 0x0100_0000_01b3;

const RADIX32_DIGITS: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

/// Error returned when an account ID cannot be derived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountIdError {
    /// The deriver could not produce an identifier for the cluster ID.
    #[error("account ID derivation failed: {0}")]
    Derivation(String),
}

/// Maps a cluster ID to an account ID.
///
/// Implementations must be deterministic: repeated calls with the same
/// cluster ID return the same value, across instances and processes.
pub trait AccountIdDeriver: Send + Sync {
    /// Derives the account ID for `cluster_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AccountIdError`] if no identifier can be produced. The
    /// authority rejects the registration with an internal error.
    fn derive(&self, cluster_id: &str) -> Result<String, AccountIdError>;
}

/// The default deriver: FNV-1a 64 rendered in radix 32.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fnv1aDeriver;

impl AccountIdDeriver for Fnv1aDeriver {
    fn derive(&self, cluster_id: &str) -> Result<String, AccountIdError> {
        Ok(to_radix32(fnv1a_64(cluster_id.as_bytes())))
    }
}

/// Computes the 64-bit FNV-1a hash of `bytes`.
#[must_use]
pub const fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        // u64::from is not const.
        #[allow(clippy::cast_lossless)]
        let byte = bytes[i] as u64;
        hash ^= byte;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

fn to_radix32(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    // 64 bits need at most 13 radix-32 digits.
    let mut buf = [0u8; 13];
    let mut pos = buf.len();
    while value > 0 {
        pos -= 1;
        #[allow(clippy::cast_possible_truncation)] // value % 32 < 32
        let digit = (value % 32) as usize;
        buf[pos] = RADIX32_DIGITS[digit];
        value /= 32;
    }
    buf[pos..].iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_reference_vectors() {
        assert_eq!(fnv1a_64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a_64(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn test_radix32_rendering() {
        assert_eq!(to_radix32(0), "0");
        assert_eq!(to_radix32(31), "v");
        assert_eq!(to_radix32(32), "10");
        assert_eq!(to_radix32(u64::MAX), "fvvvvvvvvvvvv");
    }

    #[test]
    fn test_derive_known_cluster_ids() {
        let deriver = Fnv1aDeriver;
        assert_eq!(deriver.derive("cluster-1").unwrap(), "3lsti27cjhf3");
        assert_eq!(deriver.derive("cluster-2").unwrap(), "3lsui27cjhsm");
        assert_eq!(deriver.derive("").unwrap(), "cnskssi2248p5");
    }

    #[test]
    fn test_derive_is_deterministic_across_instances() {
        let first = Fnv1aDeriver.derive("prod-east-7").unwrap();
        for _ in 0..16 {
            assert_eq!(Fnv1aDeriver::default().derive("prod-east-7").unwrap(), first);
        }
    }

    #[test]
    fn test_derive_handles_multibyte_input() {
        let id = Fnv1aDeriver.derive("クラスタ").unwrap();
        assert!(!id.is_empty());
        assert!(id.len() <= 13);
        assert!(id.bytes().all(|b| RADIX32_DIGITS.contains(&b)));
    }
}
