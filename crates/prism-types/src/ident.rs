// SPDX-License-Identifier: Apache-2.0
//! Identifier newtypes and hashing helpers.
//!
//! Every identifier here has a fixed wire width that is part of the protocol
//! contract: selectors are 4 bytes, addresses 20, hashes 32. The widths feed
//! directly into the canonical route encoding, so they must never change.

use std::fmt;
use std::str::FromStr;

use blake3::Hasher;

/// Canonical 256-bit hash used throughout the workspace.
pub type Hash32 = [u8; 32];

/// Failed to parse a hex-encoded identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseIdError {
    /// Input decoded to the wrong number of bytes.
    #[error("[ID_BAD_LENGTH] expected {expected} bytes, got {got}")]
    BadLength {
        /// Required byte width.
        expected: usize,
        /// Actual decoded width.
        got: usize,
    },
    /// Input was not valid hexadecimal.
    #[error("[ID_BAD_HEX] invalid hex: {0}")]
    BadHex(String),
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseIdError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|e| ParseIdError::BadHex(e.to_string()))?;
    let got = bytes.len();
    bytes
        .try_into()
        .map_err(|_| ParseIdError::BadLength { expected: N, got })
}

macro_rules! hex_newtype {
    ($(#[$meta:meta])* $name:ident, $n:expr) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub struct $name(pub [u8; $n]);

        impl $name {
            /// Returns the canonical byte representation.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8; $n] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x")?;
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<$n>(s).map(Self)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
                ser.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
                let s = <std::borrow::Cow<'de, str>>::deserialize(de)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_newtype!(
    /// 4-byte function identifier — the key of the route table.
    Selector,
    4
);

hex_newtype!(
    /// 20-byte account address.
    ///
    /// Used both for deployed code (facets, the factory) and for actors
    /// appearing in authorization contexts. The all-zero address is reserved
    /// and never routable.
    Addr,
    20
);

hex_newtype!(
    /// Content-only BLAKE3 hash of a deployed payload.
    CodeHash,
    32
);

hex_newtype!(
    /// Merkle root identifying one manifest version.
    ManifestRoot,
    32
);

impl Addr {
    /// The reserved all-zero address.
    pub const ZERO: Self = Self([0; 20]);

    /// Returns `true` for the reserved all-zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 20]
    }
}

impl ManifestRoot {
    /// Reserved sentinel for "no manifest". Never produced by the builder
    /// and rejected by `commit_root`.
    pub const EMPTY: Self = Self([0; 32]);

    /// Returns `true` for the reserved empty sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == [0; 32]
    }
}

/// Compute the content-only BLAKE3 hash of a payload.
///
/// No domain prefix — the content IS the identity. See the crate-level hash
/// domain policy.
pub fn code_hash(bytes: &[u8]) -> CodeHash {
    CodeHash(*blake3::hash(bytes).as_bytes())
}

/// Produces a stable, domain-separated address (prefix `b"addr:"`) from a
/// label, truncated to 20 bytes.
///
/// This is a convenience for actors and test fixtures, not the deployment
/// address scheme — staged code addresses come from the factory's
/// deterministic derivation.
pub fn make_addr(label: &str) -> Addr {
    let mut hasher = Hasher::new();
    hasher.update(b"addr:");
    hasher.update(label.as_bytes());
    let digest: Hash32 = hasher.finalize().into();
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[..20]);
    Addr(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. display / parse round-trip ───────────────────────────────────

    #[test]
    fn hex_display_parse_round_trip() {
        let sel = Selector([0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(sel.to_string(), "0xaabbccdd");
        assert_eq!("0xaabbccdd".parse::<Selector>().unwrap(), sel);
        // Unprefixed hex is accepted too.
        assert_eq!("aabbccdd".parse::<Selector>().unwrap(), sel);
    }

    // ── 2. wrong width rejected ─────────────────────────────────────────

    #[test]
    fn wrong_width_rejected() {
        let err = "0xaabb".parse::<Selector>().unwrap_err();
        assert_eq!(
            err,
            ParseIdError::BadLength {
                expected: 4,
                got: 2
            }
        );
    }

    // ── 3. addr label derivation is stable and distinct ─────────────────

    #[test]
    fn make_addr_stable_and_distinct() {
        assert_eq!(make_addr("alice"), make_addr("alice"));
        assert_ne!(make_addr("alice"), make_addr("bob"));
        assert!(!make_addr("alice").is_zero());
    }

    // ── 4. content hash matches blake3 directly ─────────────────────────

    #[test]
    fn code_hash_is_plain_blake3() {
        let payload = b"facet bytecode";
        assert_eq!(
            code_hash(payload).0,
            *blake3::hash(payload).as_bytes()
        );
    }

    // ── 5. serde uses 0x-prefixed hex strings ───────────────────────────

    #[test]
    fn serde_hex_strings() {
        let addr = make_addr("serde");
        let json = serde_json::to_string(&addr).unwrap();
        assert!(json.starts_with("\"0x"));
        let back: Addr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    // ── 6. sentinels ────────────────────────────────────────────────────

    #[test]
    fn sentinels() {
        assert!(Addr::ZERO.is_zero());
        assert!(ManifestRoot::EMPTY.is_empty());
        assert!(!ManifestRoot([1; 32]).is_empty());
    }
}
