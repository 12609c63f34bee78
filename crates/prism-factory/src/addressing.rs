// SPDX-License-Identifier: Apache-2.0
//! Deterministic staging-address derivation.
//!
//! `staged_addr` is a pure function of `(factory, salt, code hash)` and the
//! salt is a pure function of the content hash, so the full derivation
//! collapses to "same factory address + same bytes = same staged address",
//! independent of chain and of prior deployment order.

use blake3::Hasher;
use prism_types::{Addr, CodeHash, Hash32};

/// Deployment salt for a piece of content (prefix `b"prism-salt:"`).
pub fn salt_of(content_hash: &CodeHash) -> Hash32 {
    let mut hasher = Hasher::new();
    hasher.update(b"prism-salt:");
    hasher.update(content_hash.as_bytes());
    hasher.finalize().into()
}

/// Staged address for `(factory, salt, code_hash)` (prefix `b"prism-create2:"`).
pub fn staged_addr(factory: Addr, salt: &Hash32, code_hash: &CodeHash) -> Addr {
    let mut hasher = Hasher::new();
    hasher.update(b"prism-create2:");
    hasher.update(factory.as_bytes());
    hasher.update(salt);
    hasher.update(code_hash.as_bytes());
    let digest: Hash32 = hasher.finalize().into();
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[..20]);
    Addr(out)
}
