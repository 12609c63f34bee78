// SPDX-License-Identifier: Apache-2.0
//! Core identifiers, content hashing, and the account/code plane for Prism.
//!
//! `prism-types` is the foundation crate the rest of the workspace builds on:
//! fixed-width identifier newtypes ([`Selector`], [`Addr`], [`CodeHash`],
//! [`ManifestRoot`]), the content-only BLAKE3 hash policy, the [`CodeStore`]
//! trait modeling the deployed-code plane (with [`MemoryCodeStore`] for tests
//! and single-process embedding), and the [`Clock`] seam that keeps
//! activation-delay logic deterministic under test.
//!
//! # Hash Domain Policy
//!
//! Code hashes are content-only: `BLAKE3(bytes)` with no domain prefix. Two
//! byte-identical payloads are the same code regardless of where they are
//! deployed. Domain separation is reserved for *derived* identifiers
//! (addresses, salts, signature digests), which always carry an ASCII prefix.

mod clock;
mod ident;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ident::{code_hash, make_addr, Addr, CodeHash, Hash32, ManifestRoot, ParseIdError, Selector};
pub use store::{CodeStore, CodeStoreError, MemoryCodeStore};

/// Read-side seam the Factory uses to check its paired Dispatcher's active
/// manifest root without depending on the dispatcher crate.
pub trait ManifestAnchor {
    /// Currently active manifest root, [`ManifestRoot::EMPTY`] if none.
    fn active_root(&self) -> ManifestRoot;
}
