// SPDX-License-Identifier: Apache-2.0
//! The account/code plane: deployed bytes keyed by address.
//!
//! On-chain the execution environment provides this for free; here it is an
//! explicit trait so the dispatcher's per-call codehash re-check and the
//! factory's content-addressed staging share one source of truth. Absence is
//! not an error: an address with no code simply returns `None`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ident::{code_hash, Addr, CodeHash};

/// Errors from the code plane.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeStoreError {
    /// Deploying different bytes over an occupied address.
    ///
    /// Byte-identical redeploys are no-ops; this variant only fires when the
    /// incoming content actually differs. Content-address collisions must
    /// never silently overwrite.
    #[error("[CODE_COLLISION] address {addr} holds {existing}, refusing {incoming}")]
    Collision {
        /// The contested address.
        addr: Addr,
        /// Hash of the code already at the address.
        existing: CodeHash,
        /// Hash of the code that was refused.
        incoming: CodeHash,
    },
    /// Deploying to the reserved zero address.
    #[error("[CODE_ZERO_ADDR] refusing to deploy to the zero address")]
    ZeroAddress,
}

/// Deployed-code plane.
///
/// Implementations map addresses to immutable code blobs. The dispatcher
/// re-reads [`code_hash_at`](CodeStore::code_hash_at) on every dispatch, so
/// lookups must be cheap.
pub trait CodeStore {
    /// Deploy `bytes` at `addr`. Idempotent for byte-identical content.
    ///
    /// # Errors
    ///
    /// [`CodeStoreError::Collision`] if the address holds different code,
    /// [`CodeStoreError::ZeroAddress`] for the reserved address.
    fn deploy_at(&mut self, addr: Addr, bytes: &[u8]) -> Result<CodeHash, CodeStoreError>;

    /// Code currently at `addr`, or `None` — absence is not an error.
    fn code(&self, addr: Addr) -> Option<Arc<[u8]>>;

    /// Content hash of the code at `addr`, or `None` if empty.
    fn code_hash_at(&self, addr: Addr) -> Option<CodeHash>;

    /// Check for deployed code without retrieving it.
    fn has_code(&self, addr: Addr) -> bool {
        self.code_hash_at(addr).is_some()
    }

    /// Remove the code at `addr`. No-op if the address is empty.
    ///
    /// Models redeploy/destruct churn; route pinning tests lean on this to
    /// drift a facet's live hash out from under an applied route.
    fn clear_code(&mut self, addr: Addr);
}

/// In-memory [`CodeStore`].
///
/// HashMap-backed with `Arc<[u8]>` blobs; cheap to clone out of, cheap to
/// hash against. Code hashes are cached at deploy time so the dispatch-path
/// re-check is a map lookup, not a re-hash.
#[derive(Default)]
pub struct MemoryCodeStore {
    accounts: HashMap<Addr, (Arc<[u8]>, CodeHash)>,
    byte_count: usize,
}

impl MemoryCodeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses holding code.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` if no code is deployed anywhere.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Total bytes deployed across all addresses.
    pub fn byte_count(&self) -> usize {
        self.byte_count
    }
}

impl CodeStore for MemoryCodeStore {
    fn deploy_at(&mut self, addr: Addr, bytes: &[u8]) -> Result<CodeHash, CodeStoreError> {
        if addr.is_zero() {
            return Err(CodeStoreError::ZeroAddress);
        }
        let incoming = code_hash(bytes);
        if let Some((_, existing)) = self.accounts.get(&addr) {
            if *existing == incoming {
                return Ok(incoming);
            }
            return Err(CodeStoreError::Collision {
                addr,
                existing: *existing,
                incoming,
            });
        }
        self.byte_count += bytes.len();
        self.accounts.insert(addr, (Arc::from(bytes), incoming));
        Ok(incoming)
    }

    fn code(&self, addr: Addr) -> Option<Arc<[u8]>> {
        self.accounts.get(&addr).map(|(blob, _)| Arc::clone(blob))
    }

    fn code_hash_at(&self, addr: Addr) -> Option<CodeHash> {
        self.accounts.get(&addr).map(|(_, hash)| *hash)
    }

    fn clear_code(&mut self, addr: Addr) {
        if let Some((blob, _)) = self.accounts.remove(&addr) {
            self.byte_count -= blob.len();
        }
    }
}
