// SPDX-License-Identifier: Apache-2.0
//! Facet handler registry and the shared-state execution surface.
//!
//! Dynamic delegated execution becomes, in-process, a table of erased
//! handlers keyed by **code hash** — not by address. Resolution happens at
//! call time, after the dispatcher has re-checked the facet's live code hash
//! against the route's pinned hash, so swapping the bytes at an address can
//! never reach a stale handler: the hash changes, the route fails closed.
//!
//! Handlers run against [`AppStorage`], the dispatcher-owned state they
//! observe and mutate as if it were their own — the shared-context half of
//! the delegated-execution contract.

use std::collections::BTreeMap;

use prism_types::{Addr, CodeHash, Selector};

/// Dispatcher-owned state shared by all facets.
///
/// A flat binary key/value surface. Facets pick their own slot layout;
/// nothing here namespaces them — colliding on slots is the same footgun
/// shared storage has on chain.
#[derive(Default, Debug)]
pub struct AppStorage {
    slots: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl AppStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a slot.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.slots.get(key).map(Vec::as_slice)
    }

    /// Write a slot, returning the previous value if any.
    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.slots.insert(key.into(), value.into())
    }

    /// Delete a slot.
    pub fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.slots.remove(key)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no slots are occupied.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Per-call context handed to a facet.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CallContext {
    /// Originating caller address.
    pub caller: Addr,
    /// The dispatcher's own address.
    pub dispatcher: Addr,
    /// Selector the call arrived on.
    pub selector: Selector,
}

/// A facet-side failure; the dispatcher propagates the reason unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FacetError(pub String);

impl FacetError {
    /// Convenience constructor.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Executable facet behavior.
///
/// Object-safe on purpose: the registry stores erased boxes, mirroring how
/// deployed code is opaque bytes until invoked.
pub trait FacetHandler {
    /// Execute the facet against shared storage.
    ///
    /// # Errors
    ///
    /// Any [`FacetError`] the facet raises; the dispatcher wraps it without
    /// altering the reason.
    fn call(
        &self,
        storage: &mut AppStorage,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, FacetError>;
}

// Closures are handlers; tests and embedders register plain functions.
impl<F> FacetHandler for F
where
    F: Fn(&mut AppStorage, &CallContext, &[u8]) -> Result<Vec<u8>, FacetError>,
{
    fn call(
        &self,
        storage: &mut AppStorage,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, FacetError> {
        self(storage, ctx, input)
    }
}

/// Registry failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A handler is already registered for this code hash.
    #[error("[HANDLER_EXISTS] handler already registered for {0}")]
    HandlerExists(CodeHash),
}

/// Code-hash-keyed table of erased facet handlers.
#[derive(Default)]
pub struct FacetRegistry {
    handlers: BTreeMap<CodeHash, Box<dyn FacetHandler>>,
}

impl FacetRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for code with hash `code_hash`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::HandlerExists`] on duplicate registration — content
    /// is immutable, so a second handler for the same hash is always a bug.
    pub fn register(
        &mut self,
        code_hash: CodeHash,
        handler: Box<dyn FacetHandler>,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&code_hash) {
            return Err(RegistryError::HandlerExists(code_hash));
        }
        self.handlers.insert(code_hash, handler);
        Ok(())
    }

    /// Handler for `code_hash`, if registered.
    pub fn resolve(&self, code_hash: &CodeHash) -> Option<&dyn FacetHandler> {
        self.handlers.get(code_hash).map(AsRef::as_ref)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use prism_types::{code_hash, make_addr};

    fn ctx() -> CallContext {
        CallContext {
            caller: make_addr("caller"),
            dispatcher: make_addr("dispatcher"),
            selector: Selector([1, 2, 3, 4]),
        }
    }

    // ── 1. closures register and execute against shared storage ────────

    #[test]
    fn closure_handler_round_trip() {
        let mut registry = FacetRegistry::new();
        let hash = code_hash(b"counter-facet");
        registry
            .register(
                hash,
                Box::new(|storage: &mut AppStorage,
                          _: &CallContext,
                          _: &[u8]|
                      -> Result<Vec<u8>, FacetError> {
                    let n = storage
                        .get(b"count")
                        .map_or(0u64, |v| u64::from_le_bytes(v.try_into().unwrap_or([0; 8])));
                    storage.set(b"count".to_vec(), (n + 1).to_le_bytes().to_vec());
                    Ok((n + 1).to_le_bytes().to_vec())
                }),
            )
            .unwrap();

        let mut storage = AppStorage::new();
        let handler = registry.resolve(&hash).unwrap();
        let out = handler.call(&mut storage, &ctx(), &[]).unwrap();
        assert_eq!(out, 1u64.to_le_bytes());
        let out = handler.call(&mut storage, &ctx(), &[]).unwrap();
        assert_eq!(out, 2u64.to_le_bytes());
        assert_eq!(storage.get(b"count").unwrap(), 2u64.to_le_bytes());
    }

    // ── 2. duplicate registration refused ───────────────────────────────

    #[test]
    fn duplicate_registration_refused() {
        let mut registry = FacetRegistry::new();
        let hash = code_hash(b"facet");
        let noop =
            |_: &mut AppStorage, _: &CallContext, _: &[u8]| -> Result<Vec<u8>, FacetError> {
                Ok(Vec::new())
            };
        registry.register(hash, Box::new(noop)).unwrap();
        let err = registry.register(hash, Box::new(noop)).unwrap_err();
        assert_eq!(err, RegistryError::HandlerExists(hash));
    }

    // ── 3. facet errors carry their reason verbatim ─────────────────────

    #[test]
    fn facet_error_reason_verbatim() {
        let handler = |_: &mut AppStorage, _: &CallContext, _: &[u8]| -> Result<Vec<u8>, FacetError> {
            Err(FacetError::new("insufficient balance"))
        };
        let mut storage = AppStorage::new();
        let err = handler.call(&mut storage, &ctx(), &[]).unwrap_err();
        assert_eq!(err.to_string(), "insufficient balance");
    }
}
