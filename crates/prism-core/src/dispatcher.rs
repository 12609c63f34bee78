// SPDX-License-Identifier: Apache-2.0
//! The Dispatcher: manifest state machine and codehash-pinned call routing.

use std::collections::BTreeMap;
use std::sync::Arc;

use prism_auth::{AccessControl, Role, RoleEvent};
use prism_merkle::{leaf_of, verify_proof, MerkleProof, Route};
use prism_types::{Addr, Clock, CodeHash, CodeStore, Hash32, ManifestAnchor, ManifestRoot, Selector};
use tracing::{debug, info, warn};

use crate::error::DispatcherError;
use crate::events::DispatcherEvent;
use crate::loupe::FacetInfo;
use crate::preflight::{preflight, PreflightReport};
use crate::registry::{AppStorage, CallContext, FacetRegistry};
use crate::state::{DispatcherConfig, ManifestState, PendingRoot};

/// One live entry of the route table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RouteEntry {
    /// Facet address serving the selector.
    pub facet: Addr,
    /// Code hash pinned when the route was applied.
    pub codehash: CodeHash,
    /// Epoch of the root the route was proven against.
    pub epoch: u64,
}

/// One entry of an `apply_routes` batch: a route plus its proof against the
/// pending root.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RouteProof {
    /// The route to write.
    pub route: Route,
    /// Ordered-pair proof for the route's leaf.
    pub proof: MerkleProof,
}

/// Manifest-routed function dispatcher.
///
/// Owns the manifest state machine, the selector route table, the role
/// table, and the shared [`AppStorage`] facets execute against. Every
/// mutating operation takes the caller explicitly; authorization is checked
/// before any other validation, and every failure leaves prior state
/// untouched.
pub struct Dispatcher {
    config: DispatcherConfig,
    state: ManifestState,
    routes: BTreeMap<Selector, RouteEntry>,
    access: AccessControl,
    paused: bool,
    storage: AppStorage,
    events: Vec<DispatcherEvent>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// Construct a dispatcher with `admin` holding all four roles.
    pub fn new(config: DispatcherConfig, admin: Addr, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            state: ManifestState::new(),
            routes: BTreeMap::new(),
            access: AccessControl::with_root(admin),
            paused: false,
            storage: AppStorage::new(),
            events: Vec::new(),
            clock,
        }
    }

    // ── manifest state machine ──────────────────────────────────────────

    /// Commit `root` as the pending manifest for `epoch`.
    ///
    /// Overwrites any unactivated pending commitment (last-committed-wins;
    /// there is no merge). Epochs must strictly increase over the active
    /// epoch.
    ///
    /// # Errors
    ///
    /// Authorization, frozen, paused, sentinel-root, and epoch failures per
    /// [`DispatcherError`].
    pub fn commit_root(
        &mut self,
        caller: Addr,
        root: ManifestRoot,
        epoch: u64,
    ) -> Result<(), DispatcherError> {
        self.access.require(caller, Role::Commit)?;
        self.ensure_unfrozen()?;
        self.ensure_unpaused()?;
        if root.is_empty() {
            return Err(DispatcherError::EmptyRootCommit);
        }
        if epoch <= self.state.active_epoch {
            return Err(DispatcherError::EpochNotIncreasing {
                epoch,
                active: self.state.active_epoch,
            });
        }
        let at = self.clock.now_unix();
        if let Some(old) = self.state.pending.replace(PendingRoot {
            root,
            epoch,
            committed_at: at,
        }) {
            debug!(superseded = %old.root, epoch = old.epoch, "pending root overwritten");
        }
        self.events
            .push(DispatcherEvent::RootCommitted { root, epoch, at });
        info!(%root, epoch, at, "root committed");
        Ok(())
    }

    /// Zero-cost manifest validation. Read-only and side-effect-free; fails
    /// closed on malformed input instead of erroring.
    pub fn preflight_manifest(
        &self,
        store: &dyn CodeStore,
        expected_hash: &Hash32,
        raw: &[u8],
    ) -> PreflightReport {
        preflight(self.config.addr, store, expected_hash, raw)
    }

    /// Verify and write a batch of routes against the **pending** root.
    ///
    /// All-or-nothing per call: every entry is verified before any entry is
    /// written, so an invalid proof anywhere rejects the whole batch and the
    /// caller can safely retry. Proofs are always checked against the
    /// current pending root, never a historical one — committing a new root
    /// invalidates proofs built for its predecessor.
    ///
    /// # Errors
    ///
    /// Authorization, frozen, paused, missing-pending, and proof failures.
    pub fn apply_routes(
        &mut self,
        caller: Addr,
        store: &dyn CodeStore,
        batch: &[RouteProof],
    ) -> Result<(), DispatcherError> {
        self.access.require(caller, Role::Apply)?;
        self.ensure_unfrozen()?;
        self.ensure_unpaused()?;
        let pending = self.state.pending.ok_or(DispatcherError::NoPendingRoot)?;

        for (index, entry) in batch.iter().enumerate() {
            let leaf = leaf_of(&entry.route);
            if !verify_proof(&leaf, &entry.proof.steps, &pending.root) {
                warn!(
                    index,
                    selector = %entry.route.selector,
                    pending = %pending.root,
                    "batch rejected: proof mismatch"
                );
                return Err(DispatcherError::ProofMismatch {
                    index,
                    selector: entry.route.selector,
                    pending: pending.root,
                });
            }
            // Facet liveness is advisory here (the dispatch path re-checks
            // the live hash every call), but a dead facet at apply time is
            // almost always an operator mistake worth surfacing.
            if store.code_hash_at(entry.route.facet) != Some(entry.route.codehash) {
                warn!(
                    index,
                    facet = %entry.route.facet,
                    "applying route whose facet code is not live"
                );
            }
        }
        for entry in batch {
            self.routes.insert(
                entry.route.selector,
                RouteEntry {
                    facet: entry.route.facet,
                    codehash: entry.route.codehash,
                    epoch: pending.epoch,
                },
            );
        }
        self.events.push(DispatcherEvent::RoutesApplied {
            count: batch.len(),
            epoch: pending.epoch,
        });
        info!(count = batch.len(), epoch = pending.epoch, "routes applied");
        Ok(())
    }

    /// Promote the pending root to active once the delay has elapsed.
    ///
    /// Boundary-inclusive: activation succeeds at exactly
    /// `committed_at + activation_delay_secs`. Gated by time only — content
    /// was already verified during apply.
    ///
    /// # Errors
    ///
    /// Authorization, frozen, paused, missing-pending, and timing failures.
    pub fn activate_committed_root(&mut self, caller: Addr) -> Result<(), DispatcherError> {
        self.access.require_any(caller, &[Role::Commit, Role::Apply])?;
        self.ensure_unfrozen()?;
        self.ensure_unpaused()?;
        let pending = self.state.pending.ok_or(DispatcherError::NoPendingRoot)?;
        let now = self.clock.now_unix();
        let ready_at = pending
            .committed_at
            .saturating_add(self.config.activation_delay_secs);
        if now < ready_at {
            return Err(DispatcherError::ActivationNotReady { ready_at, now });
        }
        self.state.active_root = pending.root;
        self.state.active_epoch = pending.epoch;
        self.state.manifest_version += 1;
        self.state.pending = None;
        self.events.push(DispatcherEvent::RootActivated {
            root: pending.root,
            epoch: pending.epoch,
            version: self.state.manifest_version,
            at: now,
        });
        info!(
            root = %pending.root,
            epoch = pending.epoch,
            version = self.state.manifest_version,
            "root activated"
        );
        Ok(())
    }

    /// One-way terminal freeze. Emergency-only.
    ///
    /// Afterwards commit/apply/activate fail forever regardless of caller.
    /// Dispatch of already-applied routes continues — freezing makes the
    /// deployment immutable, not dead — and role surgery stays open so a
    /// frozen system can still be handed over and audited.
    ///
    /// # Errors
    ///
    /// Authorization failure, or [`DispatcherError::Frozen`] if already frozen.
    pub fn freeze(&mut self, caller: Addr) -> Result<(), DispatcherError> {
        self.access.require(caller, Role::Emergency)?;
        self.ensure_unfrozen()?;
        self.state.frozen = true;
        self.events.push(DispatcherEvent::FrozenBy { by: caller });
        warn!(%caller, "dispatcher permanently frozen");
        Ok(())
    }

    /// Engage the circuit breaker. Admin or Emergency.
    ///
    /// While paused, dispatch and all manifest mutators fail; loupe views,
    /// preflight, and role surgery remain available.
    ///
    /// # Errors
    ///
    /// Authorization failure, or [`DispatcherError::Paused`] if already paused.
    pub fn pause(&mut self, caller: Addr) -> Result<(), DispatcherError> {
        self.access.require_any(caller, &[Role::Admin, Role::Emergency])?;
        if self.paused {
            return Err(DispatcherError::Paused);
        }
        self.paused = true;
        self.events.push(DispatcherEvent::PausedBy { by: caller });
        warn!(%caller, "dispatcher paused");
        Ok(())
    }

    /// Release the circuit breaker. Admin or Emergency.
    ///
    /// # Errors
    ///
    /// Authorization failure, or [`DispatcherError::NotPaused`].
    pub fn unpause(&mut self, caller: Addr) -> Result<(), DispatcherError> {
        self.access.require_any(caller, &[Role::Admin, Role::Emergency])?;
        if !self.paused {
            return Err(DispatcherError::NotPaused);
        }
        self.paused = false;
        self.events.push(DispatcherEvent::UnpausedBy { by: caller });
        info!(%caller, "dispatcher unpaused");
        Ok(())
    }

    // ── roles ───────────────────────────────────────────────────────────

    /// Grant `role` to `who`. Caller must hold Admin or Emergency.
    ///
    /// Deliberately available while paused and after freeze: the guardian
    /// must be able to rotate keys mid-incident, and a frozen deployment
    /// must still be transferable.
    ///
    /// # Errors
    ///
    /// Authorization failures from the role table.
    pub fn grant_role(&mut self, caller: Addr, who: Addr, role: Role) -> Result<(), DispatcherError> {
        self.access.grant(caller, who, role)?;
        Ok(())
    }

    /// Revoke `role` from `who`. Caller must hold Admin or Emergency.
    ///
    /// # Errors
    ///
    /// Authorization failures from the role table.
    pub fn revoke_role(
        &mut self,
        caller: Addr,
        who: Addr,
        role: Role,
    ) -> Result<(), DispatcherError> {
        self.access.revoke(caller, who, role)?;
        Ok(())
    }

    /// Returns `true` if `who` holds `role`.
    pub fn has_role(&self, who: Addr, role: Role) -> bool {
        self.access.has_role(who, role)
    }

    /// Role grant/revoke audit log.
    pub fn role_events(&self) -> &[RoleEvent] {
        self.access.events()
    }

    // ── dispatch path ───────────────────────────────────────────────────

    /// Route a call to its facet, re-validating the pinned code hash.
    ///
    /// The re-check happens on **every** call: a facet whose code changed or
    /// vanished since apply time fails here, cheaply, before any execution —
    /// a stale or compromised facet cannot be reached even though its route
    /// was never formally removed.
    ///
    /// # Errors
    ///
    /// Paused, missing-route, codehash, handler, and facet failures per
    /// [`DispatcherError`].
    pub fn dispatch(
        &mut self,
        caller: Addr,
        store: &dyn CodeStore,
        registry: &FacetRegistry,
        selector: Selector,
        calldata: &[u8],
    ) -> Result<Vec<u8>, DispatcherError> {
        if self.paused {
            return Err(DispatcherError::Paused);
        }
        let entry = *self
            .routes
            .get(&selector)
            .ok_or(DispatcherError::RouteNotFound(selector))?;
        let live = store.code_hash_at(entry.facet);
        if live != Some(entry.codehash) {
            debug!(%selector, facet = %entry.facet, "dispatch refused: codehash drift");
            return Err(DispatcherError::CodehashMismatch {
                selector,
                facet: entry.facet,
                pinned: entry.codehash,
                live,
            });
        }
        let handler = registry
            .resolve(&entry.codehash)
            .ok_or(DispatcherError::NoHandler(entry.codehash))?;
        let ctx = CallContext {
            caller,
            dispatcher: self.config.addr,
            selector,
        };
        handler
            .call(&mut self.storage, &ctx, calldata)
            .map_err(|e| DispatcherError::FacetReverted {
                selector,
                reason: e.0,
            })
    }

    // ── read views ──────────────────────────────────────────────────────

    /// Static configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Currently active epoch. 0 before any activation.
    pub fn active_epoch(&self) -> u64 {
        self.state.active_epoch
    }

    /// Unactivated pending commitment, if any.
    pub fn pending(&self) -> Option<PendingRoot> {
        self.state.pending
    }

    /// Activation counter.
    pub fn manifest_version(&self) -> u64 {
        self.state.manifest_version
    }

    /// Returns `true` once frozen.
    pub fn is_frozen(&self) -> bool {
        self.state.frozen
    }

    /// Returns `true` while the circuit breaker is engaged.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Route entry for `selector`, if applied.
    pub fn route(&self, selector: Selector) -> Option<RouteEntry> {
        self.routes.get(&selector).copied()
    }

    /// All facets and their selectors, in facet-address order.
    pub fn facets(&self) -> Vec<FacetInfo> {
        let mut grouped: BTreeMap<Addr, Vec<Selector>> = BTreeMap::new();
        for (selector, entry) in &self.routes {
            grouped.entry(entry.facet).or_default().push(*selector);
        }
        grouped
            .into_iter()
            .map(|(facet, selectors)| FacetInfo { facet, selectors })
            .collect()
    }

    /// Distinct facet addresses, in address order.
    pub fn facet_addresses(&self) -> Vec<Addr> {
        self.facets().into_iter().map(|info| info.facet).collect()
    }

    /// Selectors routed to `facet`, in selector order.
    pub fn facet_function_selectors(&self, facet: Addr) -> Vec<Selector> {
        self.routes
            .iter()
            .filter(|(_, entry)| entry.facet == facet)
            .map(|(selector, _)| *selector)
            .collect()
    }

    /// Facet address serving `selector`, if routed.
    pub fn facet_address(&self, selector: Selector) -> Option<Addr> {
        self.routes.get(&selector).map(|entry| entry.facet)
    }

    /// Lifecycle event log, in order.
    pub fn events(&self) -> &[DispatcherEvent] {
        &self.events
    }

    /// Shared facet storage (read access for embedders and tests).
    pub fn storage(&self) -> &AppStorage {
        &self.storage
    }

    fn ensure_unfrozen(&self) -> Result<(), DispatcherError> {
        if self.state.frozen {
            return Err(DispatcherError::Frozen);
        }
        Ok(())
    }

    fn ensure_unpaused(&self) -> Result<(), DispatcherError> {
        if self.paused {
            return Err(DispatcherError::Paused);
        }
        Ok(())
    }
}

impl ManifestAnchor for Dispatcher {
    fn active_root(&self) -> ManifestRoot {
        self.state.active_root
    }
}
