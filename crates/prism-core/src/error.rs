// SPDX-License-Identifier: Apache-2.0
//! Dispatcher error taxonomy.
//!
//! Codes are stable and machine-branchable. Timing failures carry a
//! distinguishable code from proof failures so operators can tell "not ready
//! yet" from "wrong data"; authorization is always checked before anything
//! else; every failure leaves prior state untouched.

use prism_auth::AuthError;
use prism_types::{Addr, CodeHash, ManifestRoot, Selector};

/// Failures of dispatcher operations, manifest or dispatch path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatcherError {
    /// Caller lacks the required role.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Terminal state: the dispatcher was frozen.
    #[error("[FROZEN] dispatcher is permanently frozen")]
    Frozen,
    /// Circuit breaker engaged.
    #[error("[PAUSED] dispatcher is paused")]
    Paused,
    /// Unpause of a dispatcher that is not paused.
    #[error("[NOT_PAUSED] dispatcher is not paused")]
    NotPaused,
    /// Commit epoch must strictly exceed the active epoch.
    #[error("[EPOCH_NOT_INCREASING] epoch {epoch} <= active epoch {active}")]
    EpochNotIncreasing {
        /// Rejected epoch.
        epoch: u64,
        /// Current active epoch.
        active: u64,
    },
    /// The empty sentinel root cannot be committed.
    #[error("[EMPTY_ROOT] the zero root is a reserved sentinel")]
    EmptyRootCommit,
    /// Apply or activate with no pending commitment.
    #[error("[NO_PENDING_ROOT] no pending root is committed")]
    NoPendingRoot,
    /// Activation attempted before the delay elapsed.
    #[error("[ACTIVATION_NOT_READY] ready at {ready_at}, now {now}")]
    ActivationNotReady {
        /// Earliest acceptable activation time.
        ready_at: u64,
        /// Dispatcher's current time.
        now: u64,
    },
    /// A batch entry's proof did not verify against the pending root.
    ///
    /// The whole batch is rejected; nothing was written.
    #[error("[PROOF_MISMATCH] entry {index} (selector {selector}) not provable against pending root {pending}")]
    ProofMismatch {
        /// Index of the failing entry within the batch.
        index: usize,
        /// Selector of the failing entry.
        selector: Selector,
        /// The pending root the proof was checked against.
        pending: ManifestRoot,
    },
    /// No route for the dispatched selector.
    #[error("[ROUTE_NOT_FOUND] no route for selector {0}")]
    RouteNotFound(Selector),
    /// The facet's live code hash drifted from the pinned one.
    ///
    /// Checked on every dispatch; a redeployed or destroyed facet
    /// invalidates its routes without any bookkeeping.
    #[error("[CODEHASH_MISMATCH] facet {facet} for {selector}: pinned {pinned}, live {live:?}")]
    CodehashMismatch {
        /// Selector whose route failed.
        selector: Selector,
        /// Facet address the route points at.
        facet: Addr,
        /// Hash pinned at apply time.
        pinned: CodeHash,
        /// Live hash, `None` if the address holds no code.
        live: Option<CodeHash>,
    },
    /// The registry has no handler for the facet's (matching) code hash.
    #[error("[NO_HANDLER] no handler registered for code hash {0}")]
    NoHandler(CodeHash),
    /// The facet executed and failed; its reason propagates unchanged.
    #[error("[FACET_REVERTED] selector {selector}: {reason}")]
    FacetReverted {
        /// Dispatched selector.
        selector: Selector,
        /// Facet-provided failure reason.
        reason: String,
    },
}
