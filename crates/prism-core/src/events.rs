// SPDX-License-Identifier: Apache-2.0
//! Dispatcher lifecycle events, recorded in order for off-chain indexers.

use prism_types::{Addr, ManifestRoot};

/// One state transition of the dispatcher.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DispatcherEvent {
    /// A root was committed to the pending slot.
    RootCommitted {
        /// Committed root.
        root: ManifestRoot,
        /// Its epoch.
        epoch: u64,
        /// Commit time (unix seconds).
        at: u64,
    },
    /// Routes were applied against the pending root.
    RoutesApplied {
        /// Number of routes written by the batch.
        count: usize,
        /// Epoch of the pending root they were proven against.
        epoch: u64,
    },
    /// The pending root was promoted to active.
    RootActivated {
        /// Newly active root.
        root: ManifestRoot,
        /// Newly active epoch.
        epoch: u64,
        /// Manifest version after the bump.
        version: u64,
        /// Activation time (unix seconds).
        at: u64,
    },
    /// Circuit breaker engaged.
    PausedBy {
        /// Caller that paused.
        by: Addr,
    },
    /// Circuit breaker released.
    UnpausedBy {
        /// Caller that unpaused.
        by: Addr,
    },
    /// Terminal freeze.
    FrozenBy {
        /// Caller that froze.
        by: Addr,
    },
}
