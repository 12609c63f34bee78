// SPDX-License-Identifier: Apache-2.0
//! Manifest state: active and pending roots, epochs, and the frozen flag.

use prism_types::{Addr, ManifestRoot};

/// Static dispatcher configuration.
///
/// Serde-derived so deployment tooling can load it from JSON alongside the
/// per-network address records.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct DispatcherConfig {
    /// The dispatcher's own address. Routes pointing back at it are refused.
    pub addr: Addr,
    /// Seconds between commit and earliest activation.
    ///
    /// The delay is an observation window, not an exclusion lock: commits
    /// and applies may continue during it, and a malicious pending root is
    /// expected to be caught here via pause/freeze before it goes live.
    pub activation_delay_secs: u64,
    /// Network identifier, surfaced to facet signature domains.
    pub chain_id: u64,
}

/// A committed-but-not-yet-active root.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PendingRoot {
    /// The committed root.
    pub root: ManifestRoot,
    /// Epoch tagging the commitment. Always greater than the active epoch.
    pub epoch: u64,
    /// Commit time (unix seconds); activation unlocks at
    /// `committed_at + activation_delay_secs`, boundary-inclusive.
    pub committed_at: u64,
}

/// The manifest state machine's persistent fields.
///
/// Per-epoch lifecycle is `Empty → Committed → Active`, with `frozen` as an
/// absorbing state reachable from anywhere. `active_root` being the empty
/// sentinel means no manifest has ever activated.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ManifestState {
    /// Currently active root, or the empty sentinel.
    pub active_root: ManifestRoot,
    /// Epoch of the active root. 0 before any activation.
    pub active_epoch: u64,
    /// Unactivated pending commitment, if any.
    pub pending: Option<PendingRoot>,
    /// Bumped once per activation; a human-auditable version counter.
    pub manifest_version: u64,
    /// Terminal: forbids commit/apply/activate forever once set.
    pub frozen: bool,
}

impl ManifestState {
    /// Fresh state: nothing active, nothing pending.
    pub fn new() -> Self {
        Self {
            active_root: ManifestRoot::EMPTY,
            active_epoch: 0,
            pending: None,
            manifest_version: 0,
            frozen: false,
        }
    }
}

impl Default for ManifestState {
    fn default() -> Self {
        Self::new()
    }
}
