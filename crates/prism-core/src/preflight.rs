// SPDX-License-Identifier: Apache-2.0
//! Zero-cost manifest preflight.
//!
//! A read-only, state-free simulation that lets a caller validate a manifest
//! before spending anything on a real commit. It must be idempotent and
//! side-effect-free under all inputs, including malformed ones, so it never
//! returns `Err` — malformed input yields `valid == false` with a
//! branchable reason instead.

use prism_merkle::{decode_routes_compact, manifest_hash};
use prism_types::{Addr, CodeStore, Hash32};

/// Why a preflight failed, for tooling to branch on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PreflightIssue {
    /// Raw bytes do not hash to the expected manifest hash.
    HashMismatch,
    /// Byte length is not a whole number of route records.
    BadLength,
    /// A record names the zero address as its facet.
    ZeroFacet,
    /// A record routes back to the dispatcher itself.
    SelfFacet,
    /// A record's facet has no deployed code.
    NoCode,
}

/// Outcome of a preflight pass.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PreflightReport {
    /// Overall verdict. `false` never carries partial validity.
    pub valid: bool,
    /// Number of route records in the encoding (0 when the length check
    /// already failed).
    pub route_count: usize,
    /// First issue encountered, if any.
    pub issue: Option<PreflightIssue>,
}

impl PreflightReport {
    fn fail(route_count: usize, issue: PreflightIssue) -> Self {
        Self {
            valid: false,
            route_count,
            issue: Some(issue),
        }
    }
}

/// Validate a compact manifest encoding against `expected_hash` and the live
/// code plane. Fails closed; performs no writes.
pub fn preflight(
    dispatcher: Addr,
    store: &dyn CodeStore,
    expected_hash: &Hash32,
    raw: &[u8],
) -> PreflightReport {
    if manifest_hash(raw) != *expected_hash {
        return PreflightReport::fail(0, PreflightIssue::HashMismatch);
    }
    let Ok(records) = decode_routes_compact(raw) else {
        return PreflightReport::fail(0, PreflightIssue::BadLength);
    };
    let route_count = records.len();
    for (_, facet) in records {
        if facet.is_zero() {
            return PreflightReport::fail(route_count, PreflightIssue::ZeroFacet);
        }
        if facet == dispatcher {
            return PreflightReport::fail(route_count, PreflightIssue::SelfFacet);
        }
        if !store.has_code(facet) {
            return PreflightReport::fail(route_count, PreflightIssue::NoCode);
        }
    }
    PreflightReport {
        valid: true,
        route_count,
        issue: None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use prism_merkle::{encode_routes_compact, Route};
    use prism_types::{code_hash, make_addr, MemoryCodeStore};

    fn live_route(store: &mut MemoryCodeStore, label: &str) -> Route {
        let facet = make_addr(label);
        let code = format!("code-{label}");
        store.deploy_at(facet, code.as_bytes()).unwrap();
        Route {
            selector: prism_types::Selector(
                code_hash(label.as_bytes()).0[..4].try_into().unwrap(),
            ),
            facet,
            codehash: code_hash(code.as_bytes()),
        }
    }

    // ── 1. well-formed manifest passes with the right count ─────────────

    #[test]
    fn valid_manifest_passes() {
        let mut store = MemoryCodeStore::new();
        let routes = vec![live_route(&mut store, "f1"), live_route(&mut store, "f2")];
        let raw = encode_routes_compact(&routes);
        let report = preflight(make_addr("dispatcher"), &store, &manifest_hash(&raw), &raw);
        assert!(report.valid);
        assert_eq!(report.route_count, 2);
        assert_eq!(report.issue, None);
    }

    // ── 2. every failure mode reports, never panics ─────────────────────

    #[test]
    fn failure_modes_fail_closed() {
        let mut store = MemoryCodeStore::new();
        let dispatcher = make_addr("dispatcher");
        store.deploy_at(dispatcher, b"dispatcher-code").unwrap();
        let good = live_route(&mut store, "good");
        let raw = encode_routes_compact(&[good]);

        // Wrong expected hash.
        let report = preflight(dispatcher, &store, &[0xab; 32], &raw);
        assert_eq!(report.issue, Some(PreflightIssue::HashMismatch));

        // Truncated encoding (hash recomputed over the truncation so the
        // length check is what fires).
        let truncated = &raw[..raw.len() - 1];
        let report = preflight(dispatcher, &store, &manifest_hash(truncated), truncated);
        assert_eq!(report.issue, Some(PreflightIssue::BadLength));
        assert_eq!(report.route_count, 0);

        // Zero facet.
        let mut zeroed = good;
        zeroed.facet = prism_types::Addr::ZERO;
        let raw = encode_routes_compact(&[zeroed]);
        let report = preflight(dispatcher, &store, &manifest_hash(&raw), &raw);
        assert_eq!(report.issue, Some(PreflightIssue::ZeroFacet));
        assert_eq!(report.route_count, 1);

        // Self-referential facet.
        let mut selfed = good;
        selfed.facet = dispatcher;
        let raw = encode_routes_compact(&[selfed]);
        let report = preflight(dispatcher, &store, &manifest_hash(&raw), &raw);
        assert_eq!(report.issue, Some(PreflightIssue::SelfFacet));

        // Facet with no code.
        let mut codeless = good;
        codeless.facet = make_addr("nowhere");
        let raw = encode_routes_compact(&[codeless]);
        let report = preflight(dispatcher, &store, &manifest_hash(&raw), &raw);
        assert_eq!(report.issue, Some(PreflightIssue::NoCode));

        // Empty input is a valid zero-route manifest.
        let report = preflight(dispatcher, &store, &manifest_hash(&[]), &[]);
        assert!(report.valid);
        assert_eq!(report.route_count, 0);
    }
}
