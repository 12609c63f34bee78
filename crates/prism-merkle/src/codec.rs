// SPDX-License-Identifier: Apache-2.0
//! Leaf encoding, ordered-pair proof verification, and the reference builder.

use std::collections::BTreeSet;

use blake3::Hasher;
use prism_types::{Addr, CodeHash, Hash32, ManifestRoot, Selector};

/// Canonical leaf preimage width: `selector(4) || facet(20) || codehash(32)`.
pub const LEAF_WIDTH: usize = 56;

/// Per-route width of the compact preflight encoding: `selector(4) || facet(20)`.
pub const ROUTE_COMPACT_WIDTH: usize = 24;

/// One `(selector, facet, codehash)` routing entry.
///
/// A route is valid only while `codehash` equals the live hash of the code at
/// `facet`; the dispatcher re-checks that on every call, not just at apply
/// time.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct Route {
    /// 4-byte function identifier.
    pub selector: Selector,
    /// Address of the facet serving the selector.
    pub facet: Addr,
    /// Pinned content hash of the facet's code.
    pub codehash: CodeHash,
}

/// One step of an ordered-pair proof.
///
/// `right == true` means the running hash is the **right** child at this
/// level, i.e. the sibling goes on the left of the combine. This is the
/// canonical wire form — the apply operation ships the same information as
/// parallel `(proof[], is_right[])` arrays.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProofStep {
    /// Sibling hash at this level.
    pub sibling: Hash32,
    /// Whether the running hash is the right child.
    pub right: bool,
}

/// Full proof for one leaf: bottom-up sibling steps.
///
/// A promoted level (unmatched odd node carried up unchanged) contributes no
/// step, so `steps.len()` can be less than the tree depth.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct MerkleProof {
    /// Steps from leaf level upward.
    pub steps: Vec<ProofStep>,
}

/// Builder-level errors. The verifier itself never errors — it only answers
/// `true` or `false`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Zero routes: the empty root is a reserved sentinel, not a buildable tree.
    #[error("[EMPTY_MANIFEST] cannot build a root over zero routes")]
    EmptyManifest,
    /// The same selector appeared twice in one manifest.
    ///
    /// The proof machinery cannot detect duplicates; rejecting them before
    /// commit is the builder's job, and it is enforced here.
    #[error("[DUPLICATE_SELECTOR] selector {0} appears more than once")]
    DuplicateSelector(Selector),
}

/// Canonical 56-byte wire encoding of a route.
///
/// The exact byte layout is part of the protocol contract — independent
/// tooling re-derives leaves from this encoding and must match bit-for-bit.
pub fn route_wire(route: &Route) -> [u8; LEAF_WIDTH] {
    let mut out = [0u8; LEAF_WIDTH];
    out[..4].copy_from_slice(route.selector.as_bytes());
    out[4..24].copy_from_slice(route.facet.as_bytes());
    out[24..].copy_from_slice(route.codehash.as_bytes());
    out
}

/// Leaf hash of a route: BLAKE3 over the canonical wire encoding.
pub fn leaf_of(route: &Route) -> Hash32 {
    *blake3::hash(&route_wire(route)).as_bytes()
}

/// Ordered-pair combine: `BLAKE3(left || right)`. Never sorts.
pub fn combine(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut hasher = Hasher::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Verify an ordered-pair proof against `root`.
///
/// Walks `steps` bottom-up, placing the running hash left or right per each
/// step's position bit. An empty proof is valid iff `leaf == root`
/// (single-leaf tree).
pub fn verify_proof(leaf: &Hash32, steps: &[ProofStep], root: &ManifestRoot) -> bool {
    let mut acc = *leaf;
    for step in steps {
        acc = if step.right {
            combine(&step.sibling, &acc)
        } else {
            combine(&acc, &step.sibling)
        };
    }
    acc == root.0
}

/// Position bits derived from a leaf index: `(index >> level) & 1` per level.
///
/// Exact for full binary levels. When a level promotes an unmatched odd node
/// the proof has no step there, so index-derived bits can fall out of step
/// with the remaining siblings — which is why the wire format carries
/// explicit bits. Use [`verify_proof`] with builder-emitted steps as the
/// canonical path.
pub fn position_bits(index: usize, depth: usize) -> Vec<bool> {
    (0..depth).map(|level| (index >> level) & 1 == 1).collect()
}

/// Index-derived convenience form of [`verify_proof`].
///
/// Zips `siblings` with [`position_bits`]; correct whenever every level along
/// the leaf's path had a sibling (always true for power-of-two leaf counts).
pub fn verify_proof_indexed(
    leaf: &Hash32,
    siblings: &[Hash32],
    index: usize,
    root: &ManifestRoot,
) -> bool {
    let bits = position_bits(index, siblings.len());
    let steps: Vec<ProofStep> = siblings
        .iter()
        .zip(bits)
        .map(|(sibling, right)| ProofStep {
            sibling: *sibling,
            right,
        })
        .collect();
    verify_proof(leaf, &steps, root)
}

/// Reference builder: root plus one proof per route, in input order.
///
/// Semantics are part of the protocol contract — the verifier has no
/// independent notion of "correct" construction, so any divergence here is a
/// silent security bug rather than a crash.
///
/// # Errors
///
/// [`CodecError::EmptyManifest`] for zero routes,
/// [`CodecError::DuplicateSelector`] if a selector repeats.
pub fn build_root(routes: &[Route]) -> Result<(ManifestRoot, Vec<MerkleProof>), CodecError> {
    if routes.is_empty() {
        return Err(CodecError::EmptyManifest);
    }
    let mut seen = BTreeSet::new();
    for route in routes {
        if !seen.insert(route.selector) {
            return Err(CodecError::DuplicateSelector(route.selector));
        }
    }

    let mut nodes: Vec<Hash32> = routes.iter().map(leaf_of).collect();
    let mut proofs: Vec<MerkleProof> = vec![MerkleProof::default(); routes.len()];
    // Each leaf's node index at the current level.
    let mut cursor: Vec<usize> = (0..routes.len()).collect();

    while nodes.len() > 1 {
        for (proof, ci) in proofs.iter_mut().zip(&cursor) {
            let sibling_idx = ci ^ 1;
            if sibling_idx < nodes.len() {
                proof.steps.push(ProofStep {
                    sibling: nodes[sibling_idx],
                    right: ci & 1 == 1,
                });
            }
            // else: unmatched odd node, promoted unchanged — no step.
        }
        let mut next = Vec::with_capacity(nodes.len().div_ceil(2));
        for pair in nodes.chunks(2) {
            match pair {
                [left, right] => next.push(combine(left, right)),
                [promoted] => next.push(*promoted),
                _ => {}
            }
        }
        nodes = next;
        for ci in &mut cursor {
            *ci /= 2;
        }
    }

    Ok((ManifestRoot(nodes[0]), proofs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use prism_types::{code_hash, make_addr};

    fn route(n: u8) -> Route {
        Route {
            selector: Selector([n, n, n, n]),
            facet: make_addr(&format!("facet-{n}")),
            codehash: code_hash(&[n; 8]),
        }
    }

    // ── 1. single leaf: empty proof, leaf == root ───────────────────────

    #[test]
    fn single_leaf_tree() {
        let r = route(1);
        let (root, proofs) = build_root(&[r]).unwrap();
        assert_eq!(proofs.len(), 1);
        assert!(proofs[0].steps.is_empty());
        assert_eq!(root.0, leaf_of(&r));
        assert!(verify_proof(&leaf_of(&r), &proofs[0].steps, &root));
    }

    // ── 2. empty proof against a different root fails ───────────────────

    #[test]
    fn empty_proof_requires_leaf_equals_root() {
        let r = route(1);
        assert!(!verify_proof(&leaf_of(&r), &[], &ManifestRoot([9; 32])));
    }

    // ── 3. two leaves: ordered pair, not sorted ─────────────────────────

    #[test]
    fn two_leaves_ordered_pair() {
        let (a, b) = (route(1), route(2));
        let (root, _) = build_root(&[a, b]).unwrap();
        assert_eq!(root.0, combine(&leaf_of(&a), &leaf_of(&b)));
        // Ordering matters: swapping the inputs changes the root.
        let (swapped, _) = build_root(&[b, a]).unwrap();
        assert_ne!(root, swapped);
    }

    // ── 4. odd leaf promoted, never duplicated ──────────────────────────

    #[test]
    fn odd_leaf_promoted_not_duplicated() {
        let (a, b, c) = (route(1), route(2), route(3));
        let (root, proofs) = build_root(&[a, b, c]).unwrap();
        let h01 = combine(&leaf_of(&a), &leaf_of(&b));
        // Duplication would give combine(h01, combine(c, c)).
        assert_eq!(root.0, combine(&h01, &leaf_of(&c)));
        // The promoted leaf's proof skips level 0: a single step at level 1.
        assert_eq!(proofs[2].steps.len(), 1);
        assert_eq!(proofs[2].steps[0], ProofStep { sibling: h01, right: true });
        assert!(verify_proof(&leaf_of(&c), &proofs[2].steps, &root));
    }

    // ── 5. duplicate selector rejected ──────────────────────────────────

    #[test]
    fn duplicate_selector_rejected() {
        let a = route(1);
        let err = build_root(&[a, a]).unwrap_err();
        assert_eq!(err, CodecError::DuplicateSelector(a.selector));
    }

    // ── 6. empty manifest rejected ──────────────────────────────────────

    #[test]
    fn empty_manifest_rejected() {
        assert_eq!(build_root(&[]).unwrap_err(), CodecError::EmptyManifest);
    }

    // ── 7. indexed verification agrees on a full tree ───────────────────

    #[test]
    fn indexed_form_agrees_on_full_tree() {
        let routes: Vec<Route> = (0..8).map(route).collect();
        let (root, proofs) = build_root(&routes).unwrap();
        for (i, (r, proof)) in routes.iter().zip(&proofs).enumerate() {
            let siblings: Vec<Hash32> = proof.steps.iter().map(|s| s.sibling).collect();
            let bits: Vec<bool> = proof.steps.iter().map(|s| s.right).collect();
            assert_eq!(bits, position_bits(i, 3), "leaf {i}");
            assert!(verify_proof_indexed(&leaf_of(r), &siblings, i, &root));
        }
    }

    // ── 8. wire layout is exactly 4 + 20 + 32 in order ──────────────────

    #[test]
    fn wire_layout_fixed() {
        let r = route(7);
        let wire = route_wire(&r);
        assert_eq!(&wire[..4], r.selector.as_bytes());
        assert_eq!(&wire[4..24], r.facet.as_bytes());
        assert_eq!(&wire[24..], r.codehash.as_bytes());
        assert_eq!(leaf_of(&r), *blake3::hash(&wire).as_bytes());
    }

    // ── 9. swapping two proof steps breaks verification ─────────────────

    #[test]
    fn swapped_proof_steps_fail() {
        let routes: Vec<Route> = (0..4).map(route).collect();
        let (root, proofs) = build_root(&routes).unwrap();
        let mut steps = proofs[0].steps.clone();
        steps.swap(0, 1);
        assert!(!verify_proof(&leaf_of(&routes[0]), &steps, &root));
    }
}
