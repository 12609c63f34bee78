// SPDX-License-Identifier: Apache-2.0
//! Manifest interchange: the JSON file the off-chain builder emits and the
//! compact byte encoding the dispatcher's preflight consumes.

use std::collections::BTreeMap;

use prism_types::{Addr, Hash32, ManifestRoot, Selector};

use crate::codec::{
    build_root, CodecError, MerkleProof, ProofStep, Route, ROUTE_COMPACT_WIDTH,
};

/// Errors from manifest assembly and consistency checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// Builder-level codec failure.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// File's recorded root does not match a rebuild from its routes.
    #[error("[MANIFEST_ROOT_MISMATCH] recorded {recorded}, rebuilt {rebuilt}")]
    RootMismatch {
        /// Root recorded in the file.
        recorded: ManifestRoot,
        /// Root rebuilt from the file's routes.
        rebuilt: ManifestRoot,
    },
    /// A route has no proof entry (or positions are missing/mismatched).
    #[error("[MANIFEST_PROOF_MISSING] no usable proof for selector {0}")]
    ProofMissing(Selector),
    /// Compact encoding length is not a multiple of the per-route width.
    #[error("[BAD_MANIFEST_LENGTH] {len} bytes is not a multiple of {width}")]
    BadCompactLength {
        /// Offending byte length.
        len: usize,
        /// Required record width.
        width: usize,
    },
    /// JSON (de)serialization failure at the tooling boundary.
    #[error("[MANIFEST_JSON] {0}")]
    Json(String),
}

/// The manifest file produced by the builder and consumed by deployment
/// tooling.
///
/// Proof siblings and position bits are parallel per-selector arrays; the
/// bits are explicit on the wire because promoted levels contribute no step
/// and index-derived bits cannot cover every tree shape.
#[derive(Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct ManifestFile {
    /// Ordered route list. Order is identity-bearing: it fixes leaf indices.
    pub routes: Vec<Route>,
    /// Merkle root over the routes.
    #[serde(rename = "merkleRoot")]
    pub merkle_root: ManifestRoot,
    /// Per-selector sibling hashes, hex-encoded, bottom-up.
    pub proofs: BTreeMap<Selector, Vec<String>>,
    /// Per-selector position bits, parallel to `proofs` (`true` = running
    /// hash is the right child).
    pub positions: BTreeMap<Selector, Vec<bool>>,
}

impl ManifestFile {
    /// Assemble a manifest file from routes: builds the root and all proofs.
    pub fn from_routes(routes: Vec<Route>) -> Result<Self, ManifestError> {
        let (merkle_root, proofs) = build_root(&routes)?;
        let mut proof_map = BTreeMap::new();
        let mut position_map = BTreeMap::new();
        for (route, proof) in routes.iter().zip(&proofs) {
            proof_map.insert(
                route.selector,
                proof.steps.iter().map(|s| hex::encode(s.sibling)).collect(),
            );
            position_map.insert(route.selector, proof.steps.iter().map(|s| s.right).collect());
        }
        Ok(Self {
            routes,
            merkle_root,
            proofs: proof_map,
            positions: position_map,
        })
    }

    /// Re-derive the root from `routes` and compare against `merkle_root`,
    /// then check every route has a parseable proof with matching positions.
    pub fn check_consistency(&self) -> Result<(), ManifestError> {
        let (rebuilt, _) = build_root(&self.routes)?;
        if rebuilt != self.merkle_root {
            return Err(ManifestError::RootMismatch {
                recorded: self.merkle_root,
                rebuilt,
            });
        }
        for route in &self.routes {
            self.proof_for(route.selector)
                .ok_or(ManifestError::ProofMissing(route.selector))?;
        }
        Ok(())
    }

    /// Decode the stored proof for `selector`, or `None` if absent or
    /// malformed (bad hex, mismatched position arity).
    pub fn proof_for(&self, selector: Selector) -> Option<MerkleProof> {
        let siblings = self.proofs.get(&selector)?;
        let bits = self.positions.get(&selector)?;
        if siblings.len() != bits.len() {
            return None;
        }
        let mut steps = Vec::with_capacity(siblings.len());
        for (sib_hex, right) in siblings.iter().zip(bits) {
            let bytes = hex::decode(sib_hex.strip_prefix("0x").unwrap_or(sib_hex)).ok()?;
            let sibling: Hash32 = bytes.try_into().ok()?;
            steps.push(ProofStep {
                sibling,
                right: *right,
            });
        }
        Some(MerkleProof { steps })
    }

    /// Serialize to the interchange JSON.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        serde_json::to_string_pretty(self).map_err(|e| ManifestError::Json(e.to_string()))
    }

    /// Parse from the interchange JSON. Does not check consistency; call
    /// [`check_consistency`](Self::check_consistency) before trusting it.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json).map_err(|e| ManifestError::Json(e.to_string()))
    }

    /// Compact preflight encoding of this manifest's routes.
    pub fn compact_bytes(&self) -> Vec<u8> {
        encode_routes_compact(&self.routes)
    }
}

/// Encode routes as fixed 24-byte `selector || facet` records.
///
/// This is the zero-cost preflight path: codehashes are re-derived from live
/// code at apply time, so they are omitted here.
pub fn encode_routes_compact(routes: &[Route]) -> Vec<u8> {
    let mut out = Vec::with_capacity(routes.len() * ROUTE_COMPACT_WIDTH);
    for route in routes {
        out.extend_from_slice(route.selector.as_bytes());
        out.extend_from_slice(route.facet.as_bytes());
    }
    out
}

/// Decode a compact encoding back into `(selector, facet)` pairs.
///
/// # Errors
///
/// [`ManifestError::BadCompactLength`] if `bytes` is not a whole number of
/// records.
pub fn decode_routes_compact(bytes: &[u8]) -> Result<Vec<(Selector, Addr)>, ManifestError> {
    if bytes.len() % ROUTE_COMPACT_WIDTH != 0 {
        return Err(ManifestError::BadCompactLength {
            len: bytes.len(),
            width: ROUTE_COMPACT_WIDTH,
        });
    }
    let mut out = Vec::with_capacity(bytes.len() / ROUTE_COMPACT_WIDTH);
    for record in bytes.chunks_exact(ROUTE_COMPACT_WIDTH) {
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&record[..4]);
        let mut facet = [0u8; 20];
        facet.copy_from_slice(&record[4..]);
        out.push((Selector(selector), Addr(facet)));
    }
    Ok(out)
}

/// Hash of a compact manifest encoding: content-only BLAKE3.
pub fn manifest_hash(bytes: &[u8]) -> Hash32 {
    *blake3::hash(bytes).as_bytes()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::{leaf_of, verify_proof};
    use prism_types::{code_hash, make_addr};

    fn routes(n: u8) -> Vec<Route> {
        (0..n)
            .map(|i| Route {
                selector: Selector([0x10 + i, 0, 0, i]),
                facet: make_addr(&format!("manifest-facet-{i}")),
                codehash: code_hash(&[i; 16]),
            })
            .collect()
    }

    // ── 1. json round-trip preserves everything ─────────────────────────

    #[test]
    fn json_round_trip() {
        let file = ManifestFile::from_routes(routes(5)).unwrap();
        let json = file.to_json().unwrap();
        let back = ManifestFile::from_json(&json).unwrap();
        assert_eq!(back, file);
        back.check_consistency().unwrap();
    }

    // ── 2. stored proofs verify against the stored root ─────────────────

    #[test]
    fn stored_proofs_verify() {
        let file = ManifestFile::from_routes(routes(7)).unwrap();
        for route in &file.routes {
            let proof = file.proof_for(route.selector).unwrap();
            assert!(verify_proof(&leaf_of(route), &proof.steps, &file.merkle_root));
        }
    }

    // ── 3. tampered root detected ───────────────────────────────────────

    #[test]
    fn tampered_root_detected() {
        let mut file = ManifestFile::from_routes(routes(3)).unwrap();
        file.merkle_root = ManifestRoot([0xee; 32]);
        let err = file.check_consistency().unwrap_err();
        assert!(matches!(err, ManifestError::RootMismatch { .. }));
    }

    // ── 4. missing proof entry detected ─────────────────────────────────

    #[test]
    fn missing_proof_detected() {
        let mut file = ManifestFile::from_routes(routes(3)).unwrap();
        let victim = file.routes[1].selector;
        file.proofs.remove(&victim);
        assert_eq!(
            file.check_consistency().unwrap_err(),
            ManifestError::ProofMissing(victim)
        );
    }

    // ── 5. compact encoding round-trip and width check ──────────────────

    #[test]
    fn compact_round_trip() {
        let rs = routes(4);
        let bytes = encode_routes_compact(&rs);
        assert_eq!(bytes.len(), 4 * ROUTE_COMPACT_WIDTH);
        let decoded = decode_routes_compact(&bytes).unwrap();
        for (route, (sel, facet)) in rs.iter().zip(decoded) {
            assert_eq!(sel, route.selector);
            assert_eq!(facet, route.facet);
        }
        // Truncated input is rejected with the length error.
        let err = decode_routes_compact(&bytes[..10]).unwrap_err();
        assert_eq!(
            err,
            ManifestError::BadCompactLength {
                len: 10,
                width: ROUTE_COMPACT_WIDTH
            }
        );
    }
}
