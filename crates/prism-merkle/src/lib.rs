// SPDX-License-Identifier: Apache-2.0
//! Ordered-pair Merkle route codec and manifest interchange model.
//!
//! This crate is the protocol's source of truth for how a manifest (an
//! ordered list of `(selector, facet, codehash)` routes) is identified by a
//! 32-byte root and how individual routes are proven against that root. The
//! scheme is **ordered-pair and position-dependent** — siblings are combined
//! in tree order, never sorted first — and unmatched odd nodes at a level are
//! *promoted unchanged*, never duplicated. Both choices are interoperability
//! commitments: off-chain tooling reconstructs leaves and proofs
//! independently and must match bit-for-bit. Do not switch to a sorted-pair
//! scheme; it changes every proof encoding.
//!
//! JSON ([`ManifestFile`]) appears only at the tooling boundary. Hash paths
//! consume the fixed-width byte encodings exclusively.

mod codec;
mod manifest;

pub use codec::{
    build_root, combine, leaf_of, position_bits, route_wire, verify_proof, verify_proof_indexed,
    CodecError, MerkleProof, ProofStep, Route, LEAF_WIDTH, ROUTE_COMPACT_WIDTH,
};
pub use manifest::{
    decode_routes_compact, encode_routes_compact, manifest_hash, ManifestError, ManifestFile,
};
