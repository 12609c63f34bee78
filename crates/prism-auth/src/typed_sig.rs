// SPDX-License-Identifier: Apache-2.0
//! Typed-data delegated signatures for facet initialization and rotation.
//!
//! The scheme mirrors typed-structured-data signing: a domain hash binds the
//! signature to `(name, version, chain_id, verifying facet)`, a struct hash
//! binds it to one payload shape and its field values, and the final digest
//! is BLAKE3 over both under an ASCII prefix. A signature therefore cannot be
//! replayed against a different facet deployment, a different chain, or a
//! different payload kind — and [`FacetGovernor`] adds nonce and deadline
//! checks so it cannot be replayed in time either.

use blake3::Hasher;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use prism_types::{Addr, Hash32};

/// Signature-layer failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigError {
    /// Signature does not verify under the expected key and digest.
    #[error("[SIG_INVALID] signature does not match payload digest")]
    Invalid,
    /// Payload deadline has passed.
    #[error("[SIG_EXPIRED] deadline {deadline} < now {now}")]
    Expired {
        /// Signed deadline (unix seconds).
        deadline: u64,
        /// Verifier's current time.
        now: u64,
    },
    /// Payload nonce does not match the governor's expected nonce.
    #[error("[SIG_BAD_NONCE] expected nonce {expected}, got {got}")]
    BadNonce {
        /// Next acceptable nonce.
        expected: u64,
        /// Nonce carried by the payload.
        got: u64,
    },
    /// Governor was already initialized.
    #[error("[ALREADY_INITIALIZED] facet governor is already initialized")]
    AlreadyInitialized,
    /// Operation requires a completed initialization.
    #[error("[NOT_INITIALIZED] facet governor has not been initialized")]
    NotInitialized,
}

/// Signing domain binding a payload to one facet instance on one chain.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SigDomain {
    /// Human-readable scheme name (e.g. `"prism.facet"`).
    pub name: String,
    /// Scheme version string.
    pub version: String,
    /// Network identifier.
    pub chain_id: u64,
    /// The facet instance the signature is valid for.
    pub verifying_facet: Addr,
}

impl SigDomain {
    /// Domain hash: BLAKE3 over the length-prefixed domain fields.
    pub fn domain_hash(&self) -> Hash32 {
        let mut hasher = Hasher::new();
        hasher.update(b"prism-sig-domain:");
        hasher.update(&(self.name.len() as u64).to_le_bytes());
        hasher.update(self.name.as_bytes());
        hasher.update(&(self.version.len() as u64).to_le_bytes());
        hasher.update(self.version.as_bytes());
        hasher.update(&self.chain_id.to_le_bytes());
        hasher.update(self.verifying_facet.as_bytes());
        hasher.finalize().into()
    }
}

/// The payload shapes a facet governor accepts.
///
/// Each variant carries `deadline` (unix seconds, inclusive) and `nonce`
/// (exact-match against the governor, then bumped).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TypedPayload {
    /// One-time delegated initialization of operator and governance.
    InitFacet {
        /// Operator address to seat.
        operator: Addr,
        /// Governance address to seat.
        governance: Addr,
        /// Latest acceptable verification time.
        deadline: u64,
        /// Governor nonce this payload consumes.
        nonce: u64,
    },
    /// Rotate the governance key.
    RotateGovernance {
        /// Address of the incoming governance key.
        new_governance: Addr,
        /// Latest acceptable verification time.
        deadline: u64,
        /// Governor nonce this payload consumes.
        nonce: u64,
    },
    /// Rotate the operator address.
    RotateOperator {
        /// Incoming operator.
        new_operator: Addr,
        /// Latest acceptable verification time.
        deadline: u64,
        /// Governor nonce this payload consumes.
        nonce: u64,
    },
}

impl TypedPayload {
    /// Struct hash: a per-variant ASCII tag followed by the field values.
    pub fn struct_hash(&self) -> Hash32 {
        let mut hasher = Hasher::new();
        match self {
            Self::InitFacet {
                operator,
                governance,
                deadline,
                nonce,
            } => {
                hasher.update(b"InitFacet(operator,governance,deadline,nonce)");
                hasher.update(operator.as_bytes());
                hasher.update(governance.as_bytes());
                hasher.update(&deadline.to_le_bytes());
                hasher.update(&nonce.to_le_bytes());
            }
            Self::RotateGovernance {
                new_governance,
                deadline,
                nonce,
            } => {
                hasher.update(b"RotateGovernance(newGovernance,deadline,nonce)");
                hasher.update(new_governance.as_bytes());
                hasher.update(&deadline.to_le_bytes());
                hasher.update(&nonce.to_le_bytes());
            }
            Self::RotateOperator {
                new_operator,
                deadline,
                nonce,
            } => {
                hasher.update(b"RotateOperator(newOperator,deadline,nonce)");
                hasher.update(new_operator.as_bytes());
                hasher.update(&deadline.to_le_bytes());
                hasher.update(&nonce.to_le_bytes());
            }
        }
        hasher.finalize().into()
    }

    /// Signed deadline (unix seconds, inclusive).
    pub fn deadline(&self) -> u64 {
        match self {
            Self::InitFacet { deadline, .. }
            | Self::RotateGovernance { deadline, .. }
            | Self::RotateOperator { deadline, .. } => *deadline,
        }
    }

    /// Nonce consumed by this payload.
    pub fn nonce(&self) -> u64 {
        match self {
            Self::InitFacet { nonce, .. }
            | Self::RotateGovernance { nonce, .. }
            | Self::RotateOperator { nonce, .. } => *nonce,
        }
    }
}

fn signing_digest(domain: &SigDomain, payload: &TypedPayload) -> Hash32 {
    let mut hasher = Hasher::new();
    hasher.update(b"prism-sig:");
    hasher.update(&domain.domain_hash());
    hasher.update(&payload.struct_hash());
    hasher.finalize().into()
}

/// Derive the 20-byte address of a verifying key (prefix `b"key-addr:"`).
pub fn addr_of_key(key: &VerifyingKey) -> Addr {
    let mut hasher = Hasher::new();
    hasher.update(b"key-addr:");
    hasher.update(key.as_bytes());
    let digest: Hash32 = hasher.finalize().into();
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[..20]);
    Addr(out)
}

/// Sign `payload` under `domain`.
pub fn sign_payload(signer: &SigningKey, domain: &SigDomain, payload: &TypedPayload) -> Signature {
    signer.sign(&signing_digest(domain, payload))
}

/// Verify `signature` over `payload` under `domain`.
///
/// Signature validity only — deadline and nonce discipline belong to
/// [`FacetGovernor`].
///
/// # Errors
///
/// [`SigError::Invalid`] if the signature does not verify.
pub fn verify_payload(
    key: &VerifyingKey,
    domain: &SigDomain,
    payload: &TypedPayload,
    signature: &Signature,
) -> Result<(), SigError> {
    key.verify(&signing_digest(domain, payload), signature)
        .map_err(|_| SigError::Invalid)
}

/// Per-facet verifier state for delegated initialization and rotation.
///
/// Holds the current governance key, operator, and a strictly increasing
/// nonce. Every accepted payload bumps the nonce, so a captured signature is
/// single-use even within its deadline window.
pub struct FacetGovernor {
    domain: SigDomain,
    governance_key: VerifyingKey,
    operator: Option<Addr>,
    governance: Option<Addr>,
    nonce: u64,
    initialized: bool,
}

impl FacetGovernor {
    /// New, uninitialized governor trusting `governance_key`.
    pub fn new(domain: SigDomain, governance_key: VerifyingKey) -> Self {
        Self {
            domain,
            governance_key,
            operator: None,
            governance: None,
            nonce: 0,
            initialized: false,
        }
    }

    /// Signing domain of this governor.
    pub fn domain(&self) -> &SigDomain {
        &self.domain
    }

    /// Next acceptable nonce.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Seated operator, if initialized.
    pub fn operator(&self) -> Option<Addr> {
        self.operator
    }

    /// Seated governance address, if initialized.
    pub fn governance(&self) -> Option<Addr> {
        self.governance
    }

    /// Returns `true` once delegated initialization has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn check_common(&self, payload: &TypedPayload, signature: &Signature, now: u64) -> Result<(), SigError> {
        verify_payload(&self.governance_key, &self.domain, payload, signature)?;
        let deadline = payload.deadline();
        if deadline < now {
            return Err(SigError::Expired { deadline, now });
        }
        let got = payload.nonce();
        if got != self.nonce {
            return Err(SigError::BadNonce {
                expected: self.nonce,
                got,
            });
        }
        Ok(())
    }

    /// Apply a signed [`TypedPayload::InitFacet`]. One-shot.
    ///
    /// # Errors
    ///
    /// [`SigError::AlreadyInitialized`], or any of the common signature,
    /// deadline, and nonce failures.
    pub fn apply_init(
        &mut self,
        operator: Addr,
        governance: Addr,
        deadline: u64,
        nonce: u64,
        signature: &Signature,
        now: u64,
    ) -> Result<(), SigError> {
        if self.initialized {
            return Err(SigError::AlreadyInitialized);
        }
        let payload = TypedPayload::InitFacet {
            operator,
            governance,
            deadline,
            nonce,
        };
        self.check_common(&payload, signature, now)?;
        self.operator = Some(operator);
        self.governance = Some(governance);
        self.nonce += 1;
        self.initialized = true;
        Ok(())
    }

    /// Apply a signed [`TypedPayload::RotateGovernance`], seating `new_key`.
    ///
    /// # Errors
    ///
    /// [`SigError::NotInitialized`], or the common failures.
    pub fn rotate_governance(
        &mut self,
        new_key: &VerifyingKey,
        deadline: u64,
        nonce: u64,
        signature: &Signature,
        now: u64,
    ) -> Result<(), SigError> {
        if !self.initialized {
            return Err(SigError::NotInitialized);
        }
        let new_governance = addr_of_key(new_key);
        let payload = TypedPayload::RotateGovernance {
            new_governance,
            deadline,
            nonce,
        };
        self.check_common(&payload, signature, now)?;
        self.governance_key = *new_key;
        self.governance = Some(new_governance);
        self.nonce += 1;
        Ok(())
    }

    /// Apply a signed [`TypedPayload::RotateOperator`].
    ///
    /// # Errors
    ///
    /// [`SigError::NotInitialized`], or the common failures.
    pub fn rotate_operator(
        &mut self,
        new_operator: Addr,
        deadline: u64,
        nonce: u64,
        signature: &Signature,
        now: u64,
    ) -> Result<(), SigError> {
        if !self.initialized {
            return Err(SigError::NotInitialized);
        }
        let payload = TypedPayload::RotateOperator {
            new_operator,
            deadline,
            nonce,
        };
        self.check_common(&payload, signature, now)?;
        self.operator = Some(new_operator);
        self.nonce += 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn domain(facet: &str, chain_id: u64) -> SigDomain {
        SigDomain {
            name: "prism.facet".to_string(),
            version: "1".to_string(),
            chain_id,
            verifying_facet: prism_types::make_addr(facet),
        }
    }

    fn keypair() -> SigningKey {
        SigningKey::generate(&mut OsRng)
    }

    // ── 1. init happy path ──────────────────────────────────────────────

    #[test]
    fn delegated_init_happy_path() {
        let gov = keypair();
        let dom = domain("facet-a", 1);
        let operator = prism_types::make_addr("operator");
        let governance = addr_of_key(&gov.verifying_key());
        let payload = TypedPayload::InitFacet {
            operator,
            governance,
            deadline: 1_000,
            nonce: 0,
        };
        let sig = sign_payload(&gov, &dom, &payload);

        let mut governor = FacetGovernor::new(dom, gov.verifying_key());
        governor
            .apply_init(operator, governance, 1_000, 0, &sig, 500)
            .unwrap();
        assert!(governor.is_initialized());
        assert_eq!(governor.operator(), Some(operator));
        assert_eq!(governor.nonce(), 1);
    }

    // ── 2. replay against another facet or chain fails ──────────────────

    #[test]
    fn replay_across_domains_fails() {
        let gov = keypair();
        let dom_a = domain("facet-a", 1);
        let operator = prism_types::make_addr("operator");
        let governance = addr_of_key(&gov.verifying_key());
        let payload = TypedPayload::InitFacet {
            operator,
            governance,
            deadline: 1_000,
            nonce: 0,
        };
        let sig = sign_payload(&gov, &dom_a, &payload);

        // Same payload, different facet.
        let mut other_facet = FacetGovernor::new(domain("facet-b", 1), gov.verifying_key());
        assert_eq!(
            other_facet.apply_init(operator, governance, 1_000, 0, &sig, 500),
            Err(SigError::Invalid)
        );
        // Same payload, different chain.
        let mut other_chain = FacetGovernor::new(domain("facet-a", 7), gov.verifying_key());
        assert_eq!(
            other_chain.apply_init(operator, governance, 1_000, 0, &sig, 500),
            Err(SigError::Invalid)
        );
    }

    // ── 3. nonce bump makes a signature single-use ──────────────────────

    #[test]
    fn nonce_bump_prevents_replay() {
        let gov = keypair();
        let dom = domain("facet-a", 1);
        let new_operator = prism_types::make_addr("op-2");
        let governance = addr_of_key(&gov.verifying_key());
        let operator = prism_types::make_addr("op-1");

        let mut governor = FacetGovernor::new(dom.clone(), gov.verifying_key());
        let init = TypedPayload::InitFacet {
            operator,
            governance,
            deadline: 1_000,
            nonce: 0,
        };
        let sig = sign_payload(&gov, &dom, &init);
        governor
            .apply_init(operator, governance, 1_000, 0, &sig, 10)
            .unwrap();

        let rotate = TypedPayload::RotateOperator {
            new_operator,
            deadline: 1_000,
            nonce: 1,
        };
        let sig = sign_payload(&gov, &dom, &rotate);
        governor
            .rotate_operator(new_operator, 1_000, 1, &sig, 10)
            .unwrap();
        // Replaying the same rotation: nonce is now 2.
        assert_eq!(
            governor.rotate_operator(new_operator, 1_000, 1, &sig, 10),
            Err(SigError::BadNonce {
                expected: 2,
                got: 1
            })
        );
    }

    // ── 4. expired deadline rejected (boundary-inclusive accept) ────────

    #[test]
    fn deadline_boundary() {
        let gov = keypair();
        let dom = domain("facet-a", 1);
        let operator = prism_types::make_addr("operator");
        let governance = addr_of_key(&gov.verifying_key());
        let payload = TypedPayload::InitFacet {
            operator,
            governance,
            deadline: 100,
            nonce: 0,
        };
        let sig = sign_payload(&gov, &dom, &payload);

        let mut at_deadline = FacetGovernor::new(dom.clone(), gov.verifying_key());
        at_deadline
            .apply_init(operator, governance, 100, 0, &sig, 100)
            .unwrap();

        let mut after = FacetGovernor::new(dom, gov.verifying_key());
        assert_eq!(
            after.apply_init(operator, governance, 100, 0, &sig, 101),
            Err(SigError::Expired {
                deadline: 100,
                now: 101
            })
        );
    }

    // ── 5. governance rotation hands verification to the new key ────────

    #[test]
    fn governance_rotation_swaps_key() {
        let old_gov = keypair();
        let new_gov = keypair();
        let dom = domain("facet-a", 1);
        let operator = prism_types::make_addr("operator");
        let governance = addr_of_key(&old_gov.verifying_key());

        let mut governor = FacetGovernor::new(dom.clone(), old_gov.verifying_key());
        let init = TypedPayload::InitFacet {
            operator,
            governance,
            deadline: 1_000,
            nonce: 0,
        };
        let sig = sign_payload(&old_gov, &dom, &init);
        governor
            .apply_init(operator, governance, 1_000, 0, &sig, 10)
            .unwrap();

        let rotate = TypedPayload::RotateGovernance {
            new_governance: addr_of_key(&new_gov.verifying_key()),
            deadline: 1_000,
            nonce: 1,
        };
        let sig = sign_payload(&old_gov, &dom, &rotate);
        governor
            .rotate_governance(&new_gov.verifying_key(), 1_000, 1, &sig, 10)
            .unwrap();

        // Old key can no longer authorize; new key can.
        let next = TypedPayload::RotateOperator {
            new_operator: operator,
            deadline: 1_000,
            nonce: 2,
        };
        let stale_sig = sign_payload(&old_gov, &dom, &next);
        assert_eq!(
            governor.rotate_operator(operator, 1_000, 2, &stale_sig, 10),
            Err(SigError::Invalid)
        );
        let fresh_sig = sign_payload(&new_gov, &dom, &next);
        governor
            .rotate_operator(operator, 1_000, 2, &fresh_sig, 10)
            .unwrap();
    }

    // ── 6. double init rejected ─────────────────────────────────────────

    #[test]
    fn double_init_rejected() {
        let gov = keypair();
        let dom = domain("facet-a", 1);
        let operator = prism_types::make_addr("operator");
        let governance = addr_of_key(&gov.verifying_key());
        let payload = TypedPayload::InitFacet {
            operator,
            governance,
            deadline: 1_000,
            nonce: 0,
        };
        let sig = sign_payload(&gov, &dom, &payload);
        let mut governor = FacetGovernor::new(dom, gov.verifying_key());
        governor
            .apply_init(operator, governance, 1_000, 0, &sig, 10)
            .unwrap();
        assert_eq!(
            governor.apply_init(operator, governance, 1_000, 0, &sig, 10),
            Err(SigError::AlreadyInitialized)
        );
    }
}
