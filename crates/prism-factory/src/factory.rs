// SPDX-License-Identifier: Apache-2.0
//! The factory state machine: fee-gated staging, deployment records, and
//! construction-time self-verification.

use std::collections::BTreeMap;

use prism_auth::{AccessControl, AuthError, Role};
use prism_types::{
    code_hash, Addr, CodeHash, CodeStore, CodeStoreError, ManifestAnchor, ManifestRoot,
};
use tracing::{debug, info};

use crate::addressing::{salt_of, staged_addr};

/// Fee policy for staging.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct FeeConfig {
    /// Address credited with collected fees.
    pub recipient: Addr,
    /// Flat fee per staged deployment, in wei.
    pub base_fee_wei: u128,
    /// Whether the fee is currently charged.
    pub enabled: bool,
}

impl FeeConfig {
    fn due(&self) -> u128 {
        if self.enabled {
            self.base_fee_wei
        } else {
            0
        }
    }
}

/// One content deployment, recorded once per unique content.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DeploymentRecord {
    /// Content hash of the staged payload.
    pub content_hash: CodeHash,
    /// Address the content was staged at.
    pub addr: Addr,
    /// Caller that paid for the deployment.
    pub deployer: Addr,
    /// Fee collected at staging time.
    pub fee_paid: u128,
}

/// Factory failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    /// Authorization failure (checked before anything else).
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// The factory's live code hash does not match the pinned expectation.
    #[error("[INTEGRITY_CODEHASH] expected {expected}, live {live:?}")]
    IntegrityCodeHash {
        /// Hash pinned at construction.
        expected: CodeHash,
        /// Live hash at the factory's own address, if any code is deployed.
        live: Option<CodeHash>,
    },
    /// The paired dispatcher's active root does not match the pinned hash.
    #[error("[INTEGRITY_MANIFEST] expected {expected}, active {active}")]
    IntegrityManifest {
        /// Root pinned at construction.
        expected: ManifestRoot,
        /// Dispatcher's actual active root.
        active: ManifestRoot,
    },
    /// Fee must match exactly; both under- and overpayment are refused.
    #[error("[FEE_MISMATCH] expected {expected} wei, got {paid}")]
    FeeMismatch {
        /// Fee due for this call.
        expected: u128,
        /// Fee actually attached.
        paid: u128,
    },
    /// Derived address is occupied by different code.
    #[error(transparent)]
    Store(#[from] CodeStoreError),
}

/// The deterministic staging factory.
///
/// All privileged paths run the integrity check first; see the crate docs
/// for the rationale.
pub struct Factory {
    addr: Addr,
    expected_manifest_hash: ManifestRoot,
    expected_factory_code_hash: CodeHash,
    fees: FeeConfig,
    access: AccessControl,
    deployments: BTreeMap<CodeHash, DeploymentRecord>,
    fees_collected: BTreeMap<Addr, u128>,
}

impl Factory {
    /// Construct a factory at `addr`, pinning the expected hashes.
    ///
    /// `admin` is seated with all roles; the pinned hashes are immutable for
    /// the factory's lifetime — wrong values brick every privileged path,
    /// which is the point.
    pub fn new(
        addr: Addr,
        admin: Addr,
        expected_manifest_hash: ManifestRoot,
        expected_factory_code_hash: CodeHash,
        fees: FeeConfig,
    ) -> Self {
        Self {
            addr,
            expected_manifest_hash,
            expected_factory_code_hash,
            fees,
            access: AccessControl::with_root(admin),
            deployments: BTreeMap::new(),
            fees_collected: BTreeMap::new(),
        }
    }

    /// The factory's own address.
    pub fn addr(&self) -> Addr {
        self.addr
    }

    /// Manifest root pinned at construction.
    pub fn expected_manifest_hash(&self) -> ManifestRoot {
        self.expected_manifest_hash
    }

    /// Factory code hash pinned at construction.
    pub fn expected_factory_code_hash(&self) -> CodeHash {
        self.expected_factory_code_hash
    }

    /// Current fee policy.
    pub fn fee_config(&self) -> FeeConfig {
        self.fees
    }

    /// Deployment record for `content_hash`, if staged.
    pub fn deployment(&self, content_hash: &CodeHash) -> Option<&DeploymentRecord> {
        self.deployments.get(content_hash)
    }

    /// Total fees credited to `recipient`.
    pub fn fees_collected(&self, recipient: Addr) -> u128 {
        self.fees_collected.get(&recipient).copied().unwrap_or(0)
    }

    /// Check the pinned hashes against live state. Callable by anyone;
    /// side-effect-free.
    ///
    /// # Errors
    ///
    /// [`FactoryError::IntegrityCodeHash`] if the factory's own code is
    /// missing or drifted, [`FactoryError::IntegrityManifest`] if the paired
    /// dispatcher's active root is not the pinned one.
    pub fn verify_system_integrity(
        &self,
        store: &dyn CodeStore,
        anchor: &dyn ManifestAnchor,
    ) -> Result<(), FactoryError> {
        let live = store.code_hash_at(self.addr);
        if live != Some(self.expected_factory_code_hash) {
            return Err(FactoryError::IntegrityCodeHash {
                expected: self.expected_factory_code_hash,
                live,
            });
        }
        let active = anchor.active_root();
        if active != self.expected_manifest_hash {
            return Err(FactoryError::IntegrityManifest {
                expected: self.expected_manifest_hash,
                active,
            });
        }
        Ok(())
    }

    /// Stage `payload` at its content-derived address.
    ///
    /// Permissionless behind the integrity gate and the exact-fee check.
    /// Fee is checked before any deployment attempt; a failed stage leaves
    /// no partial state. Re-staging byte-identical content is an idempotent
    /// confirm and charges nothing (`fee_paid` must be 0).
    ///
    /// # Errors
    ///
    /// Integrity, fee, and collision failures per [`FactoryError`].
    pub fn stage(
        &mut self,
        caller: Addr,
        store: &mut dyn CodeStore,
        anchor: &dyn ManifestAnchor,
        payload: &[u8],
        fee_paid: u128,
    ) -> Result<(Addr, CodeHash), FactoryError> {
        self.verify_system_integrity(store, anchor)?;

        let content_hash = code_hash(payload);
        let salt = salt_of(&content_hash);
        let addr = staged_addr(self.addr, &salt, &content_hash);

        // A confirm requires the staged content to actually be live at the
        // derived address; an address that drifted (cleared and redeployed
        // with different bytes) falls through to the deploy path, where the
        // store surfaces the collision.
        if self.deployments.contains_key(&content_hash)
            && store.code_hash_at(addr) == Some(content_hash)
        {
            // Idempotent confirm: nothing deployed, nothing charged.
            if fee_paid != 0 {
                return Err(FactoryError::FeeMismatch {
                    expected: 0,
                    paid: fee_paid,
                });
            }
            debug!(content = %content_hash, %addr, "stage confirm, already deployed");
            return Ok((addr, content_hash));
        }

        let due = self.fees.due();
        if fee_paid != due {
            return Err(FactoryError::FeeMismatch {
                expected: due,
                paid: fee_paid,
            });
        }

        store.deploy_at(addr, payload)?;

        self.deployments.insert(
            content_hash,
            DeploymentRecord {
                content_hash,
                addr,
                deployer: caller,
                fee_paid,
            },
        );
        if due > 0 {
            *self.fees_collected.entry(self.fees.recipient).or_insert(0) += due;
        }
        info!(content = %content_hash, %addr, %caller, fee = due, "staged content");
        Ok((addr, content_hash))
    }

    fn require_admin_and_integrity(
        &self,
        caller: Addr,
        store: &dyn CodeStore,
        anchor: &dyn ManifestAnchor,
    ) -> Result<(), FactoryError> {
        self.access.require(caller, Role::Admin)?;
        self.verify_system_integrity(store, anchor)
    }

    /// Redirect collected fees. Admin-only, integrity-gated.
    pub fn set_fee_recipient(
        &mut self,
        caller: Addr,
        store: &dyn CodeStore,
        anchor: &dyn ManifestAnchor,
        recipient: Addr,
    ) -> Result<(), FactoryError> {
        self.require_admin_and_integrity(caller, store, anchor)?;
        self.fees.recipient = recipient;
        info!(%recipient, "fee recipient updated");
        Ok(())
    }

    /// Change the flat staging fee. Admin-only, integrity-gated.
    pub fn set_base_fee(
        &mut self,
        caller: Addr,
        store: &dyn CodeStore,
        anchor: &dyn ManifestAnchor,
        base_fee_wei: u128,
    ) -> Result<(), FactoryError> {
        self.require_admin_and_integrity(caller, store, anchor)?;
        self.fees.base_fee_wei = base_fee_wei;
        info!(fee = base_fee_wei, "base fee updated");
        Ok(())
    }

    /// Toggle fee collection. Admin-only, integrity-gated.
    pub fn set_fees_enabled(
        &mut self,
        caller: Addr,
        store: &dyn CodeStore,
        anchor: &dyn ManifestAnchor,
        enabled: bool,
    ) -> Result<(), FactoryError> {
        self.require_admin_and_integrity(caller, store, anchor)?;
        self.fees.enabled = enabled;
        info!(enabled, "fee collection toggled");
        Ok(())
    }
}
