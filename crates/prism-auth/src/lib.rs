// SPDX-License-Identifier: Apache-2.0
//! Role-based access control and typed-data delegated signatures.
//!
//! Two layers live here. [`AccessControl`] is the shared role primitive the
//! dispatcher and factory gate every mutating operation on: four capabilities
//! ([`Role::Admin`], [`Role::Commit`], [`Role::Apply`], [`Role::Emergency`])
//! held per address, mutated only through explicit-caller `grant`/`revoke`.
//! There is no ambient identity anywhere — every check takes the caller as an
//! argument, which keeps the state machines testable without a simulated
//! execution environment.
//!
//! The second layer is the typed-data signature scheme for delegated facet
//! initialization and key rotation: Ed25519 signatures over domain-separated
//! BLAKE3 digests that bind `(chain_id, verifying facet)` so a signed
//! authorization cannot be replayed against another facet deployment or
//! network.

mod roles;
mod typed_sig;

pub use roles::{AccessControl, AuthError, Role, RoleEvent, RoleSet};
pub use typed_sig::{
    addr_of_key, sign_payload, verify_payload, FacetGovernor, SigDomain, SigError, TypedPayload,
};
