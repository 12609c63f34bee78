// SPDX-License-Identifier: Apache-2.0
//! Deterministic content-addressed staging factory.
//!
//! The factory stages arbitrary byte payloads (typically facet code) at
//! addresses derived purely from `(factory address, salt, content hash)`,
//! with the salt itself derived from the content — so byte-identical content
//! resolves to the same address on any chain sharing the factory's address
//! and code. Staging is permissionless behind an exact-fee check; re-staging
//! identical content is an idempotent cheap confirm.
//!
//! Construction pins two expected hashes: the factory's own code hash and
//! the paired dispatcher's active manifest root. [`Factory::verify_system_integrity`]
//! checks both on demand, and every privileged operation runs the same check
//! first, so a deployment script that forgot to inject the real hashes fails
//! closed on first use instead of running unverified.

mod addressing;
mod factory;

pub use addressing::{salt_of, staged_addr};
pub use factory::{DeploymentRecord, Factory, FactoryError, FeeConfig};
