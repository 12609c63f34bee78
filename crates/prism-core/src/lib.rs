// SPDX-License-Identifier: Apache-2.0
//! Prism dispatcher: manifest state machine and codehash-pinned routing.
//!
//! The [`Dispatcher`] is the single mutable entry point of a Prism
//! deployment. It routes selectors to facets strictly from routes proven
//! against a Merkle-committed manifest, on a commit → apply → activate
//! lifecycle with a mandatory observation delay, and re-validates each
//! facet's code hash on **every** call. There is no ambient identity: every
//! mutating operation takes the caller explicitly and authorization is the
//! first check performed.
//!
//! Lifecycle rules worth knowing up front:
//!
//! * Epochs strictly increase; committing a new pending root silently
//!   replaces the old one (last-committed-wins) and invalidates its proofs.
//! * `apply_routes` is atomic per call: all proofs verify or nothing writes.
//! * Pause is a reversible circuit breaker that stops dispatch and manifest
//!   mutation; freeze is a one-way end to manifest mutation that leaves
//!   dispatch of already-applied routes running.
//! * Role surgery stays available while paused and after freeze.

mod dispatcher;
mod error;
mod events;
mod loupe;
mod preflight;
mod registry;
mod state;

pub use dispatcher::{Dispatcher, RouteEntry, RouteProof};
pub use error::DispatcherError;
pub use events::DispatcherEvent;
pub use loupe::FacetInfo;
pub use preflight::{preflight, PreflightIssue, PreflightReport};
pub use registry::{AppStorage, CallContext, FacetError, FacetHandler, FacetRegistry, RegistryError};
pub use state::{DispatcherConfig, ManifestState, PendingRoot};
