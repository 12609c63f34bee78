// SPDX-License-Identifier: Apache-2.0
//! Diamond-loupe-style read views over the route table.
//!
//! Routes here are manifest-driven rather than individually cut, but
//! external tooling expects the facet-enumeration shape, so the dispatcher
//! provides it. All views are pure reads and stay available while paused.

use prism_types::{Addr, Selector};

/// One facet and the selectors currently routed to it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FacetInfo {
    /// Facet address.
    pub facet: Addr,
    /// Selectors routed to this facet, in selector order.
    pub selectors: Vec<Selector>,
}
