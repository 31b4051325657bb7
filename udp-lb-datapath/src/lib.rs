//! Datapath of the UDP load balancer.
//!
//! A frame goes through [`Dispatcher::process`] which validates its
//! Ethernet/IPv4/UDP headers, hashes the flow to a slot of the
//! [`DestinationTable`], rewrites the addresses toward the selected backend,
//! recomputes the checksums and accounts the frame on the backend.

pub mod csum;
pub mod dispatch;
pub mod hash;
pub mod packet;
pub mod rewrite;
pub mod select;
pub mod stats;
pub mod table;

#[cfg(test)]
mod testutil;

pub use dispatch::Dispatcher;
pub use hash::FlowKey;
pub use table::{Destination, DestinationEntry, DestinationTable, TableControl, TableReader};
pub use udp_lb_common::Action;
