use crate::{
    hash::FlowKey,
    table::{DestinationEntry, TableReader},
};
use std::sync::Arc;
use udp_lb_common::FALLBACK_SLOT;

/// The backend chosen for a flow.
#[derive(Debug)]
pub struct Selection {
    /// Slot the entry was found at
    pub slot: u32,
    /// The flow's own slot was empty and the fallback slot was used
    pub fallback: bool,
    pub entry: Arc<DestinationEntry>,
}

/// Resolves the flow to its hashed slot or, if that one is not
/// provisioned, to the fallback slot. `None` if both are empty.
#[inline(always)]
pub fn select_destination(table: &TableReader, flow: &FlowKey) -> Option<Selection> {
    let slot = flow.slot();

    if let Some(entry) = table.lookup(slot) {
        return Some(Selection {
            slot,
            fallback: false,
            entry,
        });
    }

    table.lookup(FALLBACK_SLOT).map(|entry| Selection {
        slot: FALLBACK_SLOT,
        fallback: slot != FALLBACK_SLOT,
        entry,
    })
}
