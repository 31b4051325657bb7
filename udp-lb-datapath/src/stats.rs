use crate::table::DestinationEntry;
use std::sync::atomic::{AtomicU64, Ordering};
use udp_lb_common::stats;

pub static STATS_NAMES: [&str; stats::MAX as usize] = [
    "packets",
    "pass",
    "drop",
    "redirect",
    "drop_format_errors",
    "drop_no_destination",
    "fallback_hits",
];

/// Dispatcher outcome counters, indexed by the `udp_lb_common::stats`
/// constants.
#[derive(Debug, Default)]
pub struct Counters {
    values: [AtomicU64; stats::MAX as usize],
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn inc(&self, stat_idx: u32) {
        if let Some(ctr) = self.values.get(stat_idx as usize) {
            ctr.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get(&self, stat_idx: u32) -> u64 {
        self.values
            .get(stat_idx as usize)
            .map_or(0, |ctr| ctr.load(Ordering::Relaxed))
    }

    pub fn as_str(stat_idx: u32) -> &'static str {
        STATS_NAMES.get(stat_idx as usize).copied().unwrap_or("unknown")
    }

    /// (name, value) pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        (0..stats::MAX).map(|idx| (Self::as_str(idx), self.get(idx)))
    }
}

/// Accounts a redirected frame on its destination.
#[inline(always)]
pub fn account_redirect(entry: &DestinationEntry, frame_len: usize) {
    entry.account(frame_len as u64);
}
