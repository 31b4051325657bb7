//! The destination table shared by the datapath and the control plane.
//!
//! Every slot is an independent [`ArcSwapOption`] cell, so lookups never
//! take a lock and the control plane can swap a single backend while
//! packets are in flight. The datapath only holds a [`TableReader`]; the
//! [`TableControl`] handle is the single writer.

use arc_swap::ArcSwapOption;
use core::fmt;
use std::{
    net::Ipv4Addr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use udp_lb_common::{ETH_ALEN, FALLBACK_SLOT, MAX_SERVERS};

/// Where and how to forward the packets of one backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Destination {
    /// Source address stamped into redirected packets
    pub saddr: Ipv4Addr,
    /// Backend address
    pub daddr: Ipv4Addr,
    /// Backend MAC
    pub dmac: [u8; ETH_ALEN],
    /// Egress interface index
    pub ifindex: u32,
}

/// A provisioned slot: the backend and its forwarding counters.
#[derive(Debug)]
pub struct DestinationEntry {
    pub dest: Destination,
    pkts: AtomicU64,
    bytes: AtomicU64,
}

impl DestinationEntry {
    pub fn new(dest: Destination) -> Self {
        Self {
            dest,
            pkts: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    pub fn packets(&self) -> u64 {
        self.pkts.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Counts one forwarded frame of `len` bytes.
    #[inline(always)]
    pub(crate) fn account(&self, len: u64) {
        self.pkts.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len, Ordering::Relaxed);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableError {
    SlotOutOfRange(u32),
    NoBackends,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SlotOutOfRange(slot) => {
                write!(f, "slot {} out of range, max {}", slot, MAX_SERVERS - 1)
            }
            Self::NoBackends => write!(f, "backend list can't be empty"),
        }
    }
}

impl std::error::Error for TableError {}

/// Counters of one slot at the time of the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotStats {
    pub slot: u32,
    pub dest: Destination,
    pub packets: u64,
    pub bytes: u64,
}

pub struct DestinationTable {
    slots: Box<[ArcSwapOption<DestinationEntry>]>,
}

impl DestinationTable {
    /// Creates an empty table with [`MAX_SERVERS`] slots and returns the
    /// control plane handle along with a datapath handle.
    pub fn create() -> (TableControl, TableReader) {
        let slots = (0..MAX_SERVERS)
            .map(|_| ArcSwapOption::empty())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let table = Arc::new(Self { slots });
        (
            TableControl {
                table: table.clone(),
            },
            TableReader { table },
        )
    }

    #[inline(always)]
    fn cell(&self, slot: u32) -> Result<&ArcSwapOption<DestinationEntry>, TableError> {
        self.slots
            .get(slot as usize)
            .ok_or(TableError::SlotOutOfRange(slot))
    }
}

/// Lookup handle used by the datapath.
#[derive(Clone)]
pub struct TableReader {
    table: Arc<DestinationTable>,
}

impl TableReader {
    /// Entry at `slot`, `None` if unprovisioned or out of range.
    #[inline(always)]
    pub fn lookup(&self, slot: u32) -> Option<Arc<DestinationEntry>> {
        self.table.cell(slot).ok()?.load_full()
    }
}

/// Write handle owned by the control plane.
pub struct TableControl {
    table: Arc<DestinationTable>,
}

impl TableControl {
    /// Installs a fresh entry, with zeroed counters, at `slot` and returns
    /// the replaced one.
    pub fn insert(
        &self,
        slot: u32,
        dest: Destination,
    ) -> Result<Option<Arc<DestinationEntry>>, TableError> {
        let cell = self.table.cell(slot)?;
        Ok(cell.swap(Some(Arc::new(DestinationEntry::new(dest)))))
    }

    pub fn remove(&self, slot: u32) -> Result<Option<Arc<DestinationEntry>>, TableError> {
        Ok(self.table.cell(slot)?.swap(None))
    }

    pub fn get(&self, slot: u32) -> Result<Option<Arc<DestinationEntry>>, TableError> {
        Ok(self.table.cell(slot)?.load_full())
    }

    /// Spreads the backends over every slot, slot `i` gets backend
    /// `i % backends.len()`. A `None` backend leaves its slots
    /// unprovisioned. Returns the count of provisioned slots.
    pub fn provision_round_robin(&self, backends: &[Option<Destination>]) -> Result<u32, TableError> {
        if backends.is_empty() {
            return Err(TableError::NoBackends);
        }

        let mut count = 0;
        for slot in 0..MAX_SERVERS {
            match backends[slot as usize % backends.len()] {
                Some(dest) => {
                    self.insert(slot, dest)?;
                    count += 1;
                }
                None => {
                    self.remove(slot)?;
                }
            }
        }

        if self.get(FALLBACK_SLOT)?.is_none() {
            log::warn!("[table] fallback slot {} is not provisioned", FALLBACK_SLOT);
        }

        Ok(count)
    }

    /// Counters of all provisioned slots, ordered by slot.
    pub fn snapshot(&self) -> Vec<SlotStats> {
        self.table
            .slots
            .iter()
            .enumerate()
            .filter_map(|(slot, cell)| {
                let entry = cell.load_full()?;
                Some(SlotStats {
                    slot: slot as u32,
                    dest: entry.dest,
                    packets: entry.packets(),
                    bytes: entry.bytes(),
                })
            })
            .collect()
    }

    pub fn provisioned(&self) -> usize {
        self.table
            .slots
            .iter()
            .filter(|cell| cell.load().is_some())
            .count()
    }

    pub fn reader(&self) -> TableReader {
        TableReader {
            table: self.table.clone(),
        }
    }

    /// Empties every slot. Readers still alive observe an empty table and
    /// the datapath drops everything it would have redirected.
    pub fn teardown(self) {
        for cell in self.table.slots.iter() {
            cell.store(None);
        }
        log::info!("[table] teardown complete");
    }
}
