use crate::{
    helpers::{mac_to_str, IfCache},
    info::InfoTable,
};
use chrono::Local;
use std::net::Ipv4Addr;
use udp_lb_datapath::{stats::Counters, table::SlotStats};

/// Forwarding counters of one backend summed over all its slots.
#[derive(Debug, PartialEq, Eq)]
pub struct BackendStats {
    pub daddr: Ipv4Addr,
    pub dmac: [u8; 6],
    pub ifindex: u32,
    pub slots: usize,
    pub packets: u64,
    pub bytes: u64,
}

/// Aggregates the slot counters by backend address, in order of first
/// appearance in the table.
pub fn aggregate(slots: &[SlotStats]) -> Vec<BackendStats> {
    let mut out: Vec<BackendStats> = vec![];

    for s in slots {
        match out.iter_mut().find(|b| b.daddr == s.dest.daddr) {
            Some(b) => {
                b.slots += 1;
                b.packets += s.packets;
                b.bytes += s.bytes;
            }
            None => out.push(BackendStats {
                daddr: s.dest.daddr,
                dmac: s.dest.dmac,
                ifindex: s.dest.ifindex,
                slots: 1,
                packets: s.packets,
                bytes: s.bytes,
            }),
        }
    }

    out
}

pub fn print_counters(counters: &Counters) {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S");
    let mut tab = InfoTable::new(vec!["stat", "count"]);

    for (name, value) in counters.iter() {
        tab.push_row(vec![name.to_string(), value.to_string()]);
    }

    tab.print(&format!("dispatch stats at {}", now));
}

pub fn print_backends(slots: &[SlotStats]) {
    let mut ifcache = IfCache::new();
    let mut tab = InfoTable::new(vec!["backend", "mac", "if", "slots", "packets", "bytes"]);

    for b in aggregate(slots) {
        tab.push_row(vec![
            b.daddr.to_string(),
            mac_to_str(&b.dmac),
            ifcache.name(b.ifindex),
            b.slots.to_string(),
            b.packets.to_string(),
            b.bytes.to_string(),
        ]);
    }

    tab.print("backend stats");
}
