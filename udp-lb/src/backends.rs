use crate::{
    config::{Backend, Config},
    helpers::mac_to_str,
    info::InfoTable,
};
use anyhow::{anyhow, Context};
use log::{info, warn};
use udp_lb_common::{FALLBACK_SLOT, MAX_SERVERS};
use udp_lb_datapath::TableControl;

/// Fills the destination table from the validated backends: round-robin
/// over the backend list then the explicit slot overrides. Returns the
/// count of provisioned slots.
pub fn provision(
    ctl: &TableControl,
    cfg: &Config,
    backends: &[Backend],
) -> Result<usize, anyhow::Error> {
    let dests = backends
        .iter()
        .map(|be| if be.enabled { Some(be.dest) } else { None })
        .collect::<Vec<_>>();

    let count = ctl
        .provision_round_robin(&dests)
        .context("Failed to provision slots")?;
    info!(
        "Provisioned {}/{} slots over {} backends",
        count,
        MAX_SERVERS,
        backends.len()
    );

    for over in &cfg.slots {
        let be = backends.get(over.backend).ok_or(anyhow!(
            "Slot override {} refers to missing backend #{}",
            over.slot,
            over.backend
        ))?;
        if !be.enabled {
            warn!(
                "Slot {} override ignored, backend #{} is disabled",
                over.slot, over.backend
            );
            continue;
        }
        ctl.insert(over.slot, be.dest)
            .context(format!("Failed to override slot {}", over.slot))?;
        info!(
            "Slot {} overridden with backend #{} {}",
            over.slot, over.backend, be.dest.daddr
        );
    }

    Ok(ctl.provisioned())
}

/// Prints the backend list with the slot share of every backend.
pub fn list(ctl: &TableControl, backends: &[Backend]) {
    let slots = ctl.snapshot();
    let mut tab = InfoTable::new(vec!["#", "address", "mac", "if", "enabled", "slots"]);

    for (i, be) in backends.iter().enumerate() {
        let count = slots.iter().filter(|s| s.dest == be.dest).count();
        tab.push_row(vec![
            i.to_string(),
            be.dest.daddr.to_string(),
            mac_to_str(&be.dest.dmac),
            format!("{}:{}", be.interface, be.dest.ifindex),
            be.enabled.to_string(),
            count.to_string(),
        ]);
    }

    tab.print("backends");

    let fallback = match ctl.get(FALLBACK_SLOT) {
        Ok(Some(entry)) => entry.dest.daddr.to_string(),
        _ => "none".to_string(),
    };
    println!(
        "Provisioned slots: {}/{}, fallback: {}",
        slots.len(),
        MAX_SERVERS,
        fallback
    );
}
