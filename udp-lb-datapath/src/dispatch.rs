use crate::{
    packet::{classify, Classified, FormatError},
    rewrite::rewrite_for_backend,
    select::select_destination,
    stats::{account_redirect, Counters},
    table::TableReader,
};
use log::{debug, log_enabled, trace, Level};
use udp_lb_common::{stats, Action, SERVICE_PORT};

/// Runs the per frame pipeline: classify, select a backend, rewrite,
/// checksum and account.
///
/// The dispatcher is shared by reference between all the processing
/// contexts. It never blocks, allocates or panics on frame content.
pub struct Dispatcher {
    table: TableReader,
    service_port: u16,
    counters: Counters,
}

impl Dispatcher {
    pub fn new(table: TableReader) -> Self {
        Self {
            table,
            service_port: SERVICE_PORT,
            counters: Counters::new(),
        }
    }

    pub fn with_service_port(mut self, port: u16) -> Self {
        self.service_port = port;
        self
    }

    pub fn service_port(&self) -> u16 {
        self.service_port
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Decides the fate of `frame`. On [`Action::Redirect`] the frame has
    /// been rewritten in place and must be sent out of the returned
    /// interface; otherwise it is unchanged.
    pub fn process(&self, frame: &mut [u8]) -> Action {
        self.counters.inc(stats::PACKETS);

        let action = match self.try_process(frame) {
            Ok(action) => action,
            Err(e) => {
                if log_enabled!(Level::Debug) {
                    debug!("[dispatch] drop, {}", e);
                }
                self.counters.inc(stats::DROP_FORMAT);
                Action::Drop
            }
        };

        match action {
            Action::Pass => self.counters.inc(stats::PASS),
            Action::Drop => self.counters.inc(stats::DROP),
            Action::Redirect(_) => self.counters.inc(stats::REDIRECT),
        }

        action
    }

    fn try_process(&self, frame: &mut [u8]) -> Result<Action, FormatError> {
        let udp = match classify(frame, self.service_port)? {
            Classified::Target(udp) => udp,
            Classified::Bypass(reason) => {
                if log_enabled!(Level::Trace) {
                    trace!("[dispatch] pass, {:?}", reason);
                }
                return Ok(Action::Pass);
            }
        };

        let sel = match select_destination(&self.table, &udp.flow) {
            Some(sel) => sel,
            None => {
                if log_enabled!(Level::Debug) {
                    debug!(
                        "[dispatch] drop {}:{}, no destination at slot {} or fallback",
                        udp.src_addr,
                        udp.src_port,
                        udp.flow.slot()
                    );
                }
                self.counters.inc(stats::DROP_NO_DEST);
                return Ok(Action::Drop);
            }
        };

        if sel.fallback {
            self.counters.inc(stats::FALLBACK);
        }

        let dest = &sel.entry.dest;
        rewrite_for_backend(frame, &udp, dest)?;
        account_redirect(&sel.entry, frame.len());

        if log_enabled!(Level::Debug) {
            debug!(
                "[dispatch] {}:{} -> slot {} {} mac {:02x?} if {}",
                udp.src_addr, udp.src_port, sel.slot, dest.daddr, dest.dmac, dest.ifindex
            );
        }

        Ok(Action::Redirect(dest.ifindex))
    }
}
