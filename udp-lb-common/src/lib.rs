#![no_std]

use bitflags;

pub const VERSION: u32 = 0x0000001;

/// Number of slots in the destination table.
pub const MAX_SERVERS: u32 = 512;
/// Slot used when the flow's hashed slot is not provisioned.
pub const FALLBACK_SLOT: u32 = 0;
/// UDP destination port of the load balanced service.
pub const SERVICE_PORT: u16 = 7999;
/// Upper bound, in bytes, of the UDP header + payload window summed
/// into the transport checksum.
pub const MAX_UDP_LENGTH: usize = 1480;

pub const ETH_ALEN: usize = 6;
/// Ethernet header size.
pub const ETH_HLEN: usize = 14;
/// IPv4 header size without options.
pub const IP_HLEN: usize = 20;
/// UDP header size.
pub const UDP_HLEN: usize = 8;
/// Eth + IPv4 + UDP.
pub const MIN_FRAME_LEN: usize = ETH_HLEN + IP_HLEN + UDP_HLEN;

/// EtherType for IPv4.
pub const ETH_P_IP: u16 = 0x0800;
/// IP protocol number for UDP.
pub const IPPROTO_UDP: u8 = 17;

bitflags::bitflags! {
/// Flag bits of the IPv4 `flags + fragment offset` field (host order).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IpFrag: u16 {
    const RESERVED = 0x8000;
    const DONT_FRAGMENT = 0x4000;
    const MORE_FRAGMENTS = 0x2000;
}
}

/// Fragment offset bits of the IPv4 `flags + fragment offset` field.
pub const IP_FRAG_OFFSET_MASK: u16 = 0x1FFF;

/// Terminal outcome of the datapath for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Hand the frame to the normal network stack untouched.
    Pass,
    /// Discard the frame.
    Drop,
    /// Transmit the rewritten frame out of the interface with this index.
    Redirect(u32),
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Drop => "drop",
            Self::Redirect(_) => "redirect",
        }
    }
}

/// Indexes of the dispatcher counters.
pub mod stats {
    /// Every frame handed to the dispatcher
    pub const PACKETS: u32 = 0;
    pub const PASS: u32 = 1;
    pub const DROP: u32 = 2;
    pub const REDIRECT: u32 = 3;
    /// Dropped due to truncated or unsupported headers
    pub const DROP_FORMAT: u32 = 4;
    /// Dropped because neither the hashed slot nor the fallback resolved
    pub const DROP_NO_DEST: u32 = 5;
    /// Redirected via the fallback slot
    pub const FALLBACK: u32 = 6;
    pub const MAX: u32 = 7;
}
