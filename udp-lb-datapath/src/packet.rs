//! Bounds checked extraction of the Ethernet, IPv4 and UDP headers.
//!
//! Nothing here reinterprets the frame as a header record. Every field is
//! copied out of the byte slice after checking that enough bytes remain,
//! and a failed check surfaces as a [`FormatError`].

use crate::hash::FlowKey;
use core::fmt;
use std::net::Ipv4Addr;
use udp_lb_common::{
    IpFrag, ETH_ALEN, ETH_HLEN, ETH_P_IP, IPPROTO_UDP, IP_FRAG_OFFSET_MASK, IP_HLEN, UDP_HLEN,
};

// Ethernet field offsets
pub(crate) const ETH_DST: usize = 0;
pub(crate) const ETH_SRC: usize = 6;
const ETH_PROTO: usize = 12;

// IPv4 field offsets, relative to the IPv4 header
const IP_VER_IHL: usize = 0;
const IP_TOT_LEN: usize = 2;
pub(crate) const IP_ID: usize = 4;
const IP_FRAG_OFF: usize = 6;
const IP_TTL: usize = 8;
pub(crate) const IP_PROTO: usize = 9;
pub(crate) const IP_CHECK: usize = 10;
pub(crate) const IP_SRC: usize = 12;
pub(crate) const IP_DST: usize = 16;

// UDP field offsets, relative to the UDP header
const UDP_SOURCE: usize = 0;
const UDP_DEST: usize = 2;
pub(crate) const UDP_LEN: usize = 4;
pub(crate) const UDP_CHECK: usize = 6;

/// The frame can't be classified and must be dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// `len` bytes at `offset` lie past the end of the frame.
    Truncated { offset: usize, len: usize },
    /// The IPv4 header length (in 32-bit words) is not 5.
    IpOptions(u8),
    /// The IPv4 flags + fragment offset field marks a fragment.
    Fragmented(u16),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated { offset, len } => {
                write!(f, "truncated frame, need {} bytes at offset {}", len, offset)
            }
            Self::IpOptions(ihl) => write!(f, "ipv4 header with options, ihl={}", ihl),
            Self::Fragmented(frag) => write!(f, "ipv4 fragment, frag_off=0x{:04x}", frag),
        }
    }
}

impl std::error::Error for FormatError {}

/// Why a well formed frame is left to the normal network stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bypass {
    /// The EtherType is not IPv4.
    NotIpv4(u16),
    /// The IPv4 payload is not UDP.
    NotUdp(u8),
    /// The UDP destination port is not the service port.
    OtherPort(u16),
}

/// A UDP datagram addressed to the service port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdpFlow {
    pub flow: FlowKey,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    /// Offset of the IPv4 header in the frame
    pub ip_off: usize,
    /// Offset of the UDP header in the frame
    pub udp_off: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classified {
    Bypass(Bypass),
    Target(UdpFlow),
}

#[inline(always)]
pub(crate) fn bytes_at<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], FormatError> {
    let src = offset
        .checked_add(N)
        .and_then(|end| buf.get(offset..end))
        .ok_or(FormatError::Truncated { offset, len: N })?;
    let mut out = [0_u8; N];
    out.copy_from_slice(src);
    Ok(out)
}

#[inline(always)]
pub(crate) fn u8_at(buf: &[u8], offset: usize) -> Result<u8, FormatError> {
    buf.get(offset)
        .copied()
        .ok_or(FormatError::Truncated { offset, len: 1 })
}

#[inline(always)]
pub(crate) fn u16_at(buf: &[u8], offset: usize) -> Result<u16, FormatError> {
    bytes_at::<2>(buf, offset).map(u16::from_be_bytes)
}

#[inline(always)]
pub(crate) fn put_bytes(buf: &mut [u8], offset: usize, value: &[u8]) -> Result<(), FormatError> {
    let len = value.len();
    let dst = offset
        .checked_add(len)
        .and_then(|end| buf.get_mut(offset..end))
        .ok_or(FormatError::Truncated { offset, len })?;
    dst.copy_from_slice(value);
    Ok(())
}

#[inline(always)]
pub(crate) fn put_u16(buf: &mut [u8], offset: usize, value: u16) -> Result<(), FormatError> {
    put_bytes(buf, offset, &value.to_be_bytes())
}

/// Ethernet II header fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EthHdr {
    pub dst_addr: [u8; ETH_ALEN],
    pub src_addr: [u8; ETH_ALEN],
    /// Host order
    pub ether_type: u16,
}

impl EthHdr {
    pub const LEN: usize = ETH_HLEN;

    pub fn parse(frame: &[u8]) -> Result<Self, FormatError> {
        // Check the whole header once so a short frame reports the header span
        bytes_at::<ETH_HLEN>(frame, 0)?;
        Ok(Self {
            dst_addr: bytes_at(frame, ETH_DST)?,
            src_addr: bytes_at(frame, ETH_SRC)?,
            ether_type: u16_at(frame, ETH_PROTO)?,
        })
    }
}

/// IPv4 header fields, host order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Hdr {
    pub version_ihl: u8,
    pub tot_len: u16,
    pub id: u16,
    pub frag_off: u16,
    pub ttl: u8,
    pub proto: u8,
    pub check: u16,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
}

impl Ipv4Hdr {
    pub const LEN: usize = IP_HLEN;

    pub fn parse(frame: &[u8], offset: usize) -> Result<Self, FormatError> {
        let hdr = bytes_at::<IP_HLEN>(frame, offset)?;
        let hdr = &hdr[..];
        Ok(Self {
            version_ihl: u8_at(hdr, IP_VER_IHL)?,
            tot_len: u16_at(hdr, IP_TOT_LEN)?,
            id: u16_at(hdr, IP_ID)?,
            frag_off: u16_at(hdr, IP_FRAG_OFF)?,
            ttl: u8_at(hdr, IP_TTL)?,
            proto: u8_at(hdr, IP_PROTO)?,
            check: u16_at(hdr, IP_CHECK)?,
            src_addr: Ipv4Addr::from(bytes_at::<4>(hdr, IP_SRC)?),
            dst_addr: Ipv4Addr::from(bytes_at::<4>(hdr, IP_DST)?),
        })
    }

    /// Header length in 32-bit words
    pub fn ihl(&self) -> u8 {
        self.version_ihl & 0x0F
    }

    pub fn frag_flags(&self) -> IpFrag {
        IpFrag::from_bits_truncate(self.frag_off)
    }

    /// True for any fragment, the first one included, as the later ones
    /// carry no UDP header to classify them by.
    pub fn is_fragment(&self) -> bool {
        self.frag_flags().contains(IpFrag::MORE_FRAGMENTS)
            || self.frag_off & IP_FRAG_OFFSET_MASK != 0
    }
}

/// UDP header fields, host order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdpHdr {
    pub source: u16,
    pub dest: u16,
    pub len: u16,
    pub check: u16,
}

impl UdpHdr {
    pub const LEN: usize = UDP_HLEN;

    pub fn parse(frame: &[u8], offset: usize) -> Result<Self, FormatError> {
        let hdr = bytes_at::<UDP_HLEN>(frame, offset)?;
        let hdr = &hdr[..];
        Ok(Self {
            source: u16_at(hdr, UDP_SOURCE)?,
            dest: u16_at(hdr, UDP_DEST)?,
            len: u16_at(hdr, UDP_LEN)?,
            check: u16_at(hdr, UDP_CHECK)?,
        })
    }
}

/// Validates the frame headers and tells whether the frame is a UDP
/// datagram for `service_port`.
///
/// Errors are format violations: a truncated header at any layer, an IPv4
/// header with options or an IPv4 fragment.
pub fn classify(frame: &[u8], service_port: u16) -> Result<Classified, FormatError> {
    let eth = EthHdr::parse(frame)?;
    if eth.ether_type != ETH_P_IP {
        return Ok(Classified::Bypass(Bypass::NotIpv4(eth.ether_type)));
    }

    let ip_off = EthHdr::LEN;
    let ipv4hdr = Ipv4Hdr::parse(frame, ip_off)?;

    if ipv4hdr.ihl() as usize * 4 != Ipv4Hdr::LEN {
        return Err(FormatError::IpOptions(ipv4hdr.ihl()));
    }

    if ipv4hdr.is_fragment() {
        return Err(FormatError::Fragmented(ipv4hdr.frag_off));
    }

    if ipv4hdr.proto != IPPROTO_UDP {
        return Ok(Classified::Bypass(Bypass::NotUdp(ipv4hdr.proto)));
    }

    let udp_off = ip_off + Ipv4Hdr::LEN;
    let udphdr = UdpHdr::parse(frame, udp_off)?;

    if udphdr.dest != service_port {
        return Ok(Classified::Bypass(Bypass::OtherPort(udphdr.dest)));
    }

    Ok(Classified::Target(UdpFlow {
        flow: FlowKey::new(ipv4hdr.src_addr, udphdr.source, udphdr.dest),
        src_addr: ipv4hdr.src_addr,
        dst_addr: ipv4hdr.dst_addr,
        src_port: udphdr.source,
        dst_port: udphdr.dest,
        ip_off,
        udp_off,
    }))
}
