use crate::{
    csum::{ipv4_csum, udp_csum},
    packet::{
        bytes_at, put_bytes, put_u16, u16_at, FormatError, UdpFlow, ETH_DST, ETH_SRC, IP_CHECK,
        IP_DST, IP_ID, IP_SRC, UDP_CHECK,
    },
    table::Destination,
};
use udp_lb_common::{ETH_ALEN, IP_HLEN};

/// The frame leaves from the interface it was received on, so the old
/// destination MAC becomes the source and the backend MAC the destination.
#[inline(always)]
fn update_l2_addrs(frame: &mut [u8], dmac: &[u8; ETH_ALEN]) -> Result<(), FormatError> {
    let lb_mac = bytes_at::<ETH_ALEN>(frame, ETH_DST)?;
    put_bytes(frame, ETH_SRC, &lb_mac)?;
    put_bytes(frame, ETH_DST, dmac)
}

/// Stamps the new addresses, bumps the identification and recomputes
/// the header checksum.
#[inline(always)]
fn update_ipv4hdr(frame: &mut [u8], ip_off: usize, dest: &Destination) -> Result<(), FormatError> {
    put_bytes(frame, ip_off + IP_SRC, &dest.saddr.octets())?;
    put_bytes(frame, ip_off + IP_DST, &dest.daddr.octets())?;

    let id = u16_at(frame, ip_off + IP_ID)?;
    put_u16(frame, ip_off + IP_ID, id.wrapping_add(1))?;

    put_u16(frame, ip_off + IP_CHECK, 0)?;
    let check = ipv4_csum(&bytes_at::<IP_HLEN>(frame, ip_off)?);
    put_u16(frame, ip_off + IP_CHECK, check)
}

#[inline(always)]
fn update_udp_csum(frame: &mut [u8], ip_off: usize, udp_off: usize) -> Result<(), FormatError> {
    put_u16(frame, udp_off + UDP_CHECK, 0)?;
    let check = udp_csum(frame, ip_off, udp_off)?;
    put_u16(frame, udp_off + UDP_CHECK, check)
}

/// Rewrites a classified frame in place so it is delivered to `dest`.
pub fn rewrite_for_backend(
    frame: &mut [u8],
    udp: &UdpFlow,
    dest: &Destination,
) -> Result<(), FormatError> {
    update_l2_addrs(frame, &dest.dmac)?;
    update_ipv4hdr(frame, udp.ip_off, dest)?;
    update_udp_csum(frame, udp.ip_off, udp.udp_off)
}
