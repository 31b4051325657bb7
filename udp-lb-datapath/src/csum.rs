//! Internet checksums for the rewritten IPv4 and UDP headers.

use crate::packet::{bytes_at, u16_at, u8_at, FormatError, IP_DST, IP_PROTO, IP_SRC, UDP_LEN};
use udp_lb_common::{IP_HLEN, MAX_UDP_LENGTH};

/// Folds the carries of a 32-bit one's complement sum into 16 bits.
/// Two rounds are enough for any sum of fewer than 65537 words.
#[inline(always)]
pub fn csum_fold(sum: u32) -> u16 {
    let sum = (sum & 0xffff) + (sum >> 16);
    let sum = (sum & 0xffff) + (sum >> 16);
    sum as u16
}

#[inline(always)]
fn csum_add_u32(sum: u32, value: u32) -> u32 {
    sum + (value >> 16) + (value & 0xffff)
}

/// Checksum of a 20 byte IPv4 header. Zero the checksum field before
/// computing it; over a header holding a valid checksum the result is 0.
pub fn ipv4_csum(hdr: &[u8; IP_HLEN]) -> u16 {
    let sum = hdr
        .chunks_exact(2)
        .fold(0_u32, |sum, word| sum + u16::from_be_bytes([word[0], word[1]]) as u32);
    !csum_fold(sum)
}

/// UDP checksum over the pseudo header and at most [`MAX_UDP_LENGTH`]
/// bytes starting at the UDP header.
///
/// The scan stops at the cap or at the end of `frame`, whichever comes
/// first, so trailing bytes beyond the UDP length (e.g. Ethernet padding)
/// are summed as well. A zero result is returned as is and not replaced
/// with 0xffff.
pub fn udp_csum(frame: &[u8], ip_off: usize, udp_off: usize) -> Result<u16, FormatError> {
    udp_csum_bounded(frame, ip_off, udp_off, MAX_UDP_LENGTH)
}

pub(crate) fn udp_csum_bounded(
    frame: &[u8],
    ip_off: usize,
    udp_off: usize,
    max_len: usize,
) -> Result<u16, FormatError> {
    let saddr = u32::from_be_bytes(bytes_at::<4>(frame, ip_off + IP_SRC)?);
    let daddr = u32::from_be_bytes(bytes_at::<4>(frame, ip_off + IP_DST)?);
    let proto = u8_at(frame, ip_off + IP_PROTO)?;
    let udp_len = u16_at(frame, udp_off + UDP_LEN)?;

    let mut sum = csum_add_u32(0, saddr);
    sum = csum_add_u32(sum, daddr);
    sum += proto as u32;
    sum += udp_len as u32;

    // The loop runs at most max_len / 2 times and each read is checked
    // against the frame end on its own.
    let mut scanned = 0_usize;
    while scanned + 2 <= max_len {
        match frame.get(udp_off + scanned..udp_off + scanned + 2) {
            Some(word) => sum += u16::from_be_bytes([word[0], word[1]]) as u32,
            None => break,
        }
        scanned += 2;
    }

    // Odd trailing byte, padded as the high byte of a word
    if scanned < max_len {
        if let Some(&byte) = frame.get(udp_off + scanned) {
            sum += (byte as u32) << 8;
        }
    }

    Ok(!csum_fold(sum))
}

/// True if the IPv4 header at `ip_off` carries a valid checksum.
pub fn ipv4_csum_valid(frame: &[u8], ip_off: usize) -> Result<bool, FormatError> {
    Ok(ipv4_csum(&bytes_at::<IP_HLEN>(frame, ip_off)?) == 0)
}

/// True if the UDP checksum in place sums to zero over the same window
/// used by [`udp_csum`].
pub fn udp_csum_valid(frame: &[u8], ip_off: usize, udp_off: usize) -> Result<bool, FormatError> {
    Ok(udp_csum(frame, ip_off, udp_off)? == 0)
}
