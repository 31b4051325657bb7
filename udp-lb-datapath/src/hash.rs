use std::net::Ipv4Addr;
use udp_lb_common::MAX_SERVERS;

/// Bob Jenkins' lookup3 initial value, as used by the kernel jhash.
const JHASH_INITVAL: u32 = 0xdeadbeef;

#[inline(always)]
fn jhash_final(mut a: u32, mut b: u32, mut c: u32) -> u32 {
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(14));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(11));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(25));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(16));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(4));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(14));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(24));
    c
}

/// Two word variant of the Jenkins hash, bit compatible with the kernel's
/// `jhash_2words()`.
#[inline(always)]
pub fn jhash_2words(a: u32, b: u32, initval: u32) -> u32 {
    let initval = initval
        .wrapping_add(JHASH_INITVAL)
        .wrapping_add(2 << 2);
    jhash_final(
        a.wrapping_add(initval),
        b.wrapping_add(initval),
        initval,
    )
}

/// Hash input identifying a UDP flow: the source address and both ports.
///
/// The words hold the wire bytes loaded the way a little-endian datapath
/// loads them, so a flow maps to the same slot as in the kernel program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src: u32,
    pub ports: u32,
}

impl FlowKey {
    pub fn new(src_addr: Ipv4Addr, src_port: u16, dst_port: u16) -> Self {
        let [s0, s1] = src_port.to_be_bytes();
        let [d0, d1] = dst_port.to_be_bytes();
        Self {
            src: u32::from_le_bytes(src_addr.octets()),
            ports: u32::from_le_bytes([s0, s1, d0, d1]),
        }
    }

    pub fn hash(&self) -> u32 {
        jhash_2words(self.src, self.ports, MAX_SERVERS)
    }

    /// Destination table slot for this flow.
    pub fn slot(&self) -> u32 {
        self.hash() % MAX_SERVERS
    }
}
