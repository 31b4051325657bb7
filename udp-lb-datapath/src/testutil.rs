//! Frame construction for unit tests.

use udp_lb_common::{ETH_P_IP, IPPROTO_UDP, SERVICE_PORT};

pub const LB_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x01];
pub const CLIENT_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x02];

fn reference_csum(words: &[u8]) -> u16 {
    let mut sum = 0_u64;
    for pair in words.chunks(2) {
        let hi = pair[0] as u64;
        let lo = pair.get(1).copied().unwrap_or(0) as u64;
        sum += hi << 8 | lo;
    }
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

pub struct FrameBuilder {
    ether_type: u16,
    ihl: u8,
    frag_off: u16,
    proto: u8,
    id: u16,
    src: [u8; 4],
    dst: [u8; 4],
    src_port: u16,
    dst_port: u16,
    payload: Vec<u8>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self {
            ether_type: ETH_P_IP,
            ihl: 5,
            frag_off: 0,
            proto: IPPROTO_UDP,
            id: 0x1234,
            src: [192, 168, 1, 20],
            dst: [192, 168, 1, 1],
            src_port: 40000,
            dst_port: SERVICE_PORT,
            payload: vec![],
        }
    }

    pub fn ether_type(mut self, ether_type: u16) -> Self {
        self.ether_type = ether_type;
        self
    }

    pub fn ihl(mut self, ihl: u8) -> Self {
        self.ihl = ihl;
        self
    }

    pub fn frag_off(mut self, frag_off: u16) -> Self {
        self.frag_off = frag_off;
        self
    }

    pub fn proto(mut self, proto: u8) -> Self {
        self.proto = proto;
        self
    }

    pub fn id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }

    pub fn src(mut self, src: [u8; 4]) -> Self {
        self.src = src;
        self
    }

    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    /// Ethernet + IPv4 + UDP with valid checksums. The ihl is written as
    /// given but the header is always 20 bytes long.
    pub fn build(self) -> Vec<u8> {
        let udp_len = (8 + self.payload.len()) as u16;
        let tot_len = 20 + udp_len;

        let mut frame = Vec::with_capacity(14 + tot_len as usize);
        frame.extend_from_slice(&LB_MAC);
        frame.extend_from_slice(&CLIENT_MAC);
        frame.extend_from_slice(&self.ether_type.to_be_bytes());

        let mut ip = vec![0x40 | (self.ihl & 0x0f), 0];
        ip.extend_from_slice(&tot_len.to_be_bytes());
        ip.extend_from_slice(&self.id.to_be_bytes());
        ip.extend_from_slice(&self.frag_off.to_be_bytes());
        ip.extend_from_slice(&[64, self.proto, 0, 0]);
        ip.extend_from_slice(&self.src);
        ip.extend_from_slice(&self.dst);
        let check = reference_csum(&ip);
        ip[10..12].copy_from_slice(&check.to_be_bytes());
        frame.extend_from_slice(&ip);

        let mut udp = vec![];
        udp.extend_from_slice(&self.src_port.to_be_bytes());
        udp.extend_from_slice(&self.dst_port.to_be_bytes());
        udp.extend_from_slice(&udp_len.to_be_bytes());
        udp.extend_from_slice(&[0, 0]);
        udp.extend_from_slice(&self.payload);

        let mut pseudo = vec![];
        pseudo.extend_from_slice(&self.src);
        pseudo.extend_from_slice(&self.dst);
        pseudo.extend_from_slice(&[0, self.proto]);
        pseudo.extend_from_slice(&udp_len.to_be_bytes());
        pseudo.extend_from_slice(&udp);
        let check = reference_csum(&pseudo);
        udp[6..8].copy_from_slice(&check.to_be_bytes());
        frame.extend_from_slice(&udp);

        frame
    }
}
