use std::{net::Ipv4Addr, sync::Arc, thread};
use udp_lb_common::{stats, Action, ETH_HLEN, IP_HLEN, MAX_SERVERS, SERVICE_PORT};
use udp_lb_datapath::{
    csum::{ipv4_csum_valid, udp_csum_valid},
    packet::{EthHdr, Ipv4Hdr},
    Destination, DestinationTable, Dispatcher, FlowKey,
};

const LB_MAC: [u8; 6] = [0x02, 0x42, 0xac, 0x11, 0x00, 0x02];
const IP_OFF: usize = ETH_HLEN;
const UDP_OFF: usize = ETH_HLEN + IP_HLEN;

fn fold(mut sum: u32) -> u16 {
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

fn sum_words(bytes: &[u8]) -> u32 {
    bytes
        .chunks(2)
        .map(|w| (w[0] as u32) << 8 | w.get(1).copied().unwrap_or(0) as u32)
        .sum()
}

/// Ethernet/IPv4/UDP frame with valid checksums.
fn udp_frame(src: Ipv4Addr, src_port: u16, dst_port: u16, id: u16, payload: &[u8]) -> Vec<u8> {
    let dst = Ipv4Addr::new(192, 0, 2, 1);
    let udp_len = 8 + payload.len() as u16;

    let mut frame = vec![];
    frame.extend_from_slice(&LB_MAC);
    frame.extend_from_slice(&[0x02, 0x42, 0xac, 0x11, 0x00, 0x99]);
    frame.extend_from_slice(&0x0800_u16.to_be_bytes());

    frame.extend_from_slice(&[0x45, 0]);
    frame.extend_from_slice(&(20 + udp_len).to_be_bytes());
    frame.extend_from_slice(&id.to_be_bytes());
    frame.extend_from_slice(&[0x40, 0, 64, 17, 0, 0]);
    frame.extend_from_slice(&src.octets());
    frame.extend_from_slice(&dst.octets());
    let check = fold(sum_words(&frame[IP_OFF..UDP_OFF]));
    frame[IP_OFF + 10..IP_OFF + 12].copy_from_slice(&check.to_be_bytes());

    frame.extend_from_slice(&src_port.to_be_bytes());
    frame.extend_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(&udp_len.to_be_bytes());
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(payload);

    let pseudo = sum_words(&src.octets())
        + sum_words(&dst.octets())
        + 17
        + udp_len as u32
        + sum_words(&frame[UDP_OFF..]);
    let check = fold(pseudo);
    frame[UDP_OFF + 6..UDP_OFF + 8].copy_from_slice(&check.to_be_bytes());
    frame
}

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn backend(n: u8) -> Destination {
    Destination {
        saddr: Ipv4Addr::new(192, 0, 2, 1),
        daddr: Ipv4Addr::new(10, 20, 0, n),
        dmac: [0x0a, 0, 0, 0, 0, n],
        ifindex: n as u32,
    }
}

#[test]
fn end_to_end_slot_17() {
    init_log();
    let src = (0..=u16::MAX)
        .map(|n| Ipv4Addr::new(10, 1, (n >> 8) as u8, n as u8))
        .find(|addr| FlowKey::new(*addr, 40000, SERVICE_PORT).slot() == 17)
        .expect("some address hashes to slot 17");

    let (ctl, reader) = DestinationTable::create();
    let b = Destination {
        saddr: Ipv4Addr::new(192, 0, 2, 1),
        daddr: Ipv4Addr::new(10, 20, 0, 17),
        dmac: [0x0a, 0xbb, 0xcc, 0xdd, 0xee, 0x11],
        ifindex: 3,
    };
    ctl.insert(0, backend(1)).unwrap();
    ctl.insert(17, b).unwrap();
    let lb = Dispatcher::new(reader);

    let mut frame = udp_frame(src, 40000, SERVICE_PORT, 0x4242, &[0xab; 100]);
    let len = frame.len() as u64;

    assert_eq!(lb.process(&mut frame), Action::Redirect(3));

    let eth = EthHdr::parse(&frame).unwrap();
    assert_eq!(eth.dst_addr, b.dmac);
    assert_eq!(eth.src_addr, LB_MAC);

    let ip = Ipv4Hdr::parse(&frame, IP_OFF).unwrap();
    assert_eq!(ip.dst_addr, b.daddr);
    assert_eq!(ip.src_addr, b.saddr);
    assert_eq!(ip.id, 0x4243);
    assert!(ipv4_csum_valid(&frame, IP_OFF).unwrap());
    assert!(udp_csum_valid(&frame, IP_OFF, UDP_OFF).unwrap());

    let entry = ctl.get(17).unwrap().unwrap();
    assert_eq!(entry.packets(), 1);
    assert_eq!(entry.bytes(), len);
    assert_eq!(ctl.get(0).unwrap().unwrap().packets(), 0);
}

#[test]
fn zero_payload_at_buffer_end() {
    let (ctl, reader) = DestinationTable::create();
    ctl.provision_round_robin(&[Some(backend(4))]).unwrap();
    let lb = Dispatcher::new(reader);

    let mut frame = udp_frame(Ipv4Addr::new(10, 3, 3, 3), 5555, SERVICE_PORT, 1, &[]);
    assert_eq!(frame.len(), UDP_OFF + 8);
    assert_eq!(lb.process(&mut frame), Action::Redirect(4));
    assert!(udp_csum_valid(&frame, IP_OFF, UDP_OFF).unwrap());

    // Same frame cut inside the UDP header
    let mut short = udp_frame(Ipv4Addr::new(10, 3, 3, 3), 5555, SERVICE_PORT, 1, &[]);
    short.pop();
    assert_eq!(lb.process(&mut short), Action::Drop);
}

#[test]
fn concurrent_redirects_account_every_frame() {
    let (ctl, reader) = DestinationTable::create();
    ctl.insert(0, backend(7)).unwrap();
    let lb = Arc::new(Dispatcher::new(reader));

    // Only the fallback is provisioned so every flow lands on slot 0
    let workers = (0..4_u16)
        .map(|worker| {
            let lb = lb.clone();
            thread::spawn(move || {
                let mut bytes = 0_u64;
                for i in 0..500_u16 {
                    let payload = vec![worker as u8; (i % 64) as usize];
                    let mut frame = udp_frame(
                        Ipv4Addr::new(10, 9, worker as u8, 1),
                        1024 + i,
                        SERVICE_PORT,
                        i,
                        &payload,
                    );
                    bytes += frame.len() as u64;
                    assert_eq!(lb.process(&mut frame), Action::Redirect(7));
                }
                bytes
            })
        })
        .collect::<Vec<_>>();

    let bytes = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .sum::<u64>();

    let entry = ctl.get(0).unwrap().unwrap();
    assert_eq!(entry.packets(), 2000);
    assert_eq!(entry.bytes(), bytes);
    assert_eq!(lb.counters().get(stats::REDIRECT), 2000);
    assert_eq!(lb.counters().get(stats::PACKETS), 2000);
}

#[test]
fn control_plane_updates_while_dispatching() {
    let (ctl, reader) = DestinationTable::create();
    ctl.provision_round_robin(&[Some(backend(1)), Some(backend(2))])
        .unwrap();
    let lb = Arc::new(Dispatcher::new(reader));

    let worker = {
        let lb = lb.clone();
        thread::spawn(move || {
            for i in 0..2000_u16 {
                let mut frame =
                    udp_frame(Ipv4Addr::new(10, 4, 0, 1), i, SERVICE_PORT, i, &[0; 16]);
                match lb.process(&mut frame) {
                    Action::Redirect(ifindex) => assert!(ifindex == 1 || ifindex == 2),
                    other => panic!("unexpected {:?}", other),
                }
            }
        })
    };

    for round in 0..50_u32 {
        let slot = (round * 7) % MAX_SERVERS;
        ctl.insert(slot, backend(1 + (round % 2) as u8)).unwrap();
    }

    worker.join().unwrap();
    assert_eq!(lb.counters().get(stats::REDIRECT), 2000);
}

#[test]
fn teardown_drops_everything() {
    let (ctl, reader) = DestinationTable::create();
    ctl.provision_round_robin(&[Some(backend(1))]).unwrap();
    let lb = Dispatcher::new(reader);
    ctl.teardown();

    let mut frame = udp_frame(Ipv4Addr::new(10, 4, 0, 1), 1, SERVICE_PORT, 1, &[]);
    assert_eq!(lb.process(&mut frame), Action::Drop);
    assert_eq!(lb.counters().get(stats::DROP_NO_DEST), 1);
}
