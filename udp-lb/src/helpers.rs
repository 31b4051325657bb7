use anyhow::{anyhow, Context};
use std::collections::HashMap;

pub(crate) fn if_index_to_name(index: u32) -> Option<String> {
    let mut name = [0 as libc::c_char; libc::IF_NAMESIZE];
    let iname = unsafe { libc::if_indextoname(index, name.as_mut_ptr()) };

    if iname.is_null() {
        None
    } else {
        let str = unsafe { std::ffi::CStr::from_ptr(iname) };
        let str = str.to_string_lossy();
        Some(str.to_string())
    }
}

/// Interface index from a name or from the `if#<index>` notation.
pub fn ifindex(ifname: &str) -> Result<u32, anyhow::Error> {
    if let Some(index) = ifname.strip_prefix("if#") {
        return index
            .parse::<u32>()
            .context(format!("Invalid interface index '{}'", ifname));
    }

    let c_interface = std::ffi::CString::new(ifname)?;
    let if_index = unsafe { libc::if_nametoindex(c_interface.as_ptr()) };
    if if_index == 0 {
        Err(anyhow!("No interface named {}", ifname))
    } else {
        Ok(if_index)
    }
}

#[derive(Default)]
pub struct IfCache {
    cache: HashMap<u32, String>,
}

impl IfCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&mut self, ifindex: u32) -> String {
        self.cache
            .entry(ifindex)
            .or_insert_with(|| match if_index_to_name(ifindex) {
                None => format!("if#{}", ifindex),
                Some(name) => format!("{}:{}", name, ifindex),
            })
            .clone()
    }
}

pub fn mac_to_str(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

pub fn parse_mac<T: AsRef<str>>(input: T) -> Result<[u8; 6], anyhow::Error> {
    let input = input.as_ref();
    let mut mac = [0; 6];

    for sep in [':', '-'] {
        let bytes: Vec<&str> = input.split(sep).collect();
        if bytes.len() == 6 {
            for (i, b) in bytes.iter().enumerate() {
                mac[i] = u8::from_str_radix(b, 16)
                    .context(format!("invalid mac address '{}'", input))?;
            }
            return Ok(mac);
        }
    }

    if input.len() != 12 {
        return Err(anyhow!("invalid length for mac address '{}'", input));
    }
    for (i, c) in input.char_indices() {
        let hexd = c.to_digit(16).ok_or(anyhow!("non hex digit '{}'", c))? as u8;
        mac[i / 2] |= hexd << (4 * (1 - (i & 1)));
    }

    Ok(mac)
}

pub fn is_unicast_mac(mac: &[u8; 6]) -> bool {
    *mac != [0_u8; 6] && (mac[0] & 0x1) == 0_u8
}

pub fn parse_unicast_mac<T: AsRef<str>>(input: T) -> Result<[u8; 6], anyhow::Error> {
    let mac = parse_mac(input)?;
    if is_unicast_mac(&mac) {
        return Ok(mac);
    }

    Err(anyhow!("Not a unicast address, {}", mac_to_str(&mac)))
}

/// Parses a hex dump of a frame. Whitespace, ':' and '-' separators
/// are ignored.
pub fn parse_hex_frame<T: AsRef<str>>(input: T) -> Result<Vec<u8>, anyhow::Error> {
    let digits = input
        .as_ref()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .map(|c| c.to_digit(16).ok_or(anyhow!("non hex digit '{}'", c)))
        .collect::<Result<Vec<_>, _>>()?;

    if digits.len() % 2 != 0 {
        return Err(anyhow!("odd number of hex digits: {}", digits.len()));
    }

    Ok(digits
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4 | pair[1]) as u8)
        .collect())
}

pub fn frame_to_hex(frame: &[u8]) -> String {
    frame.iter().map(|b| format!("{:02x}", b)).collect()
}
