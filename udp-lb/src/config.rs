use crate::helpers;
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::{
    fs::OpenOptions,
    io::Read,
    net::{IpAddr, Ipv4Addr},
    path::Path,
};
use udp_lb_common::{MAX_SERVERS, SERVICE_PORT};
use udp_lb_datapath::Destination;

fn default_service_port() -> u16 {
    SERVICE_PORT
}

fn default_enabled() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BackendConfig {
    pub address: IpAddr,
    pub mac: String,
    /// Interface name or `if#<index>`
    pub interface: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SlotConfig {
    pub slot: u32,
    /// Index in the backend list
    pub backend: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_service_port")]
    pub service_port: u16,
    pub source_addr: IpAddr,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub slots: Vec<SlotConfig>,
}

/// A configured backend after validation.
#[derive(Debug, Clone)]
pub struct Backend {
    pub interface: String,
    pub dest: Destination,
    pub enabled: bool,
}

fn ipv4(addr: &IpAddr, what: &str) -> Result<Ipv4Addr, anyhow::Error> {
    match addr {
        IpAddr::V4(ip) => Ok(*ip),
        IpAddr::V6(ip) => Err(anyhow!("{} {} is not an IPv4 address", what, ip)),
    }
}

impl Config {
    pub fn parse(contents: &str) -> Result<Self, anyhow::Error> {
        toml::from_str(contents).context("Invalid config")
    }

    pub fn description(&self) -> String {
        let enabled = self.backends.iter().filter(|b| b.enabled).count();
        format!(
            "Port: {}, backends: {} ({} enabled), slot overrides: {}",
            self.service_port,
            self.backends.len(),
            enabled,
            self.slots.len()
        )
    }

    /// Validates every backend and slot override.
    pub fn backends(&self) -> Result<Vec<Backend>, anyhow::Error> {
        if self.backends.is_empty() {
            return Err(anyhow!("No backends configured"));
        }

        let saddr = ipv4(&self.source_addr, "Source address")?;

        let backends = self
            .backends
            .iter()
            .enumerate()
            .map(|(i, be)| {
                let daddr = ipv4(&be.address, "Backend address")
                    .context(format!("Backend #{}", i))?;
                let dmac =
                    helpers::parse_unicast_mac(&be.mac).context(format!("Backend #{}", i))?;
                let ifindex =
                    helpers::ifindex(&be.interface).context(format!("Backend #{}", i))?;
                Ok(Backend {
                    interface: be.interface.clone(),
                    dest: Destination {
                        saddr,
                        daddr,
                        dmac,
                        ifindex,
                    },
                    enabled: be.enabled,
                })
            })
            .collect::<Result<Vec<_>, anyhow::Error>>()?;

        for over in &self.slots {
            if over.slot >= MAX_SERVERS {
                return Err(anyhow!(
                    "Slot override {} out of range, max {}",
                    over.slot,
                    MAX_SERVERS - 1
                ));
            }
            if over.backend >= backends.len() {
                return Err(anyhow!(
                    "Slot override {} refers to missing backend #{}",
                    over.slot,
                    over.backend
                ));
            }
        }

        Ok(backends)
    }
}

pub struct ConfigFile {
    path: String,
}

impl ConfigFile {
    pub fn new<S: AsRef<str>>(filename: &S) -> Self {
        Self {
            path: String::from(filename.as_ref()),
        }
    }

    pub fn load(&self) -> Result<Config, anyhow::Error> {
        if !Path::new(&self.path)
            .try_exists()
            .context(format!("Can't access config file: {}", self.path))?
        {
            return Err(anyhow!("Config file does not exist, {}", self.path));
        }
        let mut file = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .context(format!("Can't read config file: {}", self.path))?;
        let mut contents = String::new();
        let size = file.read_to_string(&mut contents)?;

        log::info!("Read {} bytes from: {}", size, self.path);

        let cfg = Config::parse(&contents).context(format!("Config file: {}", self.path))?;

        log::info!("Found in config: {}", cfg.description());
        Ok(cfg)
    }
}
