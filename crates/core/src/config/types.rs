use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::library::LibraryConfig;
use crate::probe::{FfprobeConfig, ProbeSettings};
use crate::task::ScheduleConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub ffprobe: FfprobeConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8096
}
