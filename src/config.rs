use std::{fs::read_to_string, net::SocketAddr, str::FromStr};

use anyhow::{Result, ensure};
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Session configuration
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Session {
    ///
    /// common name
    ///
    /// The canonical name identifying this participant, carried in
    /// the CNAME SDES item of every outbound report.
    ///
    #[serde(default = "Session::common_name")]
    pub common_name: String,
    ///
    /// destination address
    ///
    /// Where RTP data packets are sent.  RTCP reports go to the same
    /// host one port higher.
    ///
    pub destination: SocketAddr,
    ///
    /// local port
    ///
    /// Must be even: RTP binds to it and RTCP binds to port + 1.
    ///
    pub port: u16,
    ///
    /// session bandwidth in bytes per second
    ///
    #[serde(default = "Session::bandwidth")]
    pub bandwidth: u32,
    ///
    /// fraction of the session bandwidth given to RTCP, in percent
    ///
    #[serde(default = "Session::rtcp_percentage")]
    pub rtcp_percentage: u8,
    ///
    /// Maximum Transmission Unit (MTU) size for network packets.
    ///
    #[serde(default = "Session::mtu")]
    pub mtu: usize,
}

impl Session {
    fn common_name() -> String {
        "rtp-endpoint@localhost".to_string()
    }

    fn bandwidth() -> u32 {
        8000
    }

    fn rtcp_percentage() -> u8 {
        5
    }

    // Ethernet minus the IP and UDP headers.
    fn mtu() -> usize {
        1500 - 20 - 8
    }
}

/// Media configuration
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Media {
    ///
    /// RTP payload type of the outbound stream.
    ///
    #[serde(default = "Media::payload_type")]
    pub payload_type: u8,
    ///
    /// media clock rate in ticks per second
    ///
    #[serde(default = "Media::clock_rate")]
    pub clock_rate: u32,
    ///
    /// payload bytes per data packet
    ///
    #[serde(default = "Media::packet_size")]
    pub packet_size: usize,
    ///
    /// milliseconds between data packets
    ///
    #[serde(default = "Media::packet_interval")]
    pub packet_interval: u64,
    ///
    /// media file
    ///
    /// The file whose bytes are paced out as the payload stream.
    /// When absent the endpoint is receive-only.
    ///
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Media {
    fn payload_type() -> u8 {
        96
    }

    fn clock_rate() -> u32 {
        8000
    }

    fn packet_size() -> usize {
        160
    }

    fn packet_interval() -> u64 {
        20
    }
}

impl Default for Media {
    fn default() -> Self {
        Self {
            payload_type: Self::payload_type(),
            clock_rate: Self::clock_rate(),
            packet_size: Self::packet_size(),
            packet_interval: Self::packet_interval(),
            file_name: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => return Err(format!("unknown log level: {value}")),
        })
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Log {
    ///
    /// log level
    ///
    /// An enum representing the available verbosity levels of the logger.
    ///
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub session: Session,
    #[serde(default)]
    pub media: Media,
    #[serde(default)]
    pub log: Log,
}

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    ///
    /// Specify the configuration file path
    ///
    /// Example: rtp-endpoint --config /etc/rtp-endpoint/config.toml
    ///
    #[arg(long, short)]
    config: String,
}

impl Config {
    ///
    /// Load configure from config file and command line parameters.
    ///
    pub fn load() -> Result<Self> {
        let config = toml::from_str::<Self>(&read_to_string(&Cli::parse().config)?)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.session.port % 2 == 0,
            "the session port must be even, RTCP takes port + 1"
        );

        ensure!(
            self.session.rtcp_percentage > 0,
            "rtcp-percentage must be positive"
        );

        ensure!(
            self.session.bandwidth > 0,
            "bandwidth must be positive, the report interval divides by it"
        );

        Ok(())
    }
}
