//! NetworkSink - one synthesized frame per UDP datagram
//!
//! Delivery is best-effort: a failed send is logged and the stream carries
//! on with the next tick.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;

use contracts::{FrameSink, SynthError, SynthesizedFrame};
use tokio::net::UdpSocket;
use tracing::{debug, instrument, warn};

/// Largest UDP payload over IPv4
pub const MAX_UDP_PAYLOAD: usize = 65_507;

const DEFAULT_MAX_PACKET: usize = 65_000;

/// Datagram encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    #[default]
    Json,
    Bincode,
}

impl NetworkFormat {
    pub fn encode(self, frame: &SynthesizedFrame) -> Result<Vec<u8>, String> {
        match self {
            Self::Json => serde_json::to_vec(frame).map_err(|e| format!("json: {e}")),
            Self::Bincode => bincode::serialize(frame).map_err(|e| format!("bincode: {e}")),
        }
    }
}

impl FromStr for NetworkFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "bincode" => Ok(Self::Bincode),
            other => Err(format!("unknown format '{other}' (json | bincode)")),
        }
    }
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    pub addr: SocketAddr,
    pub format: NetworkFormat,
    /// Frames that encode larger than this are skipped
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Params: `addr` (required), `format`, `max_packet_size` (capped at
    /// [`MAX_UDP_PAYLOAD`])
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr = param(params, "addr")?.ok_or_else(|| "missing 'addr' parameter".to_string())?;
        let format = param(params, "format")?.unwrap_or_default();
        let max_packet_size = param::<usize>(params, "max_packet_size")?
            .unwrap_or(DEFAULT_MAX_PACKET)
            .min(MAX_UDP_PAYLOAD);
        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

fn param<T>(params: &HashMap<String, String>, key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    params
        .get(key)
        .map(|raw| raw.parse().map_err(|e| format!("invalid {key} '{raw}': {e}")))
        .transpose()
}

/// Streams frames to one UDP peer
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    connection: Option<UdpSocket>,
    sent: u64,
    send_errors: u64,
    oversized: u64,
}

impl NetworkSink {
    /// Bind an ephemeral local port of the peer's address family and connect
    #[instrument(name = "network_sink_new", skip(name, config), fields(peer = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let local: SocketAddr = if config.addr.is_ipv4() {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(config.addr).await?;
        debug!(sink = %name, format = ?config.format, "network sink connected");

        Ok(Self {
            name,
            config,
            connection: Some(socket),
            sent: 0,
            send_errors: 0,
            oversized: 0,
        })
    }

    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, SynthError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| SynthError::sink_write(&name, e))?;
        match Self::new(name.clone(), config).await {
            Ok(sink) => Ok(sink),
            Err(e) => Err(SynthError::SinkConnection {
                sink_name: name,
                message: e.to_string(),
            }),
        }
    }
}

impl FrameSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, frame),
        fields(sink = %self.name, tick_id = frame.tick_id)
    )]
    async fn write(&mut self, frame: &SynthesizedFrame) -> Result<(), SynthError> {
        let Some(socket) = self.connection.as_ref() else {
            return Err(SynthError::sink_write(&self.name, "sink already closed"));
        };
        let datagram = self
            .config
            .format
            .encode(frame)
            .map_err(|e| SynthError::sink_write(&self.name, e))?;
        if datagram.len() > self.config.max_packet_size {
            self.oversized += 1;
            warn!(
                bytes = datagram.len(),
                limit = self.config.max_packet_size,
                "frame too large for one datagram, skipped"
            );
            return Ok(());
        }

        match socket.send(&datagram).await {
            Ok(_) => self.sent += 1,
            Err(e) => {
                self.send_errors += 1;
                warn!(error = %e, "udp send failed");
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SynthError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SynthError> {
        self.connection = None;
        debug!(
            sink = %self.name,
            sent = self.sent,
            send_errors = self.send_errors,
            oversized = self.oversized,
            "network sink closed"
        );
        Ok(())
    }
}
