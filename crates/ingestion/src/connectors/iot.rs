//! IoT telemetry connector (push)
//!
//! Binds a UDP socket on `target` and yields records as datagrams arrive.
//! A datagram carries one JSON value (an array fans out) or
//! newline-separated JSON objects. Params: `max_datagram` (bytes, default
//! 65507), `key_field`.

use std::net::SocketAddr;

use contracts::{Record, SourceConfig};
use serde_json::Value;
use tokio::net::UdpSocket;
use tracing::{info, trace};

use super::RecordShape;
use crate::error::{IngestionError, Result};

/// Datagrams drained per activation after the first one arrives
const MAX_DRAIN: usize = 256;

#[derive(Debug)]
pub struct IotConnector {
    shape: RecordShape,
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl IotConnector {
    pub async fn bind(config: &SourceConfig) -> Result<Self> {
        let socket = UdpSocket::bind(&config.target)
            .await
            .map_err(|e| IngestionError::connect(&config.name, e))?;
        info!(source = %config.name, addr = ?socket.local_addr().ok(), "iot listener bound");

        Ok(Self {
            shape: RecordShape::new(config),
            socket,
            buf: vec![0u8; config.param_or("max_datagram", 65_507usize).max(1)],
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    /// Wait for the next datagram, then drain whatever else is queued
    pub async fn fetch(&mut self) -> Result<Vec<Record>> {
        let (len, peer) = self
            .socket
            .recv_from(&mut self.buf)
            .await
            .map_err(|e| IngestionError::io(self.shape.name(), e))?;
        let mut records = self.decode(len);
        trace!(source = %self.shape.name(), %peer, len, "iot datagram");

        for _ in 0..MAX_DRAIN {
            match self.socket.try_recv_from(&mut self.buf) {
                Ok((len, _)) => records.extend(self.decode(len)),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(IngestionError::io(self.shape.name(), e)),
            }
        }
        Ok(records)
    }

    fn decode(&self, len: usize) -> Vec<Record> {
        let data = &self.buf[..len];
        match serde_json::from_slice::<Value>(data) {
            Ok(value) => self.shape.records(value),
            Err(_) => self.shape.lines(&String::from_utf8_lossy(data)),
        }
    }
}
