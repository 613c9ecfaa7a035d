//! Datagram transport seam
//!
//! Server and client only ever need two primitives from a socket: send a
//! datagram to an address and receive the next datagram with its source. Both
//! sides are written against [`Transport`] so the tick and ingest paths can be
//! exercised against [`RecordingTransport`] without touching the network.

use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize>;
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

#[async_trait]
impl Transport for UdpSocket {
    async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, data, addr).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

/// In-memory transport that records every send.
///
/// Sends to addresses marked with [`fail_sends_to`](Self::fail_sends_to)
/// return an error instead. Datagrams queued with [`push_inbound`](Self::push_inbound)
/// are handed out by `recv_from` in order; with nothing queued it waits, like
/// an idle socket.
pub struct RecordingTransport {
    sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
    failing: Mutex<HashSet<SocketAddr>>,
    inbound_tx: mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            sent: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
        }
    }

    pub fn fail_sends_to(&self, addr: SocketAddr) {
        lock(&self.failing).insert(addr);
    }

    pub fn push_inbound(&self, data: Vec<u8>, from: SocketAddr) {
        // The receiver lives as long as self, so this cannot fail.
        let _ = self.inbound_tx.send((data, from));
    }

    /// Every successful send so far, in order
    pub fn sent(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        lock(&self.sent).clone()
    }

    pub fn sent_to(&self, addr: SocketAddr) -> Vec<Vec<u8>> {
        lock(&self.sent)
            .iter()
            .filter(|(to, _)| *to == addr)
            .map(|(_, data)| data.clone())
            .collect()
    }

    pub fn clear_sent(&self) {
        lock(&self.sent).clear();
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        if lock(&self.failing).contains(&addr) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("send to {} refused", addr),
            ));
        }

        lock(&self.sent).push((addr, data.to_vec()));
        Ok(data.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let mut inbound = self.inbound_rx.lock().await;
        match inbound.recv().await {
            Some((data, from)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok((len, from))
            }
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "recording transport closed",
            )),
        }
    }
}
