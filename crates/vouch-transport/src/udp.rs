//! UDP transport implementation

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use vouch_core::{VouchError, VouchResult};

/// Receive buffer size. Larger than `MAX_RECORD_SIZE` so oversized
/// datagrams reach the parser whole and are rejected there.
pub const RECV_BUFFER_SIZE: usize = 1500;

/// Default UDP port
pub const DEFAULT_PORT: u16 = 8765;

/// Fire-and-forget delivery to every neighbor
pub trait Broadcast {
    /// Send a datagram to all neighbors without waiting.
    /// Returns the number of neighbors it was handed to.
    fn broadcast(&self, datagram: &[u8]) -> VouchResult<usize>;
}

/// UDP transport broadcasting to a fixed neighbor set
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    neighbors: Vec<SocketAddr>,
}

impl UdpTransport {
    /// Bind to a local address
    pub async fn bind(addr: SocketAddr) -> VouchResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| VouchError::TransportError(e.to_string()))?;

        // Allows a subnet broadcast address as a neighbor
        socket
            .set_broadcast(true)
            .map_err(|e| VouchError::TransportError(e.to_string()))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| VouchError::TransportError(e.to_string()))?;

        Ok(UdpTransport {
            socket: Arc::new(socket),
            local_addr,
            neighbors: Vec::new(),
        })
    }

    /// Set the neighbor set
    pub fn with_neighbors(mut self, neighbors: Vec<SocketAddr>) -> Self {
        self.neighbors = neighbors;
        self
    }

    /// Add a neighbor
    pub fn add_neighbor(&mut self, addr: SocketAddr) {
        if !self.neighbors.contains(&addr) {
            self.neighbors.push(addr);
        }
    }

    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn neighbors(&self) -> &[SocketAddr] {
        &self.neighbors
    }

    /// Send raw bytes to a destination
    pub async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> VouchResult<()> {
        self.socket
            .send_to(bytes, dest)
            .await
            .map_err(|e| VouchError::TransportError(e.to_string()))?;
        Ok(())
    }

    /// Receive raw bytes
    pub async fn recv_from(&self) -> VouchResult<(Bytes, SocketAddr)> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let (len, addr) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| VouchError::TransportError(e.to_string()))?;

        buf.truncate(len);
        Ok((Bytes::from(buf), addr))
    }

    /// Get a clone of the socket for concurrent operations
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

impl Broadcast for UdpTransport {
    fn broadcast(&self, datagram: &[u8]) -> VouchResult<usize> {
        let mut sent = 0;
        for neighbor in &self.neighbors {
            match self.socket.try_send_to(datagram, *neighbor) {
                Ok(_) => sent += 1,
                Err(e) => {
                    tracing::warn!(%neighbor, "UDP send failed: {}", e);
                }
            }
        }
        Ok(sent)
    }
}

/// Packet receiver channel
pub type PacketReceiver = mpsc::Receiver<(Bytes, SocketAddr)>;

/// Start a background receive loop
pub fn start_receive_loop(socket: Arc<UdpSocket>, buffer_size: usize) -> PacketReceiver {
    let (tx, rx) = mpsc::channel(buffer_size);

    tokio::spawn(async move {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, addr)) => {
                    let packet = Bytes::copy_from_slice(&buf[..len]);
                    if tx.send((packet, addr)).await.is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(e) => {
                    tracing::warn!("UDP receive error: {}", e);
                }
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_udp_transport_bind() {
        let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        assert_ne!(transport.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_neighbor() {
        let a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let c = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let mut a = a.with_neighbors(vec![b.local_addr()]);
        a.add_neighbor(c.local_addr());
        a.add_neighbor(c.local_addr());
        assert_eq!(a.neighbors().len(), 2);

        assert_eq!(a.broadcast(b"0|1|0|0").unwrap(), 2);

        for receiver in [&b, &c] {
            let (bytes, from) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&bytes[..], b"0|1|0|0");
            assert_eq!(from, a.local_addr());
        }
    }

    #[tokio::test]
    async fn test_receive_loop() {
        let a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let mut rx = start_receive_loop(b.socket(), 16);

        a.send_to(b"7|2|3", b.local_addr()).await.unwrap();

        let (bytes, from) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&bytes[..], b"7|2|3");
        assert_eq!(from, a.local_addr());
    }
}
