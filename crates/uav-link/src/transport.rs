//! Thin UDP wrappers.
//!
//! Delivery is best-effort: no retransmission, no ordering. A receiver
//! blocks for at most its timeout and can be closed from another task,
//! which wakes a pending `receive` with [`TransportError::Closed`].

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("receive timed out")]
    Timeout,
    #[error("transport closed")]
    Closed,
    #[error("bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("send to {dest}: {source}")]
    Send {
        dest: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("receive: {0}")]
    Recv(#[source] io::Error),
}

#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Bytes,
    pub from: SocketAddr,
}

/// Fire-and-forget sender aimed at one destination.
#[derive(Debug)]
pub struct DatagramSender {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl DatagramSender {
    /// Binds an ephemeral local port of the destination's address family.
    pub async fn to(dest: SocketAddr) -> Result<Self, TransportError> {
        let local: SocketAddr = if dest.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| TransportError::Bind { addr: local, source })?;
        if let Ok(local) = socket.local_addr() {
            debug!("udp sender {} -> {}", local, dest);
        }
        Ok(Self { socket, dest })
    }

    pub fn dest(&self) -> SocketAddr {
        self.dest
    }

    /// One payload, one datagram. Oversized payloads are the caller's problem.
    pub async fn send(&self, payload: &[u8]) -> Result<usize, TransportError> {
        self.socket
            .send_to(payload, self.dest)
            .await
            .map_err(|source| TransportError::Send { dest: self.dest, source })
    }
}

/// Closes a [`DatagramReceiver`] from any task.
#[derive(Debug, Clone)]
pub struct CloseHandle(std::sync::Arc<watch::Sender<bool>>);

impl CloseHandle {
    pub fn close(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Debug)]
pub struct DatagramReceiver {
    socket: UdpSocket,
    closed: watch::Receiver<bool>,
    local: SocketAddr,
}

impl DatagramReceiver {
    /// Binding failure is the one fatal transport error; it surfaces here,
    /// before any loop starts.
    pub async fn bind(addr: SocketAddr) -> Result<(Self, CloseHandle), TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local = socket
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;
        let (tx, closed) = watch::channel(false);
        info!("udp receiver bound to {}", local);
        Ok((Self { socket, closed, local }, CloseHandle(std::sync::Arc::new(tx))))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Wait up to `timeout` for one datagram of at most `max_size` bytes.
    /// Longer datagrams are truncated by the OS.
    pub async fn receive(&mut self, max_size: usize, timeout: Duration) -> Result<Datagram, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut buf = vec![0u8; max_size];

        tokio::select! {
            biased;
            // A dropped CloseHandle counts as closed.
            _ = self.closed.wait_for(|c| *c) => Err(TransportError::Closed),
            res = tokio::time::timeout(timeout, self.socket.recv_from(&mut buf)) => match res {
                Err(_) => Err(TransportError::Timeout),
                Ok(Err(e)) => Err(TransportError::Recv(e)),
                Ok(Ok((n, from))) => {
                    buf.truncate(n);
                    Ok(Datagram { payload: Bytes::from(buf), from })
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn send_then_receive_on_loopback() {
        let (mut rx, _close) = DatagramReceiver::bind(loopback()).await.unwrap();
        let tx = DatagramSender::to(rx.local_addr()).await.unwrap();

        assert_eq!(tx.send(b"merhaba").await.unwrap(), 7);
        let d = rx.receive(1024, Duration::from_secs(2)).await.unwrap();
        assert_eq!(&d.payload[..], b"merhaba");
    }

    #[tokio::test]
    async fn idle_receiver_times_out() {
        let (mut rx, _close) = DatagramReceiver::bind(loopback()).await.unwrap();
        let t0 = Instant::now();
        let r = rx.receive(1024, Duration::from_millis(50)).await;
        assert!(matches!(r, Err(TransportError::Timeout)));
        assert!(t0.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn close_wakes_blocked_receive() {
        let (mut rx, close) = DatagramReceiver::bind(loopback()).await.unwrap();
        let t0 = Instant::now();
        let waiter = tokio::spawn(async move { rx.receive(1024, Duration::from_secs(30)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        close.close();

        let r = waiter.await.unwrap();
        assert!(matches!(r, Err(TransportError::Closed)));
        assert!(t0.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn closed_receiver_stays_closed() {
        let (mut rx, close) = DatagramReceiver::bind(loopback()).await.unwrap();
        close.close();
        assert!(rx.is_closed());
        assert!(matches!(rx.receive(16, Duration::from_secs(1)).await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn second_bind_on_same_port_fails() {
        let (rx, _close) = DatagramReceiver::bind(loopback()).await.unwrap();
        let err = DatagramReceiver::bind(rx.local_addr()).await.unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));
    }

    #[tokio::test]
    async fn oversized_datagram_is_truncated_to_buffer() {
        let (mut rx, _close) = DatagramReceiver::bind(loopback()).await.unwrap();
        let tx = DatagramSender::to(rx.local_addr()).await.unwrap();
        tx.send(&[7u8; 100]).await.unwrap();
        let d = rx.receive(10, Duration::from_secs(2)).await.unwrap();
        assert_eq!(d.payload.len(), 10);
    }
}
