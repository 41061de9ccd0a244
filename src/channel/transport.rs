//! Thin `UdpSocket` wrapper: one channel owns exactly one socket and at
//! most one peer address, set once the SIP signaling side learns where to
//! send media (`spec.md` §4.3, "setPeer").
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Mutex;
use std::time::Duration;

pub struct UdpTransport {
    socket: UdpSocket,
    peer: Mutex<Option<SocketAddr>>,
}

impl UdpTransport {
    pub fn bind(local: SocketAddr, recv_timeout: Duration) -> io::Result<Self> {
        let socket = UdpSocket::bind(local)?;
        socket.set_read_timeout(Some(recv_timeout))?;
        Ok(Self {
            socket,
            peer: Mutex::new(None),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn set_peer(&self, peer: SocketAddr) {
        let mut guard = self.peer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(peer);
    }

    #[must_use]
    pub fn peer(&self) -> Option<SocketAddr> {
        *self.peer.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let peer = self
            .peer()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "channel has no peer set"))?;
        self.socket.send_to(buf, peer)
    }

    /// Blocks up to the configured read timeout; `Ok(None)` on timeout so
    /// the receive loop can poll its run flag without busy-spinning.
    pub fn recv(&self, scratch: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(scratch) {
            Ok(v) => Ok(Some(v)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
