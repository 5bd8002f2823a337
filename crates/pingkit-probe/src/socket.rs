//! Raw socket capability.
//!
//! The transport never touches the OS directly: it asks a [`RawSocketFactory`]
//! for an [`EchoSocket`] and drives that. Production code uses
//! [`SystemSocketFactory`] (needs root or CAP_NET_RAW) or the helper-backed
//! factory in [`crate::helper`]; tests inject fakes.

use std::future::Future;
use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddrV4};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

/// One open raw ICMP socket. Dropping it closes the descriptor.
pub trait EchoSocket: Send + Sync {
    /// Send a single datagram, returning how many bytes the kernel accepted.
    fn send_to(
        &self,
        packet: &[u8],
        dest: Ipv4Addr,
    ) -> impl Future<Output = io::Result<usize>> + Send;

    /// Wait until a datagram is readable, then read it into `buf`.
    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;
}

/// Source of raw sockets bound to an IP protocol number.
pub trait RawSocketFactory: Send + Sync {
    type Socket: EchoSocket;

    fn open(&self, protocol: i32) -> impl Future<Output = io::Result<Self::Socket>> + Send;
}

// ── OS sockets ────────────────────────────────────────────────────────────────

/// A non-blocking raw IPv4 socket registered with the tokio reactor.
#[derive(Debug)]
pub struct RawEchoSocket {
    inner: AsyncFd<Socket>,
}

impl RawEchoSocket {
    /// Take ownership of an already-created raw socket.
    pub fn new(socket: Socket) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        // Safety: `Socket` owns its descriptor, keeps it open until dropped and
        // always reports the same fd, so the registration stays valid.
        let inner = unsafe { AsyncFd::register(socket) }?;
        Ok(Self { inner })
    }
}

impl EchoSocket for RawEchoSocket {
    async fn send_to(&self, packet: &[u8], dest: Ipv4Addr) -> io::Result<usize> {
        // ICMP has no ports; the kernel ignores this one.
        let addr = SockAddr::from(SocketAddrV4::new(dest, 0));
        self.inner
            .async_io(Interest::WRITABLE, |socket| socket.send_to(packet, &addr))
            .await
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner
            .async_io(Interest::READABLE, |socket| {
                let mut reader: &Socket = socket;
                reader.read(buf)
            })
            .await
    }
}

/// Opens raw sockets directly with `socket(AF_INET, SOCK_RAW, protocol)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSocketFactory;

impl RawSocketFactory for SystemSocketFactory {
    type Socket = RawEchoSocket;

    async fn open(&self, protocol: i32) -> io::Result<RawEchoSocket> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::from(protocol)))?;
        RawEchoSocket::new(socket)
    }
}
