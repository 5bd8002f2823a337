//! In-memory raw sockets for exercising the transport and pinger without privilege.

use std::collections::VecDeque;
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pingkit_core::wire::{encode_echo, ICMP_ECHO_REPLY, IPV4_HEADER_LEN};
use tokio::time::{self, Instant};

use crate::socket::{EchoSocket, RawSocketFactory};

pub(crate) type SentLog = Arc<Mutex<Vec<(Ipv4Addr, Vec<u8>)>>>;

/// A datagram that becomes readable `at` after the socket was opened.
#[derive(Debug, Clone)]
pub(crate) struct Datagram {
    at: Duration,
    bytes: Vec<u8>,
}

impl Datagram {
    pub(crate) fn at(millis: u64, bytes: Vec<u8>) -> Self {
        Self {
            at: Duration::from_millis(millis),
            bytes,
        }
    }
}

/// IPv4 prefix followed by an echo message of `icmp_type` for `identifier`.
pub(crate) fn reply_datagram(icmp_type: u8, identifier: u16) -> Vec<u8> {
    let mut datagram = vec![0u8; IPV4_HEADER_LEN];
    datagram[0] = 0x45;
    datagram.extend_from_slice(&encode_echo(icmp_type, identifier, 1, b"QQQQ"));
    datagram
}

#[derive(Debug)]
pub(crate) struct FakeSocket {
    opened: Instant,
    inbox: Mutex<VecDeque<Datagram>>,
    sent: SentLog,
    max_write: Option<usize>,
    echo: bool,
    fail_send: bool,
    closed: Arc<AtomicUsize>,
}

impl EchoSocket for FakeSocket {
    async fn send_to(&self, packet: &[u8], dest: Ipv4Addr) -> io::Result<usize> {
        if self.fail_send {
            return Err(io::Error::new(io::ErrorKind::NetworkUnreachable, "fake send failure"));
        }

        let n = self.max_write.map_or(packet.len(), |max| max.min(packet.len()));
        self.sent.lock().unwrap().push((dest, packet[..n].to_vec()));

        if self.echo && packet.len() >= 6 {
            let identifier = u16::from_be_bytes([packet[4], packet[5]]);
            self.inbox.lock().unwrap().push_back(Datagram {
                at: self.opened.elapsed(),
                bytes: reply_datagram(ICMP_ECHO_REPLY, identifier),
            });
        }
        Ok(n)
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let next = { self.inbox.lock().unwrap().front().map(|d| d.at) };
        match next {
            Some(at) => time::sleep_until(self.opened + at).await,
            None => std::future::pending::<()>().await,
        }

        let datagram = { self.inbox.lock().unwrap().pop_front() }.expect("scheduled datagram");
        let n = datagram.bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&datagram.bytes[..n]);
        Ok(n)
    }
}

impl Drop for FakeSocket {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeFactory {
    script: Vec<Datagram>,
    echo: bool,
    fail_send: bool,
    max_write: Option<usize>,
    refuse: Option<i32>,
    sent: SentLog,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl FakeFactory {
    /// Sockets that never deliver anything.
    pub(crate) fn silent() -> Self {
        Self::default()
    }

    /// Sockets that answer every request immediately with a matching reply.
    pub(crate) fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    /// Sockets that deliver `script` on a timeline starting at open.
    pub(crate) fn scripted(script: Vec<Datagram>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// `open` fails with `errno`.
    pub(crate) fn refusing(errno: i32) -> Self {
        Self {
            refuse: Some(errno),
            ..Self::default()
        }
    }

    /// Sockets whose `send_to` always fails.
    pub(crate) fn failing_send() -> Self {
        Self {
            fail_send: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_max_write(mut self, max_write: usize) -> Self {
        self.max_write = Some(max_write);
        self
    }

    pub(crate) fn sent_log(&self) -> SentLog {
        self.sent.clone()
    }

    pub(crate) fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (self.opened.clone(), self.closed.clone())
    }
}

impl RawSocketFactory for FakeFactory {
    type Socket = FakeSocket;

    async fn open(&self, _protocol: i32) -> io::Result<FakeSocket> {
        if let Some(errno) = self.refuse {
            return Err(io::Error::from_raw_os_error(errno));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSocket {
            opened: Instant::now(),
            inbox: Mutex::new(self.script.iter().cloned().collect()),
            sent: self.sent.clone(),
            max_write: self.max_write,
            echo: self.echo,
            fail_send: self.fail_send,
            closed: self.closed.clone(),
        })
    }
}
