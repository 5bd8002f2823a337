//! Raw sockets via a privileged helper process.
//!
//! Instead of running the whole prober as root, a small helper binary with
//! CAP_NET_RAW opens the socket and passes the descriptor back over a Unix
//! socket pair (SCM_RIGHTS). Helper protocol:
//!
//!   helper <fd> <family> <protocol>
//!
//! `fd` is the helper's end of the pair. On success the helper sends one
//! dummy byte carrying the raw descriptor and exits 0.

use std::io::{self, IoSliceMut};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use nix::sys::socket::{recvmsg, ControlMessageOwned, MsgFlags};
use socket2::Socket;
use tokio::process::Command;

use crate::socket::{RawEchoSocket, RawSocketFactory};

/// Obtains raw sockets from an external helper binary.
#[derive(Debug, Clone)]
pub struct HelperSocketFactory {
    helper: PathBuf,
}

impl HelperSocketFactory {
    pub fn new(helper: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
        }
    }

    /// Helper invocation that hands `channel` to the child only.
    ///
    /// The parent's copy keeps CLOEXEC, so helpers spawned by concurrent
    /// probes never inherit each other's channels.
    fn command(&self, channel: RawFd, protocol: i32) -> Command {
        let mut command = Command::new(&self.helper);
        command
            .arg(channel.to_string())
            .arg(libc::AF_INET.to_string())
            .arg(protocol.to_string());
        // Safety: the hook runs between fork and exec and only calls fcntl,
        // which is async-signal-safe.
        unsafe {
            command.pre_exec(move || clear_cloexec(channel));
        }
        command
    }
}

impl RawSocketFactory for HelperSocketFactory {
    type Socket = RawEchoSocket;

    async fn open(&self, protocol: i32) -> io::Result<RawEchoSocket> {
        let (ours, theirs) = UnixStream::pair()?;

        let status = self.command(theirs.as_raw_fd(), protocol).status().await?;
        drop(theirs);

        if !status.success() {
            // The helper exits non-zero when socket() itself was refused.
            tracing::debug!(helper = %self.helper.display(), %status, "helper exited with failure");
            return Err(io::Error::from_raw_os_error(libc::EPERM));
        }

        ours.set_nonblocking(true)?;
        let fd = recv_fd(&ours)?;
        tracing::trace!(helper = %self.helper.display(), "received raw socket from helper");
        RawEchoSocket::new(Socket::from(fd))
    }
}

fn clear_cloexec(fd: RawFd) -> io::Result<()> {
    // Safety: fd is open for the duration of the call; F_SETFD only touches its flags.
    if unsafe { libc::fcntl(fd, libc::F_SETFD, 0) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read one SCM_RIGHTS descriptor from `stream`. The descriptor arrives with CLOEXEC set.
fn recv_fd(stream: &UnixStream) -> io::Result<OwnedFd> {
    let mut data = [0u8; 1];
    let mut iov = [IoSliceMut::new(&mut data)];
    let mut control = nix::cmsg_space!(RawFd);
    let msg = recvmsg::<()>(
        stream.as_raw_fd(),
        &mut iov,
        Some(&mut control),
        MsgFlags::MSG_CMSG_CLOEXEC,
    )?;

    let mut received = Vec::new();
    for cmsg in msg.cmsgs()? {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            // Safety: the kernel installed these descriptors in our table and
            // nothing else refers to them.
            received.extend(fds.into_iter().map(|fd| unsafe { OwnedFd::from_raw_fd(fd) }));
        }
    }

    // Any extra descriptors are closed when the iterator drops.
    received
        .into_iter()
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "helper sent no descriptor"))
}
