//! pingkit-helper: opens a raw socket and hands it to the calling process.
//!
//! Give this one small binary the capability instead of running pingkit as root:
//!
//!   sudo setcap cap_net_raw+ep target/release/pingkit-helper
//!
//! Usage: pingkit-helper <fd> <family> <protocol>
//!
//! `fd` is an inherited Unix socket. The new raw socket is sent over it as
//! SCM_RIGHTS ancillary data attached to a single dummy byte.

use std::io::IoSlice;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use nix::sys::socket::{sendmsg, ControlMessage, MsgFlags};
use socket2::{Domain, Protocol, Socket, Type};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "raw socket helper failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (fd, family, protocol) = parse_args(&args)?;
    tracing::debug!(fd, family, protocol, "helper arguments");

    // Safety: F_GETFD only inspects the descriptor table.
    if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
        bail!("fd {fd} is not open");
    }
    // Safety: the descriptor is open and was handed to us for exclusive use.
    let channel = unsafe { OwnedFd::from_raw_fd(fd) };

    let socket = Socket::new(Domain::from(family), Type::RAW, Some(Protocol::from(protocol)))
        .context("socket()")?;
    send_fd(&channel, socket.as_raw_fd()).context("sendmsg()")?;

    tracing::debug!("raw socket passed to parent");
    Ok(())
}

fn parse_args(args: &[String]) -> Result<(RawFd, i32, i32)> {
    let [fd, family, protocol] = args else {
        bail!("usage: pingkit-helper <fd> <family> <protocol>");
    };
    Ok((
        fd.parse::<RawFd>().context("fd must be a number")?,
        family.parse::<i32>().context("family must be a number")?,
        protocol.parse::<i32>().context("protocol must be a number")?,
    ))
}

/// Send `fd` over `channel` as SCM_RIGHTS attached to one dummy byte.
fn send_fd(channel: &OwnedFd, fd: RawFd) -> std::io::Result<()> {
    let iov = [IoSlice::new(&[0u8])];
    let fds = [fd];
    sendmsg::<()>(
        channel.as_raw_fd(),
        &iov,
        &[ControlMessage::ScmRights(&fds)],
        MsgFlags::empty(),
        None,
    )?;
    Ok(())
}
