//! Probe orchestration.
//!
//! A probe is resolve → open → send → receive → close. `probe_many` runs
//! probes strictly one after another against one destination; `sweep` runs
//! one such sequence per destination concurrently, each task with its own
//! sockets, and gathers the results over a channel.

use std::sync::Arc;
use std::time::Duration;

use pingkit_core::config::PingkitConfig;
use pingkit_core::wire::{EchoTemplate, WireError};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::ProbeError;
use crate::ident::IdentifierSource;
use crate::result::ProbeResult;
use crate::socket::RawSocketFactory;
use crate::transport::EchoTransport;

pub struct Pinger<F, I> {
    transport: Arc<EchoTransport<F>>,
    identifiers: Arc<I>,
    template: EchoTemplate,
}

impl<F, I> Clone for Pinger<F, I> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            identifiers: self.identifiers.clone(),
            template: self.template.clone(),
        }
    }
}

/// Every probe sent to one destination by [`Pinger::sweep`].
#[derive(Debug)]
pub struct DestinationReport {
    pub destination: String,
    pub outcome: Result<Vec<ProbeResult>, ProbeError>,
}

impl<F: RawSocketFactory, I: IdentifierSource> Pinger<F, I> {
    /// A pinger sending the default request (sequence 1, 192 filler bytes).
    pub fn new(transport: EchoTransport<F>, identifiers: I) -> Self {
        Self {
            transport: Arc::new(transport),
            identifiers: Arc::new(identifiers),
            template: EchoTemplate::default(),
        }
    }

    /// Build a pinger from loaded configuration.
    pub fn from_config(factory: F, identifiers: I, config: &PingkitConfig) -> Result<Self, WireError> {
        let transport = EchoTransport::new(factory, config.protocol.clone())
            .with_resolve_timeout(config.probe.resolve_timeout());
        Ok(Self::new(transport, identifiers).with_template(config.probe.echo_template()?))
    }

    pub fn with_template(mut self, template: EchoTemplate) -> Self {
        self.template = template;
        self
    }

    /// Send one echo request to `destination` and wait up to `timeout` for its reply.
    ///
    /// An unresolvable destination yields `Ok(ResolutionFailure)`; socket
    /// failures are errors. The socket is closed on every path.
    pub async fn probe_once(
        &self,
        destination: &str,
        timeout: Duration,
    ) -> Result<ProbeResult, ProbeError> {
        let dest = match self.transport.resolve(destination).await {
            Ok(addr) => addr,
            Err(ProbeError::Resolution { host, reason }) => {
                tracing::warn!(host = %host, reason = %reason, "destination did not resolve");
                return Ok(ProbeResult::ResolutionFailure);
            }
            Err(e) => return Err(e),
        };

        let socket = self.transport.open().await?;
        let identifier = self.identifiers.next_identifier();
        let packet = self.template.build(identifier);

        let outcome = async {
            let sent_at = Instant::now();
            self.transport.send(&socket, dest, &packet).await?;
            self.transport
                .receive(&socket, identifier, sent_at, timeout)
                .await
        }
        .await;
        self.transport.close(socket);

        match &outcome {
            Ok(ProbeResult::Delay(delay)) => tracing::debug!(
                %dest,
                identifier,
                delay_ms = delay.as_secs_f64() * 1000.0,
                "echo reply"
            ),
            Ok(result) => tracing::debug!(%dest, identifier, ?result, "no reply"),
            Err(e) => tracing::debug!(%dest, identifier, error = %e, "probe failed"),
        }
        outcome
    }

    /// Run `count` probes back to back, one result per probe in issue order.
    ///
    /// Stops at the first hard error (e.g. permission denied).
    pub async fn probe_many(
        &self,
        destination: &str,
        timeout: Duration,
        count: u32,
    ) -> Result<Vec<ProbeResult>, ProbeError> {
        let mut results = Vec::new();
        for _ in 0..count {
            results.push(self.probe_once(destination, timeout).await?);
        }
        Ok(results)
    }
}

impl<F, I> Pinger<F, I>
where
    F: RawSocketFactory + 'static,
    I: IdentifierSource + 'static,
{
    /// Probe several destinations concurrently, `count` probes each.
    ///
    /// Reports come back in the order of `destinations`.
    pub async fn sweep(
        &self,
        destinations: &[String],
        timeout: Duration,
        count: u32,
    ) -> Vec<DestinationReport> {
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, DestinationReport)>();

        for (index, destination) in destinations.iter().cloned().enumerate() {
            let pinger = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = pinger.probe_many(&destination, timeout, count).await;
                let _ = tx.send((index, DestinationReport { destination, outcome }));
            });
        }
        drop(tx);

        let mut reports: Vec<Option<DestinationReport>> =
            destinations.iter().map(|_| None).collect();
        while let Some((index, report)) = rx.recv().await {
            reports[index] = Some(report);
        }

        let missing = reports.iter().filter(|r| r.is_none()).count();
        if missing > 0 {
            tracing::error!(missing, "sweep tasks exited without reporting");
        }
        reports.into_iter().flatten().collect()
    }
}
