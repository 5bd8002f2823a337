//! pingkit-probe: ICMP echo transport and probe orchestration.
//!
//! Everything that touches sockets sits behind [`RawSocketFactory`], so the
//! receive loop and the orchestration run unprivileged in tests.

pub mod error;
pub mod helper;
pub mod ident;
pub mod pinger;
pub mod report;
pub mod result;
pub mod socket;
pub mod transport;

#[cfg(test)]
mod fake;

pub use error::ProbeError;
pub use helper::HelperSocketFactory;
pub use ident::{IdentifierSource, RandomIdentifiers, SequentialIdentifiers};
pub use pinger::{DestinationReport, Pinger};
pub use report::{ProbeRecord, ProbeSummary};
pub use result::ProbeResult;
pub use socket::{EchoSocket, RawEchoSocket, RawSocketFactory, SystemSocketFactory};
pub use transport::EchoTransport;
