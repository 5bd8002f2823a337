use crate::*;

use pingkit_core::wire::EchoTemplate;

// ══════════════════════════════════════════════════════════════════════════════
//  Loopback round trips (need raw socket privilege)
// ══════════════════════════════════════════════════════════════════════════════

fn skip_unless_privileged() -> bool {
    if raw_sockets_available() {
        return true;
    }
    eprintln!("SKIP: raw ICMP sockets unavailable; run as root or grant CAP_NET_RAW");
    false
}

/// The kernel answers echo requests on loopback; the delay must sit inside the budget.
#[tokio::test]
async fn test_loopback_reply() -> Result<()> {
    if !skip_unless_privileged() {
        return Ok(());
    }

    let result = system_pinger(0x5a00).probe_once(LOOPBACK, TIMEOUT).await?;
    println!("loopback: {result:?}");
    let delay = result.delay().expect("loopback should answer");
    assert!(delay < TIMEOUT);
    Ok(())
}

/// Our own request is visible on the raw socket before the reply; it must not count.
#[tokio::test]
async fn test_series_against_loopback() -> Result<()> {
    if !skip_unless_privileged() {
        return Ok(());
    }

    let results = system_pinger(0x5b00).probe_many(LOOPBACK, TIMEOUT, 3).await?;
    assert_eq!(results.len(), 3);
    for result in &results {
        assert!(result.delay().is_some(), "expected a reply, got {result:?}");
    }
    Ok(())
}

#[tokio::test]
async fn test_custom_template_round_trip() -> Result<()> {
    if !skip_unless_privileged() {
        return Ok(());
    }

    let pinger = system_pinger(0x5c00).with_template(EchoTemplate::new(7, 1400, b'z')?);
    let result = pinger.probe_once(LOOPBACK, TIMEOUT).await?;
    assert!(result.delay().is_some(), "large payload should still round-trip: {result:?}");
    Ok(())
}

/// Concurrent probes share the wire; each must pick out its own reply.
#[tokio::test]
async fn test_sweep_over_loopback_addresses() -> Result<()> {
    if !skip_unless_privileged() {
        return Ok(());
    }

    let destinations = vec![
        "127.0.0.1".to_string(),
        "127.0.0.2".to_string(),
        "127.0.0.3".to_string(),
    ];
    let reports = system_pinger(0x5d00).sweep(&destinations, TIMEOUT, 2).await;

    assert_eq!(reports.len(), destinations.len());
    for (report, expected) in reports.iter().zip(&destinations) {
        assert_eq!(&report.destination, expected);
        let results = report.outcome.as_ref().expect("sweep probe failed");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.delay().is_some()), "{expected}: {results:?}");
    }
    Ok(())
}
