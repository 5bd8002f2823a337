//! pingkit: send ICMP echo requests and report round-trip times.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use pingkit_core::config::PingkitConfig;
use pingkit_probe::{
    HelperSocketFactory, Pinger, ProbeRecord, ProbeResult, ProbeSummary, RandomIdentifiers,
    RawSocketFactory, SystemSocketFactory,
};

// ── Arguments ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct Options {
    timeout: Option<Duration>,
    count: Option<u32>,
    helper: Option<PathBuf>,
    parallel: bool,
    json: bool,
    hosts: Vec<String>,
}

#[derive(Debug, PartialEq)]
enum Invocation {
    Help,
    Ping(Options),
}

fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" | "help" => return Ok(Invocation::Help),
            "--timeout" | "-W" => {
                i += 1;
                let secs: f64 = args
                    .get(i)
                    .context("--timeout requires a value")?
                    .parse()
                    .context("--timeout must be a number of seconds")?;
                if !(secs > 0.0 && secs.is_finite()) {
                    bail!("--timeout must be positive");
                }
                options.timeout = Some(
                    Duration::try_from_secs_f64(secs).context("--timeout is too large")?,
                );
            }
            "--count" | "-c" => {
                i += 1;
                options.count = Some(
                    args.get(i)
                        .context("--count requires a value")?
                        .parse()
                        .context("--count must be a number")?,
                );
            }
            "--helper" => {
                i += 1;
                options.helper = Some(PathBuf::from(
                    args.get(i).context("--helper requires a path")?,
                ));
            }
            "--parallel" => options.parallel = true,
            "--json" => options.json = true,
            flag if flag.starts_with('-') => bail!("unknown option: {flag}"),
            host => options.hosts.push(host.to_string()),
        }
        i += 1;
    }

    if options.hosts.is_empty() {
        bail!("no destination given");
    }
    Ok(Invocation::Ping(options))
}

fn print_usage() {
    println!("Usage: pingkit [options] <host>...");
    println!();
    println!("Options:");
    println!("  -c, --count <n>        Probes per host (default: 4)");
    println!("  -W, --timeout <secs>   Reply budget per probe (default: 2)");
    println!("  --helper <path>        Obtain raw sockets from a privileged helper");
    println!("  --parallel             Probe all hosts concurrently");
    println!("  --json                 Print results as JSON");
    println!();
    println!("Raw ICMP sockets need root or CAP_NET_RAW, or a helper that has it.");
}

// ── Reporting ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonDestination {
    destination: String,
    records: Vec<ProbeRecord>,
    summary: ProbeSummary,
}

fn result_line(host: &str, result: &ProbeResult, timeout: Duration) -> String {
    match result {
        ProbeResult::Delay(delay) => format!(
            "get ping in {:.4} milliseconds.",
            delay.as_secs_f64() * 1000.0
        ),
        ProbeResult::Timeout => format!(
            "failed. (Timeout within {} seconds.)",
            timeout.as_secs_f64()
        ),
        ProbeResult::ResolutionFailure => format!("failed. (Cannot resolve {host}.)"),
    }
}

fn print_summary(host: &str, results: &[ProbeResult]) {
    println!();
    println!("--- {host} ---");
    println!("{}", ProbeSummary::from_results(results));
    println!();
}

fn json_destination(host: &str, results: &[ProbeResult]) -> JsonDestination {
    JsonDestination {
        destination: host.to_string(),
        records: results
            .iter()
            .enumerate()
            .map(|(i, r)| ProbeRecord::new(host, i + 1, r))
            .collect(),
        summary: ProbeSummary::from_results(results),
    }
}

// ── Probing ───────────────────────────────────────────────────────────────────

async fn run<F>(factory: F, config: &PingkitConfig, options: &Options) -> Result<()>
where
    F: RawSocketFactory + 'static,
{
    let pinger = Pinger::from_config(factory, RandomIdentifiers, config)
        .context("invalid probe settings")?;
    let timeout = options.timeout.unwrap_or_else(|| config.probe.timeout());
    let count = options.count.unwrap_or(config.probe.count);

    let mut json = Vec::new();

    if options.parallel && options.hosts.len() > 1 {
        for report in pinger.sweep(&options.hosts, timeout, count).await {
            let host = report.destination;
            let results = report.outcome.with_context(|| format!("probing {host} failed"))?;
            if options.json {
                json.push(json_destination(&host, &results));
                continue;
            }
            for result in &results {
                println!("ping {host}...");
                println!("{}", result_line(&host, result, timeout));
            }
            print_summary(&host, &results);
        }
    } else {
        for host in &options.hosts {
            let mut results = Vec::new();
            for _ in 0..count {
                if !options.json {
                    println!("ping {host}...");
                }
                let result = pinger.probe_once(host, timeout).await?;
                if !options.json {
                    println!("{}", result_line(host, &result, timeout));
                }
                results.push(result);
            }
            if options.json {
                json.push(json_destination(host, &results));
            } else {
                print_summary(host, &results);
            }
        }
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(Invocation::Help) => {
            print_usage();
            return Ok(());
        }
        Ok(Invocation::Ping(options)) => options,
        Err(e) => {
            eprintln!("{e:#}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = PingkitConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = PingkitConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        PingkitConfig::default()
    });

    let helper = options
        .helper
        .clone()
        .or_else(|| config.socket.helper().map(PathBuf::from));

    match helper {
        Some(path) => {
            tracing::debug!(helper = %path.display(), "using raw socket helper");
            run(HelperSocketFactory::new(path), &config, &options).await
        }
        None => {
            if !nix::unistd::geteuid().is_root() {
                tracing::debug!("not running as root; raw socket creation needs CAP_NET_RAW");
            }
            run(SystemSocketFactory, &config, &options).await
        }
    }
}
