//! Probe binary: starts a platform, pushes a burst of work through the
//! standard, private and serial queues, and prints the scheduler metrics.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};

use mediaplat::{
    callback_fn, load_dotenv, AsyncResult, Event, Handle, NodeType, Platform, PlatformConfig,
    Topology, WorkQueueId, PLATFORM_VERSION,
};

/// Exercise the work queues of a freshly started platform.
#[derive(Parser, Debug)]
#[command(name = "mediaplat-probe", version, about)]
struct Cli {
    /// Path to a TOML config file. Falls back to MEDIAPLAT_* environment variables.
    #[arg(long, env = "MEDIAPLAT_CONFIG")]
    config: Option<String>,

    /// Work items per queue.
    #[arg(long, default_value_t = 16)]
    items: u32,

    /// Delay applied to scheduled items, in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay_ms: i64,

    /// How long to wait for the burst to drain, in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

/// Total work items for `items` per queue over `queues` queues.
fn burst_size(items: u32, queues: usize) -> anyhow::Result<u32> {
    if items == 0 {
        bail!("--items must be at least 1");
    }
    u32::try_from(queues)
        .ok()
        .and_then(|queues| items.checked_mul(queues))
        .with_context(|| format!("--items {} is too large for {} queues", items, queues))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PlatformConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path))?,
        None => PlatformConfig::from_env(),
    };
    config.log_summary();

    let platform = Platform::new(config);
    platform.startup(PLATFORM_VERSION)?;

    let topology = platform.create_topology();
    let source = platform.create_node(NodeType::SourceStream);
    let output = platform.create_node(NodeType::Output);
    source.connect_output(0, &output, 0)?;
    topology.add_node(&source)?;
    topology.add_node(&output)?;

    let private = platform.allocate_work_queue()?;
    let serial = platform.allocate_serial_work_queue(private)?;
    let queues = [WorkQueueId::STANDARD, private, serial];

    let expected = burst_size(cli.items, queues.len())?;
    let completed = Arc::new(AtomicU32::new(0));
    let done = Event::new();

    for queue in queues {
        for _ in 0..cli.items {
            let completed = Arc::clone(&completed);
            let done = done.clone();
            let result = AsyncResult::new(
                None,
                Some(callback_fn(move |result| {
                    let topology: Option<Topology> =
                        result.state_ref().and_then(|state| state.downcast());
                    if topology.is_none() {
                        warn!("Work item arrived without its topology");
                    }
                    if completed.fetch_add(1, Ordering::SeqCst) + 1 == expected {
                        done.set();
                    }
                    Ok(())
                })),
                Some(topology.to_object()),
            );
            if queue == WorkQueueId::STANDARD {
                platform.scheduler().schedule_work_item_ex(&result, cli.delay_ms)?;
            } else {
                platform.scheduler().put_work_item_ex(queue, &result)?;
            }
        }
    }

    if !done.wait_timeout(Duration::from_secs(cli.timeout)) {
        platform.shutdown();
        bail!(
            "only {} of {} work items completed",
            completed.load(Ordering::SeqCst),
            expected
        );
    }
    info!("All {} work items completed", expected);

    let metrics = platform.scheduler().metrics();
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    platform.scheduler().unlock_work_queue(serial)?;
    platform.scheduler().unlock_work_queue(private)?;
    platform.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_size_counts_every_queue() {
        assert_eq!(burst_size(16, 3).unwrap(), 48);
        assert_eq!(burst_size(1, 1).unwrap(), 1);
    }

    #[test]
    fn burst_size_rejects_empty_and_overflowing_bursts() {
        assert!(burst_size(0, 3).is_err());
        let err = burst_size(u32::MAX, 3).unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert!(burst_size(u32::MAX / 3, 3).is_ok());
    }
}
