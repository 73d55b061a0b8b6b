//! Command-line entry point for the FleetLink gateway.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleetlink_core::DeviceId;
use fleetlink_gateway::{Gateway, GatewayConfig, HealthReport, telemetry};
use std::path::PathBuf;
use std::time::Duration;

/// FleetLink device gateway.
#[derive(Parser, Debug)]
#[command(name = "fleetlink-gateway")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file. Without it a simulated demo fleet is used.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run health-check rounds and print the final status table.
    Run {
        /// Number of rounds.
        #[arg(long, default_value_t = 3)]
        rounds: usize,
        /// Pause between rounds, in milliseconds.
        #[arg(long, default_value_t = 1000)]
        pause_ms: u64,
    },
    /// List registered adapters.
    Adapters,
    /// Health-check one configured device.
    Check {
        /// Device id from the config.
        device_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GatewayConfig::demo(),
    };
    telemetry::init(&config.logging)?;

    let gateway = Gateway::new(config)?;

    match args.command {
        Cmd::Run { rounds, pause_ms } => {
            gateway.run(rounds, Duration::from_millis(pause_ms)).await;
            print_status_table(&gateway).await;
            let stats = gateway.stats();
            println!(
                "\ncalls={} succeeded={} failed={} retried={} success_rate={:.1}%",
                stats.total,
                stats.succeeded,
                stats.failed,
                stats.retried,
                stats.success_rate() * 100.0
            );
        }
        Cmd::Adapters => {
            for (tag, descriptor) in gateway.adapter_descriptors() {
                println!("{tag:<10} {}", descriptor.summary());
            }
        }
        Cmd::Check { device_id } => {
            let report = gateway.check_device(&DeviceId::from(device_id)).await?;
            print_health(&report);
        }
    }

    Ok(())
}

async fn print_status_table(gateway: &Gateway) {
    println!("{:<12} {:<12} {:<25} ERROR", "DEVICE", "STATUS", "LAST HEARTBEAT");
    for record in gateway.status_table().await {
        println!(
            "{:<12} {:<12} {:<25} {}",
            record.device_id.as_str(),
            record.status.as_str(),
            record.last_heartbeat.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            record.last_error_message.as_deref().unwrap_or("-")
        );
    }
}

fn print_health(report: &HealthReport) {
    let verdict = if report.reachable { "reachable" } else { "unreachable" };
    println!(
        "{}: {} (status={}, retries={})",
        report.device_id, verdict, report.status, report.retry_count
    );
    if let Some(error) = &report.error {
        println!("  {error}");
    }
}
