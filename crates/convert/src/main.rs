#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Elevate export converter
//!
//! Turns the legacy platform's CSV exports into the JSON batch uploaded to
//! the customer import endpoint.

mod convert;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::convert::{ConversionSummary, Converter};

#[derive(Parser, Debug)]
#[command(
    name = "elevate-convert",
    version,
    about = "Convert legacy platform CSV exports into a customer import batch"
)]
struct Args {
    /// Customer export (required)
    customers: PathBuf,

    /// Subscription export; only active memberships are kept
    subscriptions: Option<PathBuf>,

    /// Order export
    orders: Option<PathBuf>,

    /// Where to write the JSON batch
    #[arg(short, long, default_value = "customers.json")]
    output: PathBuf,
}

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();
    let mut converter = Converter::new();

    tracing::info!(path = %args.customers.display(), "Reading customers");
    converter
        .load_customers(open(&args.customers)?)
        .with_context(|| format!("Failed to read {}", args.customers.display()))?;

    if let Some(path) = &args.subscriptions {
        tracing::info!(path = %path.display(), "Reading subscriptions");
        converter
            .load_subscriptions(open(path)?)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }

    if let Some(path) = &args.orders {
        tracing::info!(path = %path.display(), "Reading order history");
        converter
            .load_orders(open(path)?)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }

    let records = converter.finish();
    let summary = ConversionSummary::of(&records);

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::info!(
        output = %args.output.display(),
        total = summary.total,
        with_subscriptions = summary.with_subscriptions,
        with_orders = summary.with_orders,
        "Conversion complete; upload the file to the import endpoint"
    );

    Ok(())
}
