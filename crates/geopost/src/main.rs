use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use geopost_core::{
    trigger, DispatchMode, FixFileSupplier, LocationSample, LocationSupplier, Position,
    ProviderSet, RunMetadata, StaticSupplier, UploadDisposition, UploaderConfig, WorkResult,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload the device's last known location", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one location upload work unit
    Run(RunArgs),
    /// Print the JSON body that would be uploaded for a reading
    Payload(PayloadArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Latitude of a fixed reading
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,
    /// Longitude of a fixed reading
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
    /// Accuracy radius of the fixed reading, in metres
    #[arg(long, requires = "lat", value_parser = parse_accuracy)]
    accuracy: Option<f32>,
    /// JSON fix file(s) to read the last known location from; the most
    /// accurate fix wins when several are given
    #[arg(long = "fix-file", conflicts_with = "lat")]
    fix_files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Report as soon as the upload is dispatched instead of waiting for it
    #[arg(long)]
    detach: bool,
}

#[derive(Args, Debug)]
struct PayloadArgs {
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Payload(args) => {
            let sample = LocationSample::try_from(Position::new(args.lat, args.lon))?;
            println!("{}", serde_json::to_string(&sample)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let config = UploaderConfig::from_env().context("invalid uploader environment")?;
    let supplier = build_supplier(&args.source)?;
    let mode = if args.detach {
        DispatchMode::Detach
    } else {
        DispatchMode::Await
    };

    let meta = RunMetadata::new();
    info!(run_id = %meta.run_id, endpoint = %config.base_url, "triggering work unit");
    let report = trigger(supplier, &config, mode, &meta).await;

    // Keep the runtime alive until a detached upload has finished.
    if let UploadDisposition::Detached(handle) = report.upload {
        match handle.await {
            Ok(Ok(())) => info!(run_id = %report.run_id, "detached upload completed"),
            Ok(Err(err)) => warn!(run_id = %report.run_id, "detached upload failed: {err}"),
            Err(err) => warn!(run_id = %report.run_id, "detached upload task aborted: {err}"),
        }
    }

    Ok(ExitCode::from(exit_status(report.result)))
}

fn exit_status(result: WorkResult) -> u8 {
    match result {
        WorkResult::Success => 0,
        WorkResult::Failure => 1,
    }
}

fn parse_accuracy(raw: &str) -> Result<f32, String> {
    let accuracy: f32 = raw.parse().map_err(|err| format!("{err}"))?;
    if accuracy.is_finite() && accuracy >= 0.0 {
        Ok(accuracy)
    } else {
        Err(format!("accuracy must be a non-negative number of metres, got {raw}"))
    }
}

fn build_supplier(source: &SourceArgs) -> Result<Arc<dyn LocationSupplier>> {
    if let (Some(lat), Some(lon)) = (source.lat, source.lon) {
        let mut position = Position::new(lat, lon);
        if let Some(accuracy) = source.accuracy {
            position = position.with_accuracy(accuracy);
        }
        LocationSample::try_from_position(&position).context("invalid --lat/--lon reading")?;
        return Ok(Arc::new(StaticSupplier::new(position)));
    }

    match source.fix_files.as_slice() {
        [] => bail!("provide either --lat/--lon or at least one --fix-file"),
        [path] => Ok(Arc::new(FixFileSupplier::new(path))),
        paths => {
            let set = paths.iter().fold(ProviderSet::new(), |set, path| {
                set.with_provider(
                    path.display().to_string(),
                    Arc::new(FixFileSupplier::new(path)),
                )
            });
            Ok(Arc::new(set))
        }
    }
}
