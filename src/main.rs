use std::path::PathBuf;
use std::time::Instant;

use cardio_risk::batch::{BatchConfig, BatchDriver, FailurePolicy, DEFAULT_WORKERS};
use cardio_risk::io::{read_table, write_table};
use cardio_risk::report::RunReport;
use cardio_risk::RiskError;
use clap::Parser;
use env_logger::{Builder, Env};
use log::{debug, info, LevelFilter};
use sysinfo::{get_current_pid, ProcessExt, System, SystemExt};

/// Add the Framingham-10 and REGICOR scores to a patient table.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Patient table (xlsx, csv, tsv or parquet) whose first column is the row key
    #[arg(short, long)]
    infile: PathBuf,
    /// Output table: the input plus the framingham and regicor columns
    #[arg(short, long)]
    outfile: PathBuf,
    /// Verbose level, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Number of parallel scoring workers
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,
    /// Abort on the first row with a missing or non-numeric field
    #[arg(long)]
    fail_fast: bool,
    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn monitor_memory() -> u64 {
    /* Resident memory of this process in bytes, 0 when it cannot be read */
    let mut sys = System::new();
    match get_current_pid() {
        Ok(pid) => {
            sys.refresh_process(pid);
            sys.process(pid).map(|p| p.memory()).unwrap_or(0)
        }
        Err(_) => 0,
    }
}

#[tokio::main]
async fn main() -> Result<(), RiskError> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let env = Env::new().filter("CARDIO_LOG");
    Builder::new()
        .filter(Some("cardio_risk"), log_level)
        .parse_env(env)
        .init();

    debug!("Arguments {:#?}", args);

    let start_time = Instant::now();
    let start_memory = monitor_memory();
    info!("start cardio-risk");

    let config = BatchConfig {
        workers: args.workers,
        failure_policy: if args.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Isolate
        },
    };
    let driver = BatchDriver::new(config)?;

    info!("Loading {:?}", args.infile);
    let df = read_table(&args.infile).await?;

    info!("Calculating framingham and regicor scores");
    let mut scored = driver.score_table(df)?;

    info!("Writing {:?}", args.outfile);
    write_table(&args.outfile, &mut scored.frame).await?;

    let duration = start_time.elapsed();
    if let Some(path) = &args.report {
        let report = RunReport {
            infile: args.infile.clone(),
            outfile: args.outfile.clone(),
            workers: driver.config().workers,
            elapsed_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            summary: scored.summary,
        };
        report.write(path)?;
        info!("Run report written to {:?}", path);
    }

    let end_memory = monitor_memory();
    info!("Time elapsed: {:?}", duration);
    info!(
        "Memory used: {} bytes",
        end_memory.saturating_sub(start_memory)
    );
    info!("end cardio-risk");

    Ok(())
}
