//! Reliability simulator - command line entry point
//!
//! Loads a configuration, applies command line overrides and runs a Monte
//! Carlo batch either behind the terminal dashboard or headless, printing
//! one line per trial and the batch summary.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use ecdc_sim::erasure::{ChunkPlacement, ErasureCodeConfig};
use ecdc_sim::simulation::TrialUpdate;
use ecdc_sim::{BatchRunner, Dashboard, Result, SimConfig};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("ecdc-sim")
        .version("0.1.0")
        .about("Monte Carlo reliability simulation of erasure-coded storage clusters")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("trials")
                .short('t')
                .long("trials")
                .value_name("COUNT")
                .help("Number of independent trials")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .value_name("SEED")
                .help("Base seed of the batch")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("COUNT")
                .help("Parallel workers, 0 for one per core")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("racks")
                .long("racks")
                .value_name("COUNT")
                .help("Number of racks")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("nodes-per-rack")
                .long("nodes-per-rack")
                .value_name("COUNT")
                .help("Nodes in every rack")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("disks-per-node")
                .long("disks-per-node")
                .value_name("COUNT")
                .help("Disks in every node")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("stripes")
                .long("stripes")
                .value_name("COUNT")
                .help("Stripes placed per trial")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("mission-time")
                .long("mission-time")
                .value_name("HOURS")
                .help("Simulated horizon of every trial")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("n")
                .short('n')
                .long("width")
                .value_name("N")
                .help("Reed-Solomon stripe width")
                .requires("k")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("k")
                .short('k')
                .long("data-chunks")
                .value_name("K")
                .help("Reed-Solomon data chunks per stripe")
                .requires("n")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("placement")
                .long("placement")
                .value_name("POLICY")
                .help("Chunk placement policy")
                .value_parser(["flat", "hierarchical"]),
        )
        .arg(
            Arg::new("transient")
                .long("transient")
                .help("Enable transient node and rack failures")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("power-outage")
                .long("power-outage")
                .help("Model rack failures as data-center wide power outages")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-network")
                .long("no-network")
                .help("Ignore repair bandwidth contention")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("FILE")
                .help("Write logs to a file (filter with RUST_LOG)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("headless")
                .long("headless")
                .help("Run without terminal UI")
                .action(ArgAction::SetTrue),
        )
}

/// Configuration file (or defaults) with command line overrides applied
fn load_config(matches: &ArgMatches) -> Result<SimConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };

    if let Some(&trials) = matches.get_one::<usize>("trials") {
        config.batch.trials = trials;
    }
    if let Some(&seed) = matches.get_one::<u64>("seed") {
        config.batch.seed = seed;
    }
    if let Some(&workers) = matches.get_one::<usize>("workers") {
        config.batch.workers = workers;
    }
    if let Some(&racks) = matches.get_one::<usize>("racks") {
        config.datacenter.racks = racks;
    }
    if let Some(&nodes) = matches.get_one::<usize>("nodes-per-rack") {
        config.datacenter.nodes_per_rack = nodes;
    }
    if let Some(&disks) = matches.get_one::<usize>("disks-per-node") {
        config.datacenter.disks_per_node = disks;
    }
    if let Some(&stripes) = matches.get_one::<usize>("stripes") {
        config.datacenter.stripes = stripes;
    }
    if let Some(&hours) = matches.get_one::<f64>("mission-time") {
        config.datacenter.mission_time = hours;
    }
    if let (Some(&n), Some(&k)) = (matches.get_one::<usize>("n"), matches.get_one::<usize>("k")) {
        let placement = config.erasure_code.placement;
        config.erasure_code = ErasureCodeConfig::rs(n, k).with_placement(placement);
    }
    if let Some(policy) = matches.get_one::<String>("placement") {
        config.erasure_code.placement = match policy.as_str() {
            "hierarchical" => ChunkPlacement::Hierarchical,
            _ => ChunkPlacement::Flat,
        };
    }
    if matches.get_flag("transient") {
        config.running.enable_transient_failure = true;
    }
    if matches.get_flag("power-outage") {
        config.running.use_power_outage = true;
    }
    if matches.get_flag("no-network") {
        config.network.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

/// Logs go to stderr in headless mode, to `log_file` when given, and nowhere
/// while the dashboard owns the terminal.
fn init_logging(log_file: Option<&PathBuf>, headless: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Some(path) = log_file {
        let file = File::create(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else if headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn describe(config: &SimConfig) -> String {
    let dc = &config.datacenter;
    let code = &config.erasure_code;
    format!(
        "{:?}({}, {}) {:?} | {} racks x {} nodes x {} disks | {} stripes",
        code.code_type,
        code.n,
        code.k,
        code.placement,
        dc.racks,
        dc.nodes_per_rack,
        dc.disks_per_node,
        dc.stripes
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let headless = matches.get_flag("headless");
    init_logging(matches.get_one::<PathBuf>("log-file"), headless)?;

    let config = load_config(&matches)?;
    let title = describe(&config);
    let total = config.batch.trials;
    let runner = BatchRunner::new(config)?;

    if headless {
        run_headless(runner, &title).await
    } else {
        run_dashboard(runner, title, total).await
    }
}

/// Print every trial as it finishes, then the summary
async fn run_headless(runner: BatchRunner, title: &str) -> Result<()> {
    println!("{}", title);
    println!();

    let (tx, mut rx) = mpsc::unbounded_channel::<TrialUpdate>();
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            let r = &update.result;
            println!(
                "[{:>6}/{}] trial {:>6}: {} failed stripes {:>5} lost chunks {:>6} blocked {:.3e} at {:.1} h",
                update.completed,
                update.total,
                r.trial,
                if r.data_loss { "LOSS" } else { "ok  " },
                r.failed_stripes,
                r.lost_chunks,
                r.blocked_ratio,
                r.end_time
            );
        }
    });

    let (summary, _) = runner.run(Some(tx)).await?;
    let _ = printer.await;

    println!();
    println!("{}", summary);
    Ok(())
}

/// Run the batch in the background while the dashboard renders it
async fn run_dashboard(runner: BatchRunner, title: String, total: usize) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let control = runner.control();
    let batch = tokio::spawn(async move { runner.run(Some(tx)).await });

    let mut dashboard = Dashboard::new(title, total)?;
    let shown = dashboard.run(rx, control).await?;
    drop(dashboard);

    match batch.await {
        Ok(Ok((summary, _))) => println!("{}", summary),
        Ok(Err(e)) => return Err(e),
        // The runtime only aborts the batch on shutdown; report what we saw
        Err(_) => println!("{}", shown),
    }
    Ok(())
}
