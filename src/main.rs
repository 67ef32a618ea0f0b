use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, File};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use witrn_lib::{Decoder, decode_hex_payload};

mod replay;

use replay::Line;

/// Decode WITRN meter capture frames (general reports and USB PD messages)
/// from hex strings.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Hex-encoded frames, decoded in order as one capture session.
    frames: Vec<String>,
    /// Replay file with one hex frame per line. `#` starts a comment and a
    /// `---` line starts a new session. May be given more than once.
    #[arg(short, long = "file")]
    files: Vec<PathBuf>,
    /// Print one JSON report per frame instead of the indented tree.
    #[arg(long)]
    json: bool,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn setup_logging(
    log_file_path: Option<PathBuf>,
    verbosity: &Verbosity<InfoLevel>,
) -> Result<Option<WorkerGuard>> {
    // Reports go to stdout, so logs go to stderr
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path)
            .with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v, TRACE with -vv; RUST_LOG overrides
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[derive(Debug, Default)]
struct Stats {
    decoded: usize,
    failed: usize,
}

struct Session<'a> {
    decoder: Decoder,
    json: bool,
    stats: &'a mut Stats,
}

impl<'a> Session<'a> {
    fn new(json: bool, stats: &'a mut Stats) -> Self {
        Self {
            decoder: Decoder::new(),
            json,
            stats,
        }
    }

    fn restart(&mut self, source: &str) {
        debug!(source, "Starting new session");
        self.decoder.reset();
    }

    /// Decode and print one frame. Failures are logged and counted.
    fn frame(&mut self, source: &str, line: usize, payload: &str) {
        let index = self.stats.decoded + self.stats.failed + 1;
        match decode_hex_payload(&mut self.decoder, payload) {
            Ok(report) => {
                self.stats.decoded += 1;
                if self.json {
                    match report.to_json() {
                        Ok(json) => println!("{}", json),
                        Err(e) => error!(source, line, "Failed to serialize report: {}", e),
                    }
                } else {
                    println!(
                        "#{} {} {}",
                        index,
                        report.message,
                        report.pd_message_type.unwrap_or_default()
                    );
                    print!("{}", report.tree);
                }
            }
            Err(e) => {
                self.stats.failed += 1;
                warn!(source, line, "Frame #{} rejected: {}", index, e);
            }
        }
    }

    fn replay(
        &mut self,
        source: &str,
        lines: impl Iterator<Item = io::Result<String>>,
    ) -> Result<()> {
        self.restart(source);
        for (n, line) in lines.enumerate() {
            let line = line.with_context(|| format!("Failed to read {}", source))?;
            match replay::classify(&line) {
                Line::Frame(payload) => self.frame(source, n + 1, payload),
                Line::SessionBreak => self.restart(source),
                Line::Skip => {}
            }
        }
        Ok(())
    }
}

fn run(cli: &Cli) -> Result<Stats> {
    let mut stats = Stats::default();
    let mut session = Session::new(cli.json, &mut stats);

    if !cli.frames.is_empty() {
        session.restart("arguments");
        for (n, payload) in cli.frames.iter().enumerate() {
            session.frame("arguments", n + 1, payload);
        }
    }

    for path in &cli.files {
        let source = path.display().to_string();
        info!(%source, "Replaying capture file");
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file: {:?}", path))?;
        session.replay(&source, text.lines().map(|l| Ok(l.to_string())))?;
    }

    if cli.frames.is_empty() && cli.files.is_empty() {
        session.replay("stdin", io::stdin().lock().lines())?;
    }

    Ok(stats)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    let stats = run(&cli)?;
    info!(decoded = stats.decoded, failed = stats.failed, "Done");

    if stats.failed > 0 {
        drop(_guard);
        process::exit(1);
    }
    Ok(())
}
