use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use audio_profiler::analyze::{self, AnalyzeOptions};
use audio_profiler::record::{self, RecordOptions};
use audio_profiler::schema::VoiceCount;

#[derive(Debug, Parser)]
#[command(name = "audio-profiler", version, about = "Record and analyze audio engine performance counters")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record a profiling session against the simulated engine
    Record {
        /// Session length in seconds
        #[arg(long, default_value_t = 10.0)]
        duration: f64,

        /// Capture every Nth frame
        #[arg(long, default_value_t = 1)]
        interval: u32,

        /// Where the recording is written
        #[arg(long, default_value = "audio_profile.json")]
        output: PathBuf,

        /// Tick rate of the recording loop
        #[arg(long, default_value_t = 60.0)]
        fps: f64,

        /// Which channel counts feed the voices column
        #[arg(long, value_enum, default_value = "real")]
        voices: VoiceArg,

        /// Run the burst stress generator alongside the sampler
        #[arg(long)]
        stress: bool,

        /// RNG seed for the simulated engine and burst jitter
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Validate a recording against performance thresholds
    Analyze {
        /// Recording produced by `record`
        input: PathBuf,

        /// Optional thresholds JSON (defaults match the built-in budgets)
        #[arg(long)]
        thresholds: Option<PathBuf>,

        /// Where the structured report is written
        #[arg(long, default_value = "report.json")]
        report: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VoiceArg {
    /// Real (audible) channels only
    Real,
    /// Real plus virtualized channels
    RealPlusVirtual,
}

impl From<VoiceArg> for VoiceCount {
    fn from(arg: VoiceArg) -> Self {
        match arg {
            VoiceArg::Real => VoiceCount::Real,
            VoiceArg::RealPlusVirtual => VoiceCount::RealPlusVirtual,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Record {
            duration,
            interval,
            output,
            fps,
            voices,
            stress,
            seed,
        } => {
            let options = RecordOptions {
                duration_secs: duration,
                interval_frames: interval,
                output,
                fps,
                voices: voices.into(),
                stress,
                seed,
            };
            match record::run(options).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "recording failed");
                    ExitCode::FAILURE
                }
            }
        }
        Command::Analyze {
            input,
            thresholds,
            report,
        } => {
            let options = AnalyzeOptions {
                input,
                thresholds,
                report,
            };
            match analyze::run(&options) {
                Ok(analysis) if analysis.passed() => ExitCode::SUCCESS,
                Ok(_) => ExitCode::FAILURE,
                Err(e) => {
                    error!(error = %e, "analysis failed");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
