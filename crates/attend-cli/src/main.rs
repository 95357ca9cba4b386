use anyhow::{bail, Result};
use attend_core::{
    AttendanceLog, AttendanceRecord, CooldownGate, EventPipeline, GeometryClassifier,
    JsonLinesSource, LandmarkScheme, LandmarkSource, PlaceholderResolver, Thresholds,
};
use clap::{Parser, Subcommand};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod offline;

use offline::OffsetClock;

// D-Bus proxy: `#[zbus::proxy]` generates `AttendProxy` (async) and
// `AttendProxyBlocking`. Only the async variant is used here.
#[zbus::proxy(
    interface = "io.attend.Attend1",
    default_service = "io.attend.Attend1",
    default_path = "/io/attend/Attend1"
)]
trait Attend {
    async fn list_pending(&self) -> zbus::Result<String>;
    async fn confirm(&self, identity: &str, timestamp: &str) -> zbus::Result<bool>;
    async fn history(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "attend", about = "Attend attendance CLI")]
struct Cli {
    /// Talk to attendd on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List attendance records awaiting confirmation
    Pending,
    /// Confirm a pending attendance record
    Confirm {
        /// Identity of the record (e.g., "person")
        identity: String,
        /// Timestamp of the record, "YYYY-MM-DD HH:MM:SS"
        timestamp: String,
    },
    /// List every attendance record
    History,
    /// Show daemon status
    Status,
    /// Classify the faces of a landmark recording (JSON Lines, `-` for stdin)
    Classify {
        input: String,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Run the attendance pipeline over a landmark recording into a log file
    Replay {
        input: String,
        /// Attendance log to append to
        #[arg(short, long)]
        log: PathBuf,
        /// Minimum seconds between two events for one identity
        #[arg(long, default_value_t = 15)]
        cooldown_secs: u64,
        /// Identity key assigned to every face
        #[arg(long, default_value = attend_core::identity::DEFAULT_PLACEHOLDER_IDENTITY)]
        identity: String,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
}

#[derive(clap::Args)]
struct ThresholdArgs {
    /// MAR at or above which an open mouth counts towards happy
    #[arg(long, default_value_t = Thresholds::default().mar_happy)]
    mar_happy: f32,
    /// Cheek-lift (px) below which the mouth corner counts as raised
    #[arg(long, default_value_t = Thresholds::default().cheek_lift_max)]
    cheek_lift_max: f32,
    /// EAR below which the eyes count as closing
    #[arg(long, default_value_t = Thresholds::default().ear_tired)]
    ear_tired: f32,
}

impl ThresholdArgs {
    fn classifier(&self) -> GeometryClassifier {
        GeometryClassifier::new(
            LandmarkScheme::IBUG_68,
            Thresholds {
                mar_happy: self.mar_happy,
                cheek_lift_max: self.cheek_lift_max,
                ear_tired: self.ear_tired,
            },
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pending => {
            let proxy = connect(cli.system).await?;
            let records: Vec<AttendanceRecord> = serde_json::from_str(&proxy.list_pending().await?)?;
            if records.is_empty() {
                println!("No pending attendance");
            } else {
                print_records(&records);
            }
        }
        Commands::Confirm {
            identity,
            timestamp,
        } => {
            let proxy = connect(cli.system).await?;
            if proxy.confirm(&identity, &timestamp).await? {
                println!("Confirmed {identity} at {timestamp}");
            } else {
                bail!("no pending attendance for {identity} at {timestamp}");
            }
        }
        Commands::History => {
            let proxy = connect(cli.system).await?;
            let records: Vec<AttendanceRecord> = serde_json::from_str(&proxy.history().await?)?;
            print_records(&records);
        }
        Commands::Status => match connect(cli.system).await {
            Ok(proxy) => {
                let status: serde_json::Value = serde_json::from_str(&proxy.status().await?)?;
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            Err(e) => {
                tracing::debug!(error = %e, "D-Bus connection failed");
                println!("attendd: not connected");
            }
        },
        Commands::Classify { input, thresholds } => {
            let mut source = open_input(&input)?;
            let reports = offline::classify_stream(source.as_mut(), &thresholds.classifier())?;
            for r in &reports {
                match &r.outcome {
                    Ok((label, m)) => println!(
                        "frame {} face {}: {label} (ear={:.3} mar={:.3} cheek_lift={:.1})",
                        r.frame, r.face, m.ear, m.mar, m.cheek_lift
                    ),
                    Err(e) => println!("frame {} face {}: invalid: {e}", r.frame, r.face),
                }
            }
        }
        Commands::Replay {
            input,
            log,
            cooldown_secs,
            identity,
            thresholds,
        } => {
            let mut source = open_input(&input)?;
            let log = Arc::new(AttendanceLog::open(&log)?);
            let clock = OffsetClock::new(chrono::Local::now().naive_local());
            let mut pipeline = EventPipeline::new(
                thresholds.classifier(),
                PlaceholderResolver::new(identity),
                CooldownGate::new(Duration::from_secs(cooldown_secs)),
                Arc::clone(&log),
            )
            .with_clock(clock.clone());

            let summary = offline::replay(source.as_mut(), &mut pipeline, &clock)?;
            print_records(&summary.records);
            println!(
                "{} frames, {} faces: {} recorded, {} suppressed, {} invalid → {}",
                summary.frames,
                summary.faces,
                summary.records.len(),
                summary.suppressed,
                summary.invalid_faces,
                log.path().display()
            );
        }
    }

    Ok(())
}

async fn connect(system: bool) -> Result<AttendProxy<'static>> {
    let conn = if system {
        zbus::Connection::system().await?
    } else {
        zbus::Connection::session().await?
    };
    Ok(AttendProxy::new(&conn).await?)
}

fn open_input(input: &str) -> Result<Box<dyn LandmarkSource>> {
    if input == "-" {
        return Ok(Box::new(JsonLinesSource::new(BufReader::new(std::io::stdin()))));
    }
    Ok(Box::new(JsonLinesSource::open(input)?))
}

fn print_records(records: &[AttendanceRecord]) {
    for r in records {
        println!(
            "{:<16} {}  {:<9} {}",
            r.identity.as_str(),
            r.timestamp,
            r.status.to_string(),
            r.emotion
        );
    }
}
