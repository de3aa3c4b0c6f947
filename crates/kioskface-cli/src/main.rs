use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kioskface_core::{
    extract_descriptor, DescriptorStore, DetectorError, FaceCandidate, Frame, KioskConfig, Matcher,
    NormalizedEmbedding, RecencyWeightedMatcher, RecordedDetector, RosterEntry, StoreHandle,
    VideoSource, ZoneFilter,
};
use kioskface_engine::{DetectionLoop, LoopEvent};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Parser)]
#[command(name = "kioskface", about = "Kiosk face check-in calibration and replay tool")]
struct Cli {
    /// TOML config file (defaults to $KIOSKFACE_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print capture-zone geometry for a frame size
    Zone {
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
    },
    /// Load a roster file and report matchable identities
    Roster {
        /// JSON array of {identityId, displayName, embeddings, photoUrl}
        path: PathBuf,
    },
    /// Match one embedding against a roster
    Match {
        #[arg(long)]
        roster: PathBuf,
        /// JSON array of floats
        #[arg(long)]
        query: PathBuf,
    },
    /// Pick the best face from recorded detections
    Select {
        /// JSON array of face candidates
        #[arg(long)]
        detections: PathBuf,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
    },
    /// Check an enrollment photo against recorded detections for it
    Enroll {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        detections: PathBuf,
    },
    /// Replay a recorded detection script through the detection loop
    Simulate {
        #[arg(long)]
        roster: PathBuf,
        /// JSON array of samples; each is a candidate array or {"error": "..."}
        #[arg(long)]
        script: PathBuf,
        #[arg(long, default_value_t = 640)]
        width: u32,
        #[arg(long, default_value_t = 480)]
        height: u32,
    },
}

/// One recorded detector result.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptStep {
    Faces(Vec<FaceCandidate>),
    Error { error: String },
}

/// Placeholder camera for replays. Stops producing frames once the
/// detector script is used up and signals `exhausted`.
struct ReplaySource {
    width: u32,
    height: u32,
    detector: Arc<RecordedDetector>,
    exhausted: Arc<Notify>,
}

impl VideoSource for ReplaySource {
    fn current_frame(&self) -> Option<Frame> {
        // The loop is sequential: an empty script here means the last
        // scripted sample has already been dispatched.
        if self.detector.remaining() == 0 {
            self.exhausted.notify_one();
            return None;
        }
        Some(Frame::blank(self.width, self.height, 0))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = kioskface_engine::config::load(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Zone { width, height } => {
            let zone = ZoneFilter::from(&config).zone(width, height);
            print_json(&json!({
                "left": zone.left,
                "top": zone.top,
                "right": zone.right(),
                "bottom": zone.bottom(),
                "side": zone.side,
            }))?;
        }
        Commands::Roster { path } => {
            let store = load_store(&path)?;
            let members: Vec<_> = store
                .members()
                .iter()
                .map(|m| json!({ "identityId": m.identity_id, "embeddings": m.embeddings.len() }))
                .collect();
            print_json(&json!({
                "generation": store.generation(),
                "matchable": store.len(),
                "dimensions": store.dimensions(),
                "members": members,
            }))?;
        }
        Commands::Match { roster, query } => {
            let store = load_store(&roster)?;
            let raw: Vec<f32> = read_json(&query)?;
            let query = NormalizedEmbedding::from_raw(&raw);
            let outcome = RecencyWeightedMatcher::new((&config).into()).find_best_match(&query, &store);
            print_json(&outcome)?;
        }
        Commands::Select {
            detections,
            width,
            height,
        } => {
            let faces: Vec<FaceCandidate> = read_json(&detections)?;
            let report = ZoneFilter::from(&config).select(&faces, width, height);
            print_json(&report)?;
        }
        Commands::Enroll { image, detections } => {
            let faces: Vec<FaceCandidate> = read_json(&detections)?;
            let frame = kioskface_core::frame::load_still_image(&image)?;
            let detector = RecordedDetector::fixed(faces);
            match extract_descriptor(&detector, &frame, &config.enrollment).await {
                Ok(descriptor) => print_json(&json!({ "accepted": true, "descriptor": descriptor }))?,
                Err(rejection) => print_json(&json!({
                    "accepted": false,
                    "reason": rejection.reason(),
                    "message": rejection.to_string(),
                }))?,
            }
        }
        Commands::Simulate {
            roster,
            script,
            width,
            height,
        } => simulate(config, &roster, &script, width, height).await?,
    }

    Ok(())
}

async fn simulate(
    config: KioskConfig,
    roster: &Path,
    script: &Path,
    width: u32,
    height: u32,
) -> Result<()> {
    let steps: Vec<ScriptStep> = read_json(script)?;
    let events = replay(config, load_store(roster)?, steps, width, height).await?;
    for event in &events {
        print_json(&describe(event))?;
    }
    Ok(())
}

/// Run `steps` through a detection loop, one sample per step, and collect
/// every event emitted for them.
async fn replay(
    config: KioskConfig,
    store: DescriptorStore,
    steps: Vec<ScriptStep>,
    width: u32,
    height: u32,
) -> Result<Vec<LoopEvent>> {
    let detector = Arc::new(RecordedDetector::script(steps.into_iter().map(|step| match step {
        ScriptStep::Faces(faces) => Ok(faces),
        ScriptStep::Error { error } => Err(DetectorError::InferenceFailed(error)),
    })));
    let exhausted = Arc::new(Notify::new());
    let source = Arc::new(ReplaySource {
        width,
        height,
        detector: Arc::clone(&detector),
        exhausted: Arc::clone(&exhausted),
    });

    let mut lane = DetectionLoop::new(config, Arc::clone(&detector), StoreHandle::new(store))?;
    let mut rx = lane.start(source).context("detection loop already running")?;

    exhausted.notified().await;
    lane.stop();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    tracing::info!(samples = detector.calls(), events = events.len(), "replay finished");
    Ok(events)
}

fn describe(event: &LoopEvent) -> serde_json::Value {
    match event {
        LoopEvent::Match(r) | LoopEvent::Uncertain(r) | LoopEvent::UnknownFace(r) => json!({
            "sequence": r.sequence,
            "event": event.kind(),
            "identityId": r.outcome.identity.as_ref().map(|m| m.identity_id.clone()),
            "adjustedDistance": r.outcome.adjusted_distance,
            "faceCount": r.face_count,
            "tooManyFaces": r.too_many_faces,
        }),
        LoopEvent::AdjustPosition {
            sequence,
            hint,
            face_count,
            too_many_faces,
        } => json!({
            "sequence": sequence,
            "event": event.kind(),
            "hint": hint,
            "faceCount": face_count,
            "tooManyFaces": too_many_faces,
        }),
        LoopEvent::NoFace { sequence } => json!({ "sequence": sequence, "event": event.kind() }),
        LoopEvent::Error { sequence, error } => json!({
            "sequence": sequence,
            "event": event.kind(),
            "message": error.to_string(),
        }),
    }
}

fn load_store(path: &Path) -> Result<DescriptorStore> {
    let roster: Vec<RosterEntry> = read_json(path)?;
    Ok(DescriptorStore::load(roster))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
