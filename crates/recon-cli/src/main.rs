use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};
use recon_core::{CalibrationPoint, Real};
use recon_pipeline::records::{SolveResponse, TrajectoryPoint};
use recon_pipeline::session::HomographySession;
use recon_pipeline::{AnalysisConfig, ProjectInput, ProjectReport, analyze_project, track_trajectory};
use serde::{Deserialize, Serialize};

/// Accident reconstruction CLI.
#[derive(Debug, Parser)]
#[command(author, version, about = "Ground-plane calibration and collision analysis")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Solve a calibration from a JSON array of CalibrationPoint.
    Solve {
        #[arg(long)]
        points: String,
        /// Optional path to JSON AnalysisConfig. Defaults are used if omitted.
        #[arg(long)]
        config: Option<String>,
        /// Write the resulting session here.
        #[arg(long)]
        session_out: Option<String>,
        #[arg(long, default_value = "session")]
        session_id: String,
        #[arg(long, default_value = "project")]
        project_id: String,
    },
    /// Map a normalized image point through a solved session.
    Map {
        #[arg(long)]
        session: String,
        #[arg(long)]
        x: Real,
        #[arg(long)]
        y: Real,
        /// Optional path to JSON AnalysisConfig; its mapping options apply.
        #[arg(long)]
        config: Option<String>,
    },
    /// Run the batch pass over a project's detections.
    Analyze {
        /// Path to JSON ProjectInput.
        #[arg(long)]
        input: String,
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        config: Option<String>,
        /// Print only the trajectory of this track.
        #[arg(long)]
        track: Option<u32>,
    },
}

/// Output of `map`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MappedPoint {
    x: Real,
    y: Real,
    world_x: Real,
    world_y: Real,
    lat: Real,
    lng: Real,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parse {}", path.display()))
}

fn load_config(path: Option<&str>) -> Result<AnalysisConfig> {
    let Some(path) = path else {
        return Ok(AnalysisConfig::default());
    };
    let data = fs::read_to_string(path).with_context(|| format!("read {path}"))?;
    AnalysisConfig::from_json(&data).with_context(|| format!("config {path}"))
}

fn load_session(path: &str) -> Result<HomographySession> {
    let data = fs::read_to_string(path).with_context(|| format!("read {path}"))?;
    HomographySession::from_json(&data).with_context(|| format!("session {path}"))
}

fn run_solve_from_files(
    points_path: &str,
    config_path: Option<&str>,
    session_out: Option<&str>,
    session_id: &str,
    project_id: &str,
) -> Result<String> {
    let points: Vec<CalibrationPoint> = load_json_file(Path::new(points_path))?;
    let config = load_config(config_path)?;

    let mut session = HomographySession::new(session_id, project_id);
    let report = session.replace_points(points)?;
    for rejected in &report.rejected {
        warn!("point {} skipped: {}", rejected.order_index, rejected.reason);
    }
    let response: SolveResponse = session.solve(&config.homography)?;

    if let Some(out) = session_out {
        fs::write(out, session.to_json()?).with_context(|| format!("write {out}"))?;
        info!("session written to {out}");
    }
    Ok(serde_json::to_string_pretty(&response)?)
}

fn run_map_from_files(
    session_path: &str,
    x: Real,
    y: Real,
    config_path: Option<&str>,
) -> Result<String> {
    let config = load_config(config_path)?;
    let session = load_session(session_path)?;
    let Some(solved) = session.solved() else {
        bail!("session {} is {}, not solved", session.id, session.status());
    };
    let world = solved.mapper(config.mapping).map_normalized(x, y)?;
    let geo = solved.projector.unproject(&world);
    let mapped = MappedPoint {
        x,
        y,
        world_x: world.x,
        world_y: world.y,
        lat: geo.lat,
        lng: geo.lng,
    };
    Ok(serde_json::to_string_pretty(&mapped)?)
}

fn run_analyze_from_files(
    input_path: &str,
    session_path: Option<&str>,
    config_path: Option<&str>,
    track: Option<u32>,
) -> Result<String> {
    let input: ProjectInput = load_json_file(Path::new(input_path))?;
    let session = session_path.map(load_session).transpose()?;
    let config = load_config(config_path)?;

    let report: ProjectReport = analyze_project(&input, session.as_ref(), &config)?;
    match track {
        Some(track_id) => {
            let trajectory: Vec<TrajectoryPoint> = track_trajectory(&report.detections, track_id);
            if trajectory.is_empty() {
                bail!("project {} has no track {track_id}", input.project_id);
            }
            Ok(serde_json::to_string_pretty(&trajectory)?)
        }
        None => Ok(serde_json::to_string_pretty(&report)?),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let json = match args.command {
        Command::Solve {
            points,
            config,
            session_out,
            session_id,
            project_id,
        } => run_solve_from_files(
            &points,
            config.as_deref(),
            session_out.as_deref(),
            &session_id,
            &project_id,
        )?,
        Command::Map { session, x, y, config } => {
            run_map_from_files(&session, x, y, config.as_deref())?
        }
        Command::Analyze {
            input,
            session,
            config,
            track,
        } => run_analyze_from_files(&input, session.as_deref(), config.as_deref(), track)?,
    };
    println!("{}", json);
    Ok(())
}
