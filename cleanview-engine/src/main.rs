//! cleanview - command-line entry point
//!
//! Thin shell over `cleanview_engine`: every subcommand loads its inputs,
//! calls one library operation and writes JSON or a text summary.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cleanview_common::fingerprint::fingerprint_file;
use cleanview_common::Action;
use cleanview_engine::detections::DetectionFile;
use cleanview_engine::pipeline::PipelineInput;
use cleanview_engine::project::sidecar_path;
use cleanview_engine::report::{project_timeline, summary_text, timeline_json};
use cleanview_engine::worker::{WorkerJob, WorkerPool};
use cleanview_engine::{DetectionPipeline, EditPlan, EngineConfig, Project};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cleanview
#[derive(Parser, Debug)]
#[command(name = "cleanview")]
#[command(about = "Detect objectionable content in a video and plan the edits that remove it")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "CLEANVIEW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score a transcript and frame scores, print the resulting edit plan
    Scan {
        /// Pipeline input JSON: `{"duration", "words", "frames", "visual_detections"}`
        input: PathBuf,

        /// Write the edit plan here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the planner's detections as a detection file
        #[arg(long)]
        detections: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Run the configured detection workers on a video
    Detect {
        video: PathBuf,

        /// Detection file to write (default: `<video>.detections.json`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build an edit plan from a detection file
    Plan {
        detections: PathBuf,

        /// Media duration in seconds
        #[arg(short, long)]
        duration: f64,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Edit a project sidecar file
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// Render a saved edit plan
    Report {
        plan: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectCommand {
    /// Create an empty project next to the video
    New {
        video: PathBuf,

        /// Media duration in seconds
        #[arg(short, long)]
        duration: f64,

        /// Frame rate used for snapping
        #[arg(long, default_value_t = 24.0)]
        fps: f64,

        /// Overwrite an existing project
        #[arg(long)]
        force: bool,
    },

    /// Print the project's edit timeline
    Show { video: PathBuf },

    /// Add a manual edit
    Add {
        video: PathBuf,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        end: f64,
        /// cut, mute, beep or blur
        #[arg(long, default_value = "cut")]
        action: String,
        #[arg(long, default_value = "")]
        reason: String,
    },

    /// Remove an edit by id
    Remove { video: PathBuf, id: String },

    /// Import every actionable interval of a detection file
    Import { video: PathBuf, detections: PathBuf },

    /// Turn ripple mode on or off
    Ripple {
        video: PathBuf,
        #[arg(value_enum)]
        mode: Toggle,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = EngineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("cleanview={level},cleanview_engine={level},cleanview_common={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Scan {
            input,
            output,
            detections,
            format,
        } => scan(&config, &input, output.as_deref(), detections.as_deref(), format),
        Command::Detect { video, output } => detect(&config, &video, output).await,
        Command::Plan {
            detections,
            duration,
            output,
            format,
        } => plan(&config, &detections, duration, output.as_deref(), format),
        Command::Project { command } => project(&config, command),
        Command::Report { plan, format } => {
            let content = std::fs::read_to_string(&plan)
                .with_context(|| format!("Failed to read plan {}", plan.display()))?;
            let plan: EditPlan = serde_json::from_str(&content).context("Invalid plan file")?;
            print_plan(&plan, format)
        }
    }
}

fn scan(
    config: &EngineConfig,
    input: &Path,
    output: Option<&Path>,
    detections: Option<&Path>,
    format: Format,
) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let input: PipelineInput = serde_json::from_str(&content).context("Invalid pipeline input")?;

    let pipeline = DetectionPipeline::from_config(config).context("Failed to build pipeline")?;
    let result = pipeline.run(&input);

    if let Some(path) = detections {
        DetectionFile::new(None, None, result.all_detections())
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Detections written to {}", path.display());
    }
    write_plan(&result.plan, output)?;
    print_plan(&result.plan, format)
}

async fn detect(config: &EngineConfig, video: &Path, output: Option<PathBuf>) -> Result<()> {
    let workers = &config.workers;
    let jobs: Vec<WorkerJob> = [
        ("audio", &workers.audio_command),
        ("visual", &workers.visual_command),
    ]
    .into_iter()
    .filter_map(|(name, command)| WorkerJob::from_command(name, command, video))
    .collect();

    if jobs.is_empty() {
        bail!("No detection workers configured; set [workers] audio_command or visual_command");
    }

    let hash = match fingerprint_file(video) {
        Ok(hash) => Some(hash),
        Err(e) => {
            warn!("Could not fingerprint {}: {}", video.display(), e);
            None
        }
    };

    let outputs = WorkerPool::new(workers.clone())
        .run_all(&jobs)
        .await
        .context("Detection workers failed")?;

    let mut detections: Vec<_> = outputs.into_iter().flat_map(|o| o.detections).collect();
    detections.sort_by(|a, b| a.start.total_cmp(&b.start));

    let path = output.unwrap_or_else(|| default_detections_path(video));
    let file = DetectionFile::new(Some(video.to_path_buf()), hash, detections);
    file.save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} detections written to {}", file.detection_count, path.display());
    Ok(())
}

fn plan(
    config: &EngineConfig,
    detections: &Path,
    duration: f64,
    output: Option<&Path>,
    format: Format,
) -> Result<()> {
    let file = DetectionFile::load(detections)
        .with_context(|| format!("Failed to read detections {}", detections.display()))?;
    let pipeline = DetectionPipeline::from_config(config).context("Failed to build pipeline")?;
    let plan = pipeline.plan_detections(duration, &file.detections);

    write_plan(&plan, output)?;
    print_plan(&plan, format)
}

fn project(config: &EngineConfig, command: ProjectCommand) -> Result<()> {
    let capacity = config.project.undo_capacity;

    match command {
        ProjectCommand::New {
            video,
            duration,
            fps,
            force,
        } => {
            let path = sidecar_path(&video);
            if path.exists() && !force {
                bail!("{} already exists (use --force to replace it)", path.display());
            }
            let mut project = Project::new(&video, duration, fps).with_undo_capacity(capacity);
            match fingerprint_file(&video) {
                Ok(hash) => project = project.with_fingerprint(hash),
                Err(e) => warn!("Could not fingerprint {}: {}", video.display(), e),
            }
            project.save(&path)?;
            println!("Created {}", path.display());
        }
        ProjectCommand::Show { video } => {
            let project = open_project(&video, capacity)?;
            println!("{}", serde_json::to_string_pretty(&project_timeline(&project))?);
        }
        ProjectCommand::Add {
            video,
            start,
            end,
            action,
            reason,
        } => {
            let action: Action = action.parse()?;
            let mut project = open_project(&video, capacity)?;
            let id = project.add_edit(start, end, action, reason)?;
            save_project(&project, &video)?;
            println!("{}", id);
        }
        ProjectCommand::Remove { video, id } => {
            let mut project = open_project(&video, capacity)?;
            let removed = project.remove_edit(&id)?;
            save_project(&project, &video)?;
            println!("Removed {} {:.3}-{:.3}", removed.action, removed.source_start, removed.source_end);
        }
        ProjectCommand::Import { video, detections } => {
            let file = DetectionFile::load(&detections)
                .with_context(|| format!("Failed to read detections {}", detections.display()))?;
            let mut project = open_project(&video, capacity)?;
            let ids = project.import_detections(&file.detections);
            save_project(&project, &video)?;
            println!("Imported {} of {} detections", ids.len(), file.detections.len());
        }
        ProjectCommand::Ripple { video, mode } => {
            let mut project = open_project(&video, capacity)?;
            project.set_ripple_mode(mode == Toggle::On);
            save_project(&project, &video)?;
            println!(
                "Ripple mode {}; output duration {:.3}s",
                if project.ripple_mode() { "on" } else { "off" },
                project.output_duration()
            );
        }
    }
    Ok(())
}

fn open_project(video: &Path, capacity: usize) -> Result<Project> {
    let path = sidecar_path(video);
    let fingerprint = fingerprint_file(video).ok();
    Project::load(&path, fingerprint.as_deref(), capacity)
        .with_context(|| format!("Failed to open project {}", path.display()))
}

fn save_project(project: &Project, video: &Path) -> Result<()> {
    let path = sidecar_path(video);
    project
        .save(&path)
        .with_context(|| format!("Failed to save project {}", path.display()))
}

fn write_plan(plan: &EditPlan, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        let json = serde_json::to_string_pretty(plan)?;
        cleanview_common::config::write_atomic(path, json.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Edit plan written to {}", path.display());
    }
    Ok(())
}

fn print_plan(plan: &EditPlan, format: Format) -> Result<()> {
    match format {
        Format::Text => print!("{}", summary_text(plan)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&timeline_json(plan))?),
    }
    Ok(())
}

fn default_detections_path(video: &Path) -> PathBuf {
    let mut name = video.file_name().unwrap_or_default().to_os_string();
    name.push(".detections.json");
    video.with_file_name(name)
}
