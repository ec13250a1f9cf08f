//! motley CLI — teach and recognize compound colored objects in images.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use motley_core::{
    load_model, rgb_to_hsv, save_model, CompositeConfig, CompositeObject, ModelData, PartModel,
    DEFAULT_MATCH_TOLERANCE,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "motley")]
#[command(about = "Recognize compound colored objects (costumes of colored parts) in images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect parts and match taught poses in an image.
    Detect(CliDetectArgs),

    /// Add color samples for a part from a clicked image point.
    TeachColor(CliTeachColorArgs),

    /// Teach a part's reference silhouette from a clicked image point.
    TeachShape(CliTeachShapeArgs),

    /// Teach the invariant pose of whatever detection contains a point.
    TeachPose(CliTeachPoseArgs),

    /// Set a per-part tunable in the model file.
    SetParam(CliSetParamArgs),

    /// Print a summary of a model file.
    ModelInfo {
        /// Path to the model file (JSON).
        #[arg(long)]
        model: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct CliCompositeArgs {
    /// Path to the model file (JSON). Created by the teach commands.
    #[arg(long)]
    model: PathBuf,

    /// Part names to recognize, in addition to those in the model file.
    #[arg(long, value_delimiter = ',')]
    parts: Vec<String>,

    /// Part whose centroid is the invariant-frame origin.
    #[arg(long)]
    anchor_a: String,

    /// Part whose centroid fixes the invariant-frame scale and axis.
    #[arg(long)]
    anchor_b: String,

    /// Max-norm pose match tolerance.
    #[arg(long, default_value_t = DEFAULT_MATCH_TOLERANCE)]
    tolerance: f64,
}

#[derive(Debug, Clone, Args)]
struct CliDetectArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    #[command(flatten)]
    composite: CliCompositeArgs,

    /// Path to write the frame result (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Path to write the annotated overlay image.
    #[arg(long)]
    overlay: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliTeachColorArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path to the model file (JSON); created if missing.
    #[arg(long)]
    model: PathBuf,

    /// Part to add the samples to; created if missing.
    #[arg(long)]
    part: String,

    /// Clicked pixel x.
    #[arg(long)]
    x: u32,

    /// Clicked pixel y.
    #[arg(long)]
    y: u32,

    /// Half-size of the sampled square patch; 0 samples the single pixel.
    #[arg(long, default_value = "0")]
    patch: u32,
}

#[derive(Debug, Clone, Args)]
struct CliTeachShapeArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path to the model file (JSON).
    #[arg(long)]
    model: PathBuf,

    /// Part whose silhouette to teach.
    #[arg(long)]
    part: String,

    /// Clicked pixel x.
    #[arg(long)]
    x: i32,

    /// Clicked pixel y.
    #[arg(long)]
    y: i32,
}

#[derive(Debug, Clone, Args)]
struct CliTeachPoseArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    #[command(flatten)]
    composite: CliCompositeArgs,

    /// Clicked pixel x.
    #[arg(long)]
    x: i32,

    /// Clicked pixel y.
    #[arg(long)]
    y: i32,
}

#[derive(Debug, Clone, Args)]
struct CliSetParamArgs {
    /// Path to the model file (JSON).
    #[arg(long)]
    model: PathBuf,

    /// Part whose tunable to set.
    #[arg(long)]
    part: String,

    /// Tunable name (open, close, blur, threshold, contour_threshold).
    #[arg(long)]
    name: String,

    /// New value.
    #[arg(long)]
    value: i64,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::TeachColor(args) => run_teach_color(&args),
        Commands::TeachShape(args) => run_teach_shape(&args),
        Commands::TeachPose(args) => run_teach_pose(&args),
        Commands::SetParam(args) => run_set_param(&args),
        Commands::ModelInfo { model } => run_model_info(&model),
    }
}

// ── shared helpers ─────────────────────────────────────────────────────

fn load_rgb(path: &Path) -> CliResult<image::RgbImage> {
    let img = image::open(path)
        .map_err(|e| -> CliError { format!("failed to open image {}: {}", path.display(), e).into() })?;
    Ok(img.to_rgb8())
}

fn load_model_or_empty(path: &Path) -> CliResult<ModelData> {
    if path.exists() {
        Ok(load_model(path)?)
    } else {
        tracing::info!("model file {} not found, starting empty", path.display());
        Ok(ModelData::new())
    }
}

fn build_composite(args: &CliCompositeArgs) -> CliResult<CompositeObject> {
    let data = load_model_or_empty(&args.model)?;
    let mut names: Vec<String> = data.keys().cloned().collect();
    for part in &args.parts {
        if !names.iter().any(|n| n == part) {
            names.push(part.clone());
        }
    }
    let mut config = CompositeConfig::new(args.anchor_a.clone(), args.anchor_b.clone());
    config.match_tolerance = args.tolerance;
    Ok(CompositeObject::from_data(names, config, data)?)
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(args: &CliDetectArgs) -> CliResult<()> {
    let frame = load_rgb(&args.image)?;
    tracing::info!("image size: {}x{}", frame.width(), frame.height());

    let mut composite = build_composite(&args.composite)?;
    let (overlay, result) = composite.process(&frame);

    tracing::info!(
        "detections: {}, matches: {}",
        result.detections.values().sum::<usize>(),
        result.matches.len()
    );

    let json = serde_json::to_string_pretty(&result)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("result written to {}", args.out.display());

    if let Some(path) = &args.overlay {
        overlay.save(path)?;
        tracing::info!("overlay written to {}", path.display());
    }

    Ok(())
}

// ── teach-color ────────────────────────────────────────────────────────

fn run_teach_color(args: &CliTeachColorArgs) -> CliResult<()> {
    let frame = load_rgb(&args.image)?;
    let hsv = rgb_to_hsv(&frame);
    if args.x >= hsv.width() || args.y >= hsv.height() {
        return Err(format!(
            "point ({}, {}) is outside the {}x{} image",
            args.x,
            args.y,
            hsv.width(),
            hsv.height()
        )
        .into());
    }

    let mut data = load_model_or_empty(&args.model)?;
    let stored = data.remove(&args.part).unwrap_or_default();
    let mut part = PartModel::from_data(args.part.clone(), stored)?;

    let x0 = args.x.saturating_sub(args.patch);
    let y0 = args.y.saturating_sub(args.patch);
    let x1 = (args.x + args.patch).min(hsv.width() - 1);
    let y1 = (args.y + args.patch).min(hsv.height() - 1);
    let mut added = 0usize;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let px = hsv.get_pixel(x, y);
            part.add_color_sample(&[px[0] as f64, px[1] as f64, px[2] as f64])?;
            added += 1;
        }
    }
    tracing::info!(
        "added {} samples to part {} ({} total, trained: {})",
        added,
        args.part,
        part.color().sample_count(),
        part.color().is_trained()
    );

    data.insert(args.part.clone(), part.to_data());
    save_model(&args.model, &data)?;
    Ok(())
}

// ── teach-shape ────────────────────────────────────────────────────────

fn run_teach_shape(args: &CliTeachShapeArgs) -> CliResult<()> {
    let frame = load_rgb(&args.image)?;
    let hsv = rgb_to_hsv(&frame);

    let mut data = load_model_or_empty(&args.model)?;
    let stored = data
        .remove(&args.part)
        .ok_or_else(|| -> CliError { format!("part {} not in model file", args.part).into() })?;
    let mut part = PartModel::from_data(args.part.clone(), stored)?;

    if part.teach_shape(&hsv, args.x, args.y) {
        tracing::info!("reference silhouette taught for part {}", args.part);
    } else {
        tracing::warn!("no contour at ({}, {}); reference cleared", args.x, args.y);
    }

    data.insert(args.part.clone(), part.to_data());
    save_model(&args.model, &data)?;
    Ok(())
}

// ── teach-pose ─────────────────────────────────────────────────────────

fn run_teach_pose(args: &CliTeachPoseArgs) -> CliResult<()> {
    let frame = load_rgb(&args.image)?;

    let mut composite = build_composite(&args.composite)?;
    composite.teach_pose(args.x, args.y);
    let (_, result) = composite.process(&frame);

    if result.pose_taught {
        tracing::info!("pose taught at ({}, {})", args.x, args.y);
    } else {
        tracing::warn!("no detection at ({}, {}); nothing taught", args.x, args.y);
    }

    save_model(&args.composite.model, &composite.to_data())?;
    Ok(())
}

// ── set-param ──────────────────────────────────────────────────────────

fn run_set_param(args: &CliSetParamArgs) -> CliResult<()> {
    let mut data = load_model_or_empty(&args.model)?;
    let entry = data.entry(args.part.clone()).or_default();
    entry.params.set(&args.name, args.value)?;
    tracing::info!("{}.{} = {}", args.part, args.name, args.value);
    save_model(&args.model, &data)?;
    Ok(())
}

// ── model-info ─────────────────────────────────────────────────────────

fn run_model_info(model: &Path) -> CliResult<()> {
    let data = load_model(model)?;
    println!("model {} ({} parts)", model.display(), data.len());
    for (name, stored) in &data {
        let part = PartModel::from_data(name.clone(), stored.clone())?;
        println!("  part {}", name);
        println!(
            "    color samples:   {} (trained: {})",
            part.color().sample_count(),
            part.color().is_trained()
        );
        if let Some(mean) = part.color().mean() {
            let formatted: Vec<String> = mean.iter().map(|v| format!("{:.1}", v)).collect();
            println!("    color mean:      [{}]", formatted.join(", "));
        }
        match part.shape().reference() {
            Some(reference) => println!("    shape reference: {} vertices", reference.len()),
            None => println!("    shape reference: none"),
        }
        println!("    taught poses:    {}", part.taught_poses().len());
        println!("    params:          {:?}", part.params());
    }
    Ok(())
}
