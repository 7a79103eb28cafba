use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use rephoto::{config, correction, expression, landmarks, PoseAngles, PoseComparator};

#[derive(Parser)]
#[command(name = "rephoto")]
#[command(
    version,
    about = "Before/after face capture toolkit - pose correction and guidance"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply affine pose correction to an image
    Correct {
        /// Source image file
        input: PathBuf,
        /// Where to write the corrected image
        output: PathBuf,
        /// Measured roll in degrees
        #[arg(long, default_value_t = 0.0)]
        roll: f32,
        /// Measured pitch in degrees
        #[arg(long, default_value_t = 0.0)]
        pitch: f32,
        /// Measured yaw in degrees
        #[arg(long, default_value_t = 0.0)]
        yaw: f32,
        /// Optional JSON landmark frame for the nose-tip anchor
        #[arg(long)]
        landmarks: Option<PathBuf>,
    },
    /// Compare a live pose against a reference pose and print guidance
    Compare {
        /// Reference roll, pitch, yaw in degrees
        #[arg(long, num_args = 3, required = true, value_names = ["ROLL", "PITCH", "YAW"])]
        reference: Vec<f32>,
        /// Current roll, pitch, yaw in degrees
        #[arg(long, num_args = 3, required = true, value_names = ["ROLL", "PITCH", "YAW"])]
        current: Vec<f32>,
    },
    /// Run expression analysis over recorded landmark frames
    Score {
        /// JSON file: array of frames, each an array of 468 nullable points
        frames: PathBuf,
    },
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(None)?;

    match cli.command {
        Commands::Correct {
            input,
            output,
            roll,
            pitch,
            yaw,
            landmarks,
        } => correct(&input, &output, PoseAngles::new(roll, pitch, yaw), landmarks),
        Commands::Compare { reference, current } => compare(&cfg, &reference, &current),
        Commands::Score { frames } => score(&cfg, &frames),
        Commands::Config => open_config(),
    }
}

fn correct(
    input: &PathBuf,
    output: &PathBuf,
    pose: PoseAngles,
    landmark_file: Option<PathBuf>,
) -> Result<()> {
    let data = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;

    let frame: Option<landmarks::LandmarkSet> = match landmark_file {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            Some(serde_json::from_str(&raw).context("parsing landmark frame")?)
        }
        None => None,
    };

    info!(
        "correcting {} (roll={:.1} pitch={:.1} yaw={:.1})",
        input.display(),
        pose.roll,
        pose.pitch,
        pose.yaw
    );

    let result = correction::correct_image(&data, pose, frame.as_deref())
        .context("applying pose correction")?;

    result
        .corrected_image
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;

    let est = result.estimated_corrected_pose;
    info!(
        "✓ corrected image written to {} (estimated residual roll={:.1} pitch={:.1} yaw={:.1})",
        output.display(),
        est.roll,
        est.pitch,
        est.yaw
    );
    Ok(())
}

fn compare(cfg: &config::Config, reference: &[f32], current: &[f32]) -> Result<()> {
    let reference = PoseAngles::new(reference[0], reference[1], reference[2]);
    let current = PoseAngles::new(current[0], current[1], current[2]);

    let comparator = PoseComparator::new(cfg.tolerances);
    let comparison = comparator.compare(reference, current);

    println!("{}", comparator.comparison_summary(&comparison));
    println!("{}", comparator.generate_guidance(&comparison).message);
    Ok(())
}

fn score(cfg: &config::Config, frames_file: &PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(frames_file)
        .with_context(|| format!("reading {}", frames_file.display()))?;
    let frames: Vec<landmarks::LandmarkSet> =
        serde_json::from_str(&raw).context("parsing landmark frames")?;

    if frames.is_empty() {
        anyhow::bail!("no frames in {}", frames_file.display());
    }

    let mut analyzer = expression::ExpressionAnalyzer::with_thresholds(cfg.expression);

    for (i, frame) in frames.iter().enumerate() {
        let score = analyzer.analyze(frame);
        if let Some(progress) = score.calibration_progress {
            info!("frame {}: calibrating {:.0}%", i + 1, progress);
        } else if score.is_calibrated {
            let acceptable = analyzer.is_expression_acceptable(&score);
            info!(
                "frame {}: score {:.0} smile={:.2} eyebrow={:.2} tension={:.2}{}",
                i + 1,
                score.overall_score,
                score.mouth_smile,
                score.eyebrow_raise,
                score.eye_tension,
                if acceptable { "" } else { " (rejected)" }
            );
        } else {
            warn!("frame {}: unusable landmark set", i + 1);
        }
    }

    Ok(())
}

fn open_config() -> Result<()> {
    let config_path = config::CONFIG_PATH.as_os_str();
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
