//! m3tools
//!
//! Command-line entry point for the content pipeline: level generation,
//! flow migrations and checks, narrative stage maintenance.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use m3_content::flows::{self, StepResolution};
use m3_content::levels::{self, LevelBatch};
use m3_content::{stages, ContentRoot, ContentWriter};
use m3_core::flow::{ExtractOptions, DEFAULT_TARGET_TYPES, DEFAULT_THRESHOLD};
use m3_core::layout::{OverlayConfig, Shape, DEFAULT_ATTEMPTS};
use m3_core::rating::REFERENCE_CASES;
use m3_core::{calculate_stars, GameRng, GeneratorConfig};

/// Content tools for the match-3 game
#[derive(Parser, Debug)]
#[command(name = "m3tools")]
#[command(author, version, about = "Generate levels and maintain game content", long_about = None)]
struct Cli {
    /// Project root containing `data/` and `levels/`
    #[arg(long, global = true, env = "M3TOOLS_ROOT", default_value = ".")]
    root: PathBuf,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Copy, Default)]
struct DryRun {
    /// Log what would change without touching any file
    #[arg(long = "dry-run")]
    dry_run: bool,
}

impl DryRun {
    fn writer(self) -> ContentWriter {
        ContentWriter::new(self.dry_run)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate level_NN.json files
    GenerateLevels {
        /// First level number
        #[arg(long, default_value_t = 11)]
        start: u32,
        /// Last level number (inclusive)
        #[arg(long, default_value_t = 50)]
        end: u32,
        /// Output directory, relative to the root
        #[arg(long, default_value = "levels")]
        out: PathBuf,
        #[arg(long, default_value_t = 8)]
        width: usize,
        #[arg(long, default_value_t = 8)]
        height: usize,
        /// RNG seed (random when omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Shape attempts per level before falling back
        #[arg(long, default_value_t = DEFAULT_ATTEMPTS)]
        attempts: usize,
        /// Collectibles per playable cell (0 for score levels)
        #[arg(long, default_value_t = 0.06)]
        density: f64,
        /// Obstacles per playable cell
        #[arg(long, default_value_t = 0.03)]
        obstacle_density: f64,
        /// Spreader tiles per level
        #[arg(long, default_value_t = 0)]
        spreaders: usize,
        /// Minimum Manhattan distance between collectibles
        #[arg(long, default_value_t = 2)]
        spacing: usize,
        /// Restrict to these shapes (comma separated)
        #[arg(long, value_delimiter = ',')]
        shape: Vec<Shape>,
        #[command(flatten)]
        dry: DryRun,
    },

    /// Check an existing level file
    InspectLevel { path: PathBuf },

    /// Extract repeated flow steps into shared definitions
    MigrateFlows {
        /// Step types to consider (comma separated)
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
        /// Minimum occurrences to extract
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: usize,
        #[command(flatten)]
        dry: DryRun,
    },

    /// Insert show_rewards steps after level steps
    AddShowRewards {
        /// Flow file (default: data/experience_flows/main_story.json)
        path: Option<PathBuf>,
        #[command(flatten)]
        dry: DryRun,
    },

    /// Convert stage `anchors` lists to a single `anchor`
    MigrateAnchors {
        #[command(flatten)]
        dry: DryRun,
    },

    /// Move level_*.json stages into data/narrative_stages/levels
    RelocateLevelStages {
        #[command(flatten)]
        dry: DryRun,
    },

    /// Create stage files from a catalogue
    CreateStages {
        catalogue: PathBuf,
        #[command(flatten)]
        dry: DryRun,
    },

    /// Report where each flow step definition is used
    ReportUsage,

    /// Fail when a flow references a missing definition
    CheckRefs,

    /// Show every step of a flow merged with its definition
    VerifyFlow { flow: PathBuf },

    /// Check definitions and effects of a flow
    ValidateFlow { flow: PathBuf },

    /// Star rating for a result, or the reference table
    Stars {
        #[arg(long, requires_all = ["target", "moves_used", "total_moves"])]
        score: Option<u64>,
        #[arg(long, requires_all = ["score", "moves_used", "total_moves"])]
        target: Option<u64>,
        #[arg(long, requires_all = ["score", "target", "total_moves"])]
        moves_used: Option<u32>,
        #[arg(long, requires_all = ["score", "target", "moves_used"])]
        total_moves: Option<u32>,
    },
}

impl Command {
    /// Writer for this command; read-only commands never write
    fn writer(&self) -> ContentWriter {
        let dry = match self {
            Command::GenerateLevels { dry, .. }
            | Command::MigrateFlows { dry, .. }
            | Command::AddShowRewards { dry, .. }
            | Command::MigrateAnchors { dry }
            | Command::RelocateLevelStages { dry }
            | Command::CreateStages { dry, .. } => *dry,
            _ => DryRun::default(),
        };
        dry.writer()
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Resolve `path` against the root unless it is absolute
fn under_root(root: &ContentRoot, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.root().join(path)
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let root = ContentRoot::new(&cli.root);
    let writer = cli.command.writer();

    match cli.command {
        Command::GenerateLevels {
            start,
            end,
            out,
            width,
            height,
            seed,
            attempts,
            density,
            obstacle_density,
            spreaders,
            spacing,
            shape,
            ..
        } => {
            if start > end {
                bail!("--start ({start}) is after --end ({end})");
            }
            let seed = seed.unwrap_or_else(|| GameRng::from_entropy().seed());
            let batch = LevelBatch {
                levels: start..=end,
                seed,
                config: GeneratorConfig {
                    width,
                    height,
                    attempts,
                    overlays: OverlayConfig {
                        collectible_density: density,
                        obstacle_density,
                        spreaders,
                        min_collectible_spacing: spacing,
                    },
                    shapes: shape,
                },
            };
            let out_dir = under_root(&root, &out);
            info!(seed, start, end, dir = %out_dir.display(), "generating levels");
            let written = levels::generate_levels(&out_dir, &batch, &writer)
                .with_context(|| format!("generating levels into {}", out_dir.display()))?;
            for level in &written {
                let note = if level.fell_back { " (fallback)" } else { "" };
                println!(
                    "{}: {} after {} attempt(s){note}",
                    file_label(&level.path),
                    level.shape,
                    level.attempts_used
                );
            }
            let fallbacks = written.iter().filter(|l| l.fell_back).count();
            println!(
                "Generated {} levels ({fallbacks} fell back to full_rectangle), seed {seed}",
                written.len()
            );
        }

        Command::InspectLevel { path } => {
            let path = under_root(&root, &path);
            let report = levels::inspect_level(&path)
                .with_context(|| format!("inspecting {}", path.display()))?;
            let level = &report.level;
            println!(
                "Level {}: {}x{}, target {}, {} moves",
                level.level_number, level.grid_width, level.grid_height, level.target_score, level.max_moves
            );
            println!(
                "Collectibles: {} (target {}), obstacles: {} soft / {} hard, spreaders: {}",
                report.collectibles,
                level.collectible_target,
                report.soft_obstacles,
                report.hard_obstacles,
                report.spreaders
            );
            for issue in &report.issues {
                println!("  - {issue}");
            }
            if !report.is_playable() || report.collectible_mismatch() {
                return Ok(ExitCode::FAILURE);
            }
            println!("OK");
        }

        Command::MigrateFlows {
            types,
            threshold,
            ..
        } => {
            let target_types = if types.is_empty() {
                DEFAULT_TARGET_TYPES.iter().map(|t| t.to_string()).collect()
            } else {
                types
            };
            let options = ExtractOptions {
                target_types,
                threshold,
            };
            let report = flows::migrate_flow_definitions(&root, &options, &writer)
                .context("migrating flow definitions")?;
            println!(
                "Created {} definitions, updated {} steps in {} flows",
                report.created.len(),
                report.updated.len(),
                report.patched.len()
            );
        }

        Command::AddShowRewards { path, .. } => {
            let path = path.map_or_else(|| root.main_story(), |p| under_root(&root, &p));
            let report = flows::add_show_rewards(&path, &writer)
                .with_context(|| format!("adding show_rewards to {}", path.display()))?;
            println!("Original flow had {} steps", report.original_steps);
            println!("New flow has {} steps", report.new_steps);
            println!("Added {} show_rewards steps", report.added.len());
        }

        Command::MigrateAnchors { .. } => {
            let report = stages::migrate_anchors(&root, &writer).context("migrating anchors")?;
            println!(
                "Updated {} stages ({} unchanged, {} unparsable)",
                report.updated.len(),
                report.unchanged.len(),
                report.unparsable.len()
            );
        }

        Command::RelocateLevelStages { .. } => {
            let moved =
                stages::relocate_level_stages(&root, &writer).context("relocating level stages")?;
            println!("Moved {} level stages", moved.len());
        }

        Command::CreateStages { catalogue, .. } => {
            let catalogue = under_root(&root, &catalogue);
            let report = stages::create_stages(&root, &catalogue, &writer)
                .with_context(|| format!("creating stages from {}", catalogue.display()))?;
            println!(
                "Created {} stages, skipped {} existing",
                report.created.len(),
                report.skipped.len()
            );
        }

        Command::ReportUsage => {
            let report = flows::report_definition_usage(&root).context("scanning flows")?;
            print!("{report}");
        }

        Command::CheckRefs => {
            let missing = flows::check_definition_refs(&root).context("scanning flows")?;
            if !missing.is_empty() {
                for m in &missing {
                    println!("{m}");
                }
                return Ok(ExitCode::FAILURE);
            }
            println!("All definition references are present");
        }

        Command::VerifyFlow { flow } => {
            let flow = under_root(&root, &flow);
            let (experience, steps) = flows::verify_flow(&root, &flow)
                .with_context(|| format!("verifying {}", flow.display()))?;
            println!("Verifying flow: {}", experience.as_deref().unwrap_or("<unknown>"));
            for step in &steps {
                let label = step.raw.get("id").and_then(|v| v.as_str()).unwrap_or("-");
                println!("[{}] {label}", step.index);
                match &step.resolution {
                    StepResolution::Merged { definition, step } => {
                        println!("  -> definition {}", definition.display());
                        let merged = serde_json::to_string_pretty(step)?;
                        for line in merged.lines() {
                            println!("     {line}");
                        }
                    }
                    StepResolution::MissingDefinition(path) => {
                        println!("  -> MISSING definition file {}", path.display());
                    }
                    StepResolution::Inline => println!("  -> No definition_id; node used as-is"),
                }
            }
        }

        Command::ValidateFlow { flow } => {
            let flow = under_root(&root, &flow);
            let report = flows::validate_flow(&root, &flow)
                .with_context(|| format!("validating {}", flow.display()))?;
            if !report.missing_definitions.is_empty() {
                println!("Missing flow_step_definitions for definition_id:");
                for m in &report.missing_definitions {
                    println!("  - {} (index {})", m.definition_id, m.index);
                }
            }
            if !report.effect_issues.is_empty() {
                println!("Effect issues:");
                for issue in &report.effect_issues {
                    println!("  - node {}: {} ({})", issue.node, issue.problem, issue.effect);
                }
            }
            if !report.is_ok() {
                return Ok(ExitCode::FAILURE);
            }
            println!("Flow validation passed");
        }

        Command::Stars {
            score,
            target,
            moves_used,
            total_moves,
        } => match (score, target, moves_used, total_moves) {
            (Some(score), Some(target), Some(used), Some(total)) => {
                println!("{}", calculate_stars(score, target, used, total));
            }
            _ => {
                let mut failed = 0;
                for &(score, target, used, total, expected) in REFERENCE_CASES {
                    let got = calculate_stars(score, target, used, total);
                    let mark = if got == expected { "ok" } else { "FAIL" };
                    if got != expected {
                        failed += 1;
                    }
                    println!(
                        "{mark:>4}  score={score} target={target} moves={used}/{total} stars={got} expected={expected}"
                    );
                }
                if failed > 0 {
                    return Ok(ExitCode::FAILURE);
                }
            }
        },
    }

    if writer.is_dry_run() {
        println!("Dry run: no files were changed");
    }
    Ok(ExitCode::SUCCESS)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_levels_args() {
        let cli = Cli::try_parse_from([
            "m3tools",
            "--root",
            "/game",
            "generate-levels",
            "--start",
            "1",
            "--end",
            "3",
            "--shape",
            "cross,diamond",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.root, PathBuf::from("/game"));
        match cli.command {
            Command::GenerateLevels {
                start, end, shape, dry, ..
            } => {
                assert_eq!((start, end), (1, 3));
                assert_eq!(shape, vec![Shape::Cross, Shape::Diamond]);
                assert!(dry.dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_stars_requires_all_values() {
        assert!(Cli::try_parse_from(["m3tools", "stars", "--score", "100"]).is_err());
        assert!(Cli::try_parse_from(["m3tools", "stars", "--target", "100"]).is_err());
        assert!(
            Cli::try_parse_from(["m3tools", "stars", "--target", "100", "--moves-used", "5", "--total-moves", "20"])
                .is_err()
        );
        assert!(Cli::try_parse_from(["m3tools", "stars"]).is_ok());
        assert!(Cli::try_parse_from([
            "m3tools", "stars", "--score", "150", "--target", "100", "--moves-used", "15", "--total-moves", "20",
        ])
        .is_ok());
    }

    #[test]
    fn test_command_writer_follows_dry_run() {
        let cli = Cli::try_parse_from(["m3tools", "migrate-anchors", "--dry-run"]).unwrap();
        assert!(cli.command.writer().is_dry_run());
        let cli = Cli::try_parse_from(["m3tools", "migrate-anchors"]).unwrap();
        assert!(!cli.command.writer().is_dry_run());
        let cli = Cli::try_parse_from(["m3tools", "report-usage"]).unwrap();
        assert!(!cli.command.writer().is_dry_run());
    }

    #[test]
    fn test_file_label() {
        assert_eq!(file_label(Path::new("/game/levels/level_11.json")), "level_11.json");
    }

    #[test]
    fn test_under_root() {
        let root = ContentRoot::new("/game");
        assert_eq!(under_root(&root, Path::new("levels")), PathBuf::from("/game/levels"));
        assert_eq!(under_root(&root, Path::new("/tmp/x.json")), PathBuf::from("/tmp/x.json"));
    }
}
