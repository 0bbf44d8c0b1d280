//! CLI entry point for the brushwork rating experiment.

use anyhow::{Context, Result, bail};
use brushwork_learning::{
    EliminationTest, Experiment, ExperimentConfig, ExperimentReport, ModelKind, TuningConfig,
    WorkflowSet,
};
use brushwork_processing::{Assignment, Dataset, EpisodeLoader, Recipe, stats};
use clap::{Parser, ValueEnum};
use ndarray::Axis;
use std::path::{Path, PathBuf};
use tracing::info;

/// CLI-compatible elimination test enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliEliminationTest {
    /// Two-way ANOVA on candidate and fold, one-sided t against the best
    Anova,
    /// Paired t-test against the best, Bonferroni-adjusted
    PairedT,
}

impl From<CliEliminationTest> for EliminationTest {
    fn from(cli: CliEliminationTest) -> Self {
        match cli {
            CliEliminationTest::Anova => EliminationTest::Anova,
            CliEliminationTest::PairedT => EliminationTest::PairedT,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Which painting elements make a Bob Ross episode well rated?",
    long_about = "Joins the painting-elements table with episode ratings, races a grid of \
                  preprocessing recipes and regression models over cross-validation folds, \
                  ranks the workflows by RMSE and scores the best one on held-out episodes.\n\n\
                  EXAMPLES:\n  \
                  # Full run with defaults (18 workflows, 10 folds, 25 candidates)\n  \
                  brushwork --elements elements.csv --ratings ratings.csv\n\n  \
                  # Quick run on two models\n  \
                  brushwork --elements elements.csv --ratings ratings.csv --models glmnet,kknn --folds 5\n\n  \
                  # Preview the data and the workflow grid\n  \
                  brushwork --elements elements.csv --ratings ratings.csv --dry-run\n\n  \
                  # Machine-readable output\n  \
                  brushwork --elements elements.csv --ratings ratings.csv --json | jq .final_fit"
)]
struct Args {
    /// Painting-elements CSV (EPISODE, TITLE and one 0/1 column per element)
    #[arg(short, long)]
    elements: PathBuf,

    /// Ratings CSV (season, episode, rating, votes)
    #[arg(short, long)]
    ratings: PathBuf,

    /// Seed of the split, the folds and the tuning
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Number of cross-validation folds
    #[arg(long, default_value = "10")]
    folds: usize,

    /// Candidates per workflow
    #[arg(long, default_value = "25")]
    grid_size: usize,

    /// Share of episodes used for training
    #[arg(long, default_value = "0.75")]
    train_prop: f64,

    /// Folds evaluated before the first elimination test
    #[arg(long, default_value = "3")]
    burn_in: usize,

    /// Significance level of the elimination test
    #[arg(long, default_value = "0.05")]
    alpha: f64,

    /// Elimination test used while racing
    #[arg(long, value_enum, default_value = "anova")]
    elimination: CliEliminationTest,

    /// Worker threads (-1 for all cores)
    #[arg(short, long, default_value = "-1", allow_negative_numbers = true)]
    jobs: i32,

    /// Models to include, comma separated
    /// (cubist, glmnet, nnet, kknn, ranger, svm_rbf, null)
    #[arg(long, value_delimiter = ',')]
    models: Vec<String>,

    /// Recipes to include, comma separated (basic, pca, corr)
    #[arg(long, value_delimiter = ',')]
    recipes: Vec<String>,

    /// Show the data overview and the workflow grid without tuning
    #[arg(long)]
    dry_run: bool,

    /// Output JSON to stdout instead of human-readable tables
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,

    /// Write the JSON report into this directory
    #[arg(long, value_name = "DIR")]
    emit_report: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final result)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);

    for path in [&args.elements, &args.ratings] {
        if !path.exists() {
            bail!("Input file not found: {}", path.display());
        }
    }

    info!(
        "Loading episodes from {} and {}",
        args.elements.display(),
        args.ratings.display()
    );
    let data = EpisodeLoader::default()
        .load(&args.elements, &args.ratings)
        .context("failed to load the input tables")?;
    info!(
        "Dataset loaded: {} episodes, {} features",
        data.len(),
        data.n_features()
    );

    let config = build_config(&args)?;

    if args.dry_run {
        return run_dry_run(&args, &data, &config);
    }

    let mut builder = Experiment::builder().config(config.clone());
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let experiment = builder.build()?;
    let result = experiment.run(&data)?;

    let report = ExperimentReport::new(&config, &result)
        .with_inputs(display(&args.elements), display(&args.ratings));

    if let Some(dir) = &args.emit_report {
        report.write_report_to_file(dir)?;
    }

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report.render_text()?);
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn build_config(args: &Args) -> Result<ExperimentConfig> {
    let tuning = TuningConfig::builder()
        .folds(args.folds)
        .grid_size(args.grid_size)
        .burn_in(args.burn_in)
        .alpha(args.alpha)
        .test(args.elimination.into())
        .build()?;

    let mut builder = ExperimentConfig::builder()
        .train_prop(args.train_prop)
        .seed(args.seed)
        .tuning(tuning)
        .n_jobs(args.jobs);

    if !args.models.is_empty() {
        let models = args
            .models
            .iter()
            .map(|name| name.parse::<ModelKind>())
            .collect::<brushwork_learning::Result<Vec<_>>>()?;
        builder = builder.models(models);
    }
    if !args.recipes.is_empty() {
        let recipes = args
            .recipes
            .iter()
            .map(|name| {
                Recipe::preset(name.trim()).with_context(|| {
                    format!(
                        "unknown recipe '{name}' (expected one of {})",
                        Recipe::preset_names().join(", ")
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        builder = builder.recipes(recipes);
    }

    Ok(builder.build()?)
}

/// Run dry-run mode - show the data and the grid without tuning
///
/// Note: This function uses `println!` intentionally for user-facing CLI output.
fn run_dry_run(args: &Args, data: &Dataset, config: &ExperimentConfig) -> Result<()> {
    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Preview of the experiment");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  Elements: {}", args.elements.display());
    println!("  Ratings:  {}", args.ratings.display());
    println!("  Episodes: {}", data.len());
    println!("  Features: {}", data.n_features());
    let target = data.target().view();
    println!(
        "  Target '{}': mean {:.3}, sd {:.3}, min {:.2}, max {:.2}",
        data.target_name(),
        stats::mean(target),
        stats::sd(target),
        target.iter().copied().fold(f64::INFINITY, f64::min),
        target.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    );
    println!();

    println!("TOP TARGET CORRELATIONS");
    println!("{}", "-".repeat(40));
    let mut correlations: Vec<(&String, f64)> = data
        .feature_names()
        .iter()
        .zip(data.features().axis_iter(Axis(1)))
        .filter_map(|(name, column)| stats::pearson(column, target).map(|r| (name, r)))
        .collect();
    correlations.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then_with(|| a.0.cmp(b.0)));
    for (name, r) in correlations.iter().take(10) {
        println!("  {:<24} {:>7.3}", truncate_str(name, 23), r);
    }
    println!();

    println!("NEAR-ZERO VARIANCE COLUMNS");
    println!("{}", "-".repeat(40));
    match Recipe::basic().fit(&data.frame(), &Assignment::new()) {
        Ok(fitted) => {
            let dropped = fitted.dropped_columns();
            if dropped.is_empty() {
                println!("  None");
            } else {
                println!("  {} columns would be removed: {}", dropped.len(), dropped.join(", "));
            }
        }
        Err(e) => println!("  nzv filter fails on the full data: {e}"),
    }
    println!();

    let n_train = (config.train_prop * data.len() as f64).floor() as usize;
    println!("RESAMPLING");
    println!("{}", "-".repeat(40));
    println!(
        "  ~{} training / ~{} test episodes, {} folds, seed {}",
        n_train,
        data.len().saturating_sub(n_train),
        config.tuning.folds,
        config.seed
    );
    println!(
        "  {} candidates per workflow, burn-in {}, {} test at alpha {}",
        config.tuning.grid_size,
        config.tuning.burn_in,
        config.tuning.test.as_str(),
        config.tuning.alpha
    );
    println!();

    println!("WORKFLOW GRID");
    println!("{}", "-".repeat(40));
    let experiment = Experiment::builder().config(config.clone()).build()?;
    let workflows: WorkflowSet = experiment.workflows()?;
    for workflow in &workflows {
        let tunables: Vec<String> = workflow.tunables()?.into_iter().map(|t| t.id).collect();
        let tuned = if tunables.is_empty() {
            "-".to_string()
        } else {
            tunables.join(", ")
        };
        println!("  {:<20} {}", workflow.id(), tuned);
    }
    println!("\n  {} workflows", workflows.len());
    println!("{}", "=".repeat(80));
    Ok(())
}

fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
