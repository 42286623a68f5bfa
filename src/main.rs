use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use grove_io::{
    ExperimentName, FeatureSchema, LabelPolicy, ResultWriter, SampleReader, holdout_split,
};
use grove_rf::{
    Label, MaxFeatures, RandomForest, RandomForestConfig, SearchStrategy, TreeFailurePolicy, VoteTally,
};

#[derive(Parser)]
#[command(name = "grove")]
#[command(about = "Binary-split decision trees and random forests for labeled tabular data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// How to read a labeled CSV file.
#[derive(Args, Debug, Clone)]
struct InputArgs {
    /// Path to the input CSV file
    #[arg(long)]
    data: PathBuf,

    /// Column holding the class label (matched case-insensitively)
    #[arg(long, default_value = "label")]
    label_column: String,

    /// Label policy: "verbatim" or "directional" ("0" is Down, anything else Up)
    #[arg(long, default_value = "verbatim")]
    label_policy: String,
}

/// Where result files go.
#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
    #[arg(long)]
    experiment: String,

    /// Output directory for result files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

/// Forest tuning parameters.
#[derive(Args, Debug, Clone)]
struct ForestArgs {
    /// Number of trees in the forest
    #[arg(long, default_value_t = 100)]
    n_trees: usize,

    /// Maximum tree depth, root at depth 1 (unlimited if not set)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Label share at which a node stops splitting, in (0, 1]
    #[arg(long, default_value_t = 1.0)]
    homogeneity_threshold: f64,

    /// Per-split column subset ceiling: "sqrt", "log2", "all", a count, or a fraction
    #[arg(long, default_value = "sqrt")]
    max_features: String,

    /// Split search: "bisection" or "exhaustive"
    #[arg(long, default_value = "bisection")]
    search: String,

    /// Train every tree on the full training set instead of a bootstrap sample
    #[arg(long, default_value_t = false)]
    no_bootstrap: bool,

    /// Drop trees that fail to train instead of aborting
    #[arg(long, default_value_t = false)]
    skip_failed_trees: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Train a forest, save it, and score it on a holdout split
    Train {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        forest: ForestArgs,

        /// Columns tested with "<" instead of ">=" (comma separated)
        #[arg(long, value_delimiter = ',')]
        discrete: Vec<String>,

        /// Fraction of rows held out for evaluation, in [0, 1)
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,
    },

    /// Score a saved forest on a labeled CSV file
    Evaluate {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Classify rows of a CSV file with a saved forest
    Predict {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Summarize a saved forest, optionally drawing one tree
    Inspect {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        /// Print this tree (zero-based) as an ASCII diagram on stderr
        #[arg(long)]
        tree: Option<usize>,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    experiment: String,
    n_train: usize,
    n_test: usize,
    n_trees_requested: usize,
    n_trees_trained: usize,
    n_columns: usize,
    max_features_resolved: Option<usize>,
    accuracy: Option<f64>,
}

#[derive(Serialize)]
struct EvaluateOutput {
    experiment: String,
    n_trees: usize,
    correct: usize,
    total: usize,
    accuracy: f64,
}

#[derive(Serialize)]
struct PredictOutput {
    experiment: String,
    n_samples: usize,
    model_n_trees: usize,
}

#[derive(Serialize)]
struct InspectOutput {
    n_trees: usize,
    labels: Vec<String>,
    trees: Vec<TreeSummary>,
}

#[derive(Serialize)]
struct TreeSummary {
    index: usize,
    n_nodes: usize,
    n_leaves: usize,
    depth: usize,
    root: String,
}

fn parse_label_policy(s: &str) -> Result<LabelPolicy> {
    match s {
        "verbatim" => Ok(LabelPolicy::Verbatim),
        "directional" => Ok(LabelPolicy::Directional),
        other => anyhow::bail!("unknown label policy: {other} (expected verbatim or directional)"),
    }
}

fn parse_search(s: &str) -> Result<SearchStrategy> {
    match s {
        "bisection" => Ok(SearchStrategy::Bisection),
        "exhaustive" => Ok(SearchStrategy::Exhaustive),
        other => anyhow::bail!("unknown search strategy: {other} (expected bisection or exhaustive)"),
    }
}

fn parse_max_features(s: &str) -> Result<MaxFeatures> {
    match s {
        "sqrt" => Ok(MaxFeatures::Sqrt),
        "log2" => Ok(MaxFeatures::Log2),
        "all" => Ok(MaxFeatures::All),
        other => {
            if let Ok(n) = other.parse::<usize>() {
                Ok(MaxFeatures::Fixed(n))
            } else if let Ok(f) = other.parse::<f64>() {
                Ok(MaxFeatures::Fraction(f))
            } else {
                anyhow::bail!(
                    "unknown max features: {other} (expected sqrt, log2, all, a count, or a fraction)"
                )
            }
        }
    }
}

fn build_forest_config(args: &ForestArgs, seed: u64) -> Result<RandomForestConfig> {
    let failure_policy = if args.skip_failed_trees {
        TreeFailurePolicy::Skip
    } else {
        TreeFailurePolicy::Abort
    };
    Ok(RandomForestConfig::new(args.n_trees)?
        .with_max_depth(args.max_depth)
        .with_homogeneity_threshold(args.homogeneity_threshold)
        .with_max_features(parse_max_features(&args.max_features)?)
        .with_search(parse_search(&args.search)?)
        .with_bootstrap(!args.no_bootstrap)
        .with_failure_policy(failure_policy)
        .with_seed(seed))
}

fn reader_for(input: &InputArgs) -> Result<SampleReader> {
    Ok(SampleReader::new(&input.data)
        .with_label_column(&input.label_column)
        .with_label_policy(parse_label_policy(&input.label_policy)?))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            input,
            output,
            forest,
            discrete,
            test_fraction,
        } => {
            let experiment_name = ExperimentName::new(output.experiment.clone())?;
            let config = build_forest_config(&forest, cli.seed)?;

            // 1. Read samples and split off the holdout
            let dataset = reader_for(&input)?
                .read()
                .context("failed to read input CSV")?;
            let schema = FeatureSchema::for_dataset(&dataset, &discrete)
                .context("invalid --discrete column")?;
            let (train, test) = holdout_split(dataset.into_samples(), test_fraction, cli.seed)?;
            info!(n_train = train.len(), n_test = test.len(), "holdout split");

            // 2. Candidate features come from the training side only
            let lists = schema
                .candidate_features(&train)
                .context("failed to build candidate features")?;

            // 3. Train
            let result = config
                .fit(&train, &lists)
                .context("forest training failed")?;
            let trained = result.forest();

            // 4. Save model and tree records
            let writer = ResultWriter::new(&output.output_dir, experiment_name)?;
            trained
                .save(writer.model_path())
                .context("failed to save model")?;
            writer.write_trees(trained)?;

            // 5. Score the holdout, if any
            let accuracy = if test.is_empty() {
                None
            } else {
                let eval = trained
                    .evaluate(&test, cli.seed)
                    .context("holdout evaluation failed")?;
                writer.write_evaluation(trained.n_trees(), &eval)?;
                writer.append_accuracy_history(trained.n_trees(), &eval)?;
                info!(accuracy = eval.accuracy, "holdout evaluated");
                Some(eval.accuracy)
            };

            let meta = result.metadata();
            let summary = TrainOutput {
                experiment: output.experiment,
                n_train: train.len(),
                n_test: test.len(),
                n_trees_requested: meta.n_trees_requested,
                n_trees_trained: meta.n_trees_trained,
                n_columns: meta.n_columns,
                max_features_resolved: meta.max_features_resolved,
                accuracy,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Evaluate {
            model,
            input,
            output,
        } => {
            let experiment_name = ExperimentName::new(output.experiment.clone())?;

            let forest = RandomForest::load(&model).context("failed to load model")?;
            info!(n_trees = forest.n_trees(), "model loaded");

            let dataset = reader_for(&input)?
                .read()
                .context("failed to read input CSV")?;
            let eval = forest
                .evaluate(dataset.samples(), cli.seed)
                .context("evaluation failed")?;

            let writer = ResultWriter::new(&output.output_dir, experiment_name)?;
            writer.write_evaluation(forest.n_trees(), &eval)?;
            writer.append_accuracy_history(forest.n_trees(), &eval)?;

            let summary = EvaluateOutput {
                experiment: output.experiment,
                n_trees: forest.n_trees(),
                correct: eval.correct,
                total: eval.total,
                accuracy: eval.accuracy,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Predict {
            model,
            input,
            output,
        } => {
            let experiment_name = ExperimentName::new(output.experiment.clone())?;

            let forest = RandomForest::load(&model).context("failed to load model")?;
            info!(n_trees = forest.n_trees(), "model loaded");

            let dataset = reader_for(&input)?
                .with_optional_labels()
                .read()
                .context("failed to read input CSV")?;
            let samples = dataset.samples();

            let (predicted, votes): (Vec<Label>, Vec<VoteTally>) = forest
                .predict_batch(samples, cli.seed)
                .context("classification failed")?
                .into_iter()
                .unzip();

            let writer = ResultWriter::new(&output.output_dir, experiment_name)?;
            writer.write_predictions(samples, &predicted, &votes)?;

            let summary = PredictOutput {
                experiment: output.experiment,
                n_samples: samples.len(),
                model_n_trees: forest.n_trees(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Inspect { model, tree } => {
            let forest = RandomForest::load(&model).context("failed to load model")?;

            if let Some(index) = tree {
                let selected = forest.trees().get(index).with_context(|| {
                    format!("tree {index} out of range (forest has {})", forest.n_trees())
                })?;
                eprintln!("{selected}");
            }

            let summary = InspectOutput {
                n_trees: forest.n_trees(),
                labels: forest.labels().into_iter().map(|l| l.to_string()).collect(),
                trees: forest
                    .trees()
                    .iter()
                    .enumerate()
                    .map(|(index, t)| TreeSummary {
                        index,
                        n_nodes: t.n_nodes(),
                        n_leaves: t.n_leaves(),
                        depth: t.depth(),
                        root: t.root().name().to_string(),
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
