use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use crate::config::GateConfig;
use crate::consensus::LabelRename;
use crate::data::{loader, writer};
use crate::gate::{ModelRegistry, PrecomputedCalls, PurityClassifier, SignatureGate};
use crate::{pipeline, report};

#[derive(Debug, Parser)]
#[command(
    name = "cellgate",
    version,
    about = "Signature gating and consensus cell-type labels for macaque single-cell data"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Gate cells with a set of models and build consensus labels
    Run(RunArgs),
    /// List available gate models
    Models(ModelDirArgs),
    /// Print the gate table of one model
    Show {
        /// Model name, e.g. Bcell.RM
        model: String,
        #[command(flatten)]
        dirs: ModelDirArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// All bundled rhesus models merged into broad lineages
    Rhesus,
}

#[derive(Debug, Clone, Args)]
pub struct ModelDirArgs {
    /// Directory of extra *.tsv gate tables (repeatable)
    #[arg(long = "model-dir", value_name = "DIR")]
    pub model_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Cell x gene expression matrix (.csv, .tsv, .json, .parquet)
    #[arg(short = 'e', long, value_name = "PATH", required_unless_present = "metadata")]
    pub expression: Option<PathBuf>,

    /// Per-cell metadata table joined by cell id
    #[arg(short = 'm', long, value_name = "PATH")]
    pub metadata: Option<PathBuf>,

    /// Name of the cell id column in the input tables
    #[arg(long, default_value = "cell")]
    pub id_column: String,

    /// JSON config file
    #[arg(short = 'c', long, value_name = "PATH", conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Start from a built-in configuration
    #[arg(long, value_enum)]
    pub preset: Option<Preset>,

    /// Models to run, comma separated
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub models: Vec<String>,

    /// Models that take part in the consensus, comma separated
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub consensus_models: Option<Vec<String>>,

    /// Rename a label, FROM=TO; an empty TO drops the label (repeatable)
    #[arg(long = "rename", value_name = "FROM=TO")]
    pub rename: Vec<String>,

    /// Clear consensus values that still hold more than one label
    #[arg(long)]
    pub drop_ambiguous: bool,

    #[command(flatten)]
    pub dirs: ModelDirArgs,

    /// Read <model>.is.pure columns from the metadata instead of gating
    #[arg(long)]
    pub precomputed: bool,

    /// Minimum positive signature score
    #[arg(long)]
    pub positive_threshold: Option<f64>,

    /// Maximum negative signature score
    #[arg(long)]
    pub negative_threshold: Option<f64>,

    /// Minimum candidates needed to descend a gate level
    #[arg(long)]
    pub min_cells: Option<usize>,

    /// Rank cap for signature scoring
    #[arg(long)]
    pub max_rank: Option<usize>,

    /// Genes excluded from every signature, comma separated
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub blocklist: Vec<String>,

    /// Copy the input metadata columns into the output table
    #[arg(long)]
    pub keep_metadata: bool,

    /// Output table (.csv, .tsv, .json, .parquet)
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: PathBuf,

    /// Write an SVG bar chart of the consensus labels
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

impl RunArgs {
    /// Config file or preset, with command line values on top.
    pub fn to_config(&self) -> Result<GateConfig> {
        let mut config = match (&self.config, self.preset) {
            (Some(path), _) => GateConfig::from_file(path)?,
            (None, Some(Preset::Rhesus)) => GateConfig::rhesus(),
            (None, None) => GateConfig::default(),
        };

        if !self.models.is_empty() {
            config.models = self.models.clone();
        }
        if let Some(consensus) = &self.consensus_models {
            config.consensus_models = Some(consensus.clone());
        }
        let mut rename = LabelRename::new();
        for pair in &self.rename {
            let (from, to) = LabelRename::parse_pair(pair)?;
            rename.insert(from, to);
        }
        config.label_rename.extend(rename);
        config.drop_ambiguous |= self.drop_ambiguous;
        config.model_dirs.extend(self.dirs.model_dirs.iter().cloned());

        if let Some(v) = self.positive_threshold {
            config.thresholds.positive = v;
        }
        if let Some(v) = self.negative_threshold {
            config.thresholds.negative = v;
        }
        if let Some(v) = self.min_cells {
            config.min_cells = v;
        }
        if let Some(v) = self.max_rank {
            config.max_rank = v;
        }
        config.gene_blocklist.extend(self.blocklist.iter().cloned());

        config.validate()?;
        Ok(config)
    }
}

fn registry(dirs: &ModelDirArgs) -> Result<ModelRegistry> {
    GateConfig {
        model_dirs: dirs.model_dirs.clone(),
        ..GateConfig::default()
    }
    .registry()
}

pub fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => run(&args),
        Command::Models(dirs) => {
            let registry = registry(&dirs)?;
            for model in registry.models() {
                println!(
                    "{}\t{} levels\t{} genes",
                    model.name,
                    model.levels.len(),
                    model.genes().len()
                );
            }
            Ok(())
        }
        Command::Show { model, dirs } => {
            let registry = registry(&dirs)?;
            print!("{}", registry.get(&model)?.to_table());
            Ok(())
        }
    }
}

fn run(args: &RunArgs) -> Result<()> {
    let config = args.to_config()?;
    let registry = config.registry()?;

    let dataset = loader::load_dataset(
        args.expression.as_deref(),
        args.metadata.as_deref(),
        &args.id_column,
    )?;

    let classifier: &dyn PurityClassifier = if args.precomputed {
        &PrecomputedCalls
    } else {
        &SignatureGate
    };
    info!("gating with {} ({} models)", classifier.name(), config.models.len());

    let output = pipeline::run(&dataset, &config, &registry, classifier)?;

    let table = output.to_table(&dataset, &args.id_column, args.keep_metadata);
    writer::write_table(&table, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!("wrote {} rows to {}", table.rows.len(), args.output.display());

    if let Some(path) = &args.report {
        report::write_bar_chart(&output.consensus, "scGate consensus", path)?;
        info!("wrote report to {}", path.display());
    }
    eprint!("{}", report::text_summary(&output.purity, &output.consensus));
    Ok(())
}
