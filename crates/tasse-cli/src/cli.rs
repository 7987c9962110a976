use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "TASSE CLI - Extraction of tightly associated solvent and hydrogen-bond networks from molecular dynamics trajectories.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of worker threads for snapshot processing.
    /// Defaults to the number of available logical cores (at most 32).
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a trajectory for bridging solvent and write the selected placements.
    Extract(ExtractArgs),
    /// Classify a topology and write it back without processing a trajectory.
    Convert(ConvertArgs),
}

/// Arguments for the `extract` subcommand.
#[derive(Args, Debug, Default)]
pub struct ExtractArgs {
    // --- Inputs ---
    /// Path to the topology PDB file.
    #[arg(short, long, value_name = "PATH")]
    pub topology: Option<PathBuf>,

    /// Path to a text file listing one snapshot PDB per line.
    #[arg(short = 'x', long, value_name = "PATH")]
    pub trajectory: Option<PathBuf>,

    /// Path for the output structure with the selected solvent.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Path for the occurrence histogram and pair/triplet tables.
    #[arg(short, long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Path to a run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of leading snapshots to skip.
    #[arg(long, value_name = "INT")]
    pub first_snapshot: Option<usize>,

    /// Solvent residue name.
    #[arg(long, value_name = "NAME")]
    pub solvent: Option<String>,

    // --- Parameter Files ---
    /// Hydrogen bond parameters and donor/acceptor definitions (TOML).
    #[arg(long, value_name = "PATH")]
    pub params: Option<PathBuf>,

    /// Partial charges (CSV with residue,atom,charge).
    #[arg(long, value_name = "PATH")]
    pub charges: Option<PathBuf>,

    /// Van der Waals radii (CSV with residue,atom,radius).
    #[arg(long, value_name = "PATH")]
    pub radii: Option<PathBuf>,

    // --- Engine Overrides ---
    /// Dielectric constant of the reaction field.
    #[arg(long, value_name = "FLOAT")]
    pub dielectric: Option<f64>,

    /// Electrostatic cutoff radius in Angstroms.
    #[arg(long, value_name = "FLOAT")]
    pub radius: Option<f64>,

    /// Weight of the electrostatic term (0 disables charges).
    #[arg(long, value_name = "FLOAT")]
    pub elec_coeff: Option<f64>,

    /// Maximum donor-acceptor distance in Angstroms.
    #[arg(long, value_name = "FLOAT")]
    pub hb_length: Option<f64>,

    /// Absolute energy a contact must fall below to count as a bridge.
    #[arg(long, value_name = "FLOAT")]
    pub hb_energy: Option<f64>,

    /// Weight of the directional 12-6 hydrogen bond term.
    #[arg(long, value_name = "FLOAT")]
    pub hb_coeff: Option<f64>,

    /// Fraction of snapshots a pair or triplet must be seen in.
    #[arg(long, value_name = "FLOAT")]
    pub occurrence: Option<f64>,

    /// Allowed van der Waals overlap of final placements (1 disables culling).
    #[arg(long, value_name = "FLOAT")]
    pub vdw_tolerance: Option<f64>,

    /// Treat grouped atoms (e.g. OD1/OD2) as separate atoms.
    #[arg(long)]
    pub no_group_bonds: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S engine.occurrence-cutoff=0.8
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `convert` subcommand.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Path to the input PDB file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the post-processed PDB file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Hydrogen bond parameter file whose solvent aliases apply.
    #[arg(long, value_name = "PATH")]
    pub params: Option<PathBuf>,

    /// Solvent residue name.
    #[arg(long, value_name = "NAME", default_value = "HOH")]
    pub solvent: String,
}
