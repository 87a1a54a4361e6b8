use std::path::PathBuf;

/// Channel-narrowing CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "channel-narrowing", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Segment, measure and compare historic and modern bankfulls
    Run(RunArgs),

    /// Run with every parameter taken from a JSON configuration file
    FromConfig(FromConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Historic bankfull polygons (.shp)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub historic_bankfull: PathBuf,

    /// Modern bankfull polygons (.shp)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub modern_bankfull: PathBuf,

    /// Modern centerline (.shp)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub modern_centerline: PathBuf,

    /// Historic centerline (.shp); the modern one stands in when absent
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub historic_centerline: Option<PathBuf>,

    /// Reach-break lines or polygons (.shp)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub reach_breaks: Option<PathBuf>,

    /// Directory the project folder is created in, defaults to "."
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Base name of the output shapefiles
    #[arg(short, long)]
    pub name: String,

    /// Whether the bankfulls are already segmented; absent or "false" means no
    #[arg(long)]
    pub pre_segmented: Option<String>,

    /// Replace input mirrors left by an earlier run
    #[arg(long)]
    pub overwrite: bool,

    /// Also write the resolved configuration to this JSON file
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub save_config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct FromConfigArgs {
    /// JSON file holding a run configuration
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,
}
