use anyhow::{Context, Result};
use channel_narrowing::{parse_flag, GeoEngine, Orchestrator, RunConfig, RunReport, TracingSink};

use crate::cli::{FromConfigArgs, RunArgs};

fn execute(config: RunConfig) -> Result<RunReport> {
    let engine = GeoEngine::default();
    let sink = TracingSink;
    let report = Orchestrator::new(&engine, &sink, config).run()?;

    println!("{}", report.polygon.display());
    println!("{}", report.polyline.display());
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(report)
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = RunConfig {
        historic_bankfull: args.historic_bankfull.clone(),
        modern_bankfull: args.modern_bankfull.clone(),
        reach_breaks: args.reach_breaks.clone(),
        modern_centerline: args.modern_centerline.clone(),
        historic_centerline: args.historic_centerline.clone(),
        output_root: args.output.clone().unwrap_or(".".into()),
        output_name: args.name.clone(),
        pre_segmented: parse_flag(args.pre_segmented.as_deref()),
        overwrite: args.overwrite,
    };

    if let Some(path) = &args.save_config {
        std::fs::write(path, serde_json::to_vec_pretty(&config)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    execute(config)?;
    Ok(())
}

pub fn from_config(args: &FromConfigArgs) -> Result<()> {
    let config = RunConfig::from_json_file(&args.config)?;
    execute(config)?;
    Ok(())
}
