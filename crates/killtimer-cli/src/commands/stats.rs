use std::path::PathBuf;

use clap::Args;
use killtimer_core::worklog::load_log;
use killtimer_core::{summarize, StatsConfig};

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Log file where amount of work done is stored
    #[arg(value_name = "log_file")]
    pub log_file: PathBuf,

    /// Report total work duration grouped by executed program
    #[arg(short = 't', long = "total-duration")]
    pub total_duration: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl From<StatsArgs> for StatsConfig {
    fn from(args: StatsArgs) -> Self {
        Self {
            log_file_path: args.log_file,
            total_duration_worked: args.total_duration,
            json: args.json,
        }
    }
}

pub fn run(args: StatsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = StatsConfig::from(args);
    let records = load_log(&config.log_file_path)?;
    let report = summarize(&records, &config);

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.to_text());
    }
    Ok(())
}
