use clap::Parser;
use killtimer_cli::commands::stats::{self, StatsArgs};
use killtimer_cli::logging;

#[derive(Parser)]
#[command(
    name = "killtimer-stats",
    version,
    about = "Generate insight from log file generated by killtimer"
)]
struct Cli {
    #[command(flatten)]
    stats: StatsArgs,

    /// Log debug details to stderr
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = stats::run(cli.stats) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
