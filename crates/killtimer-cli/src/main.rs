use clap::Parser;
use killtimer_cli::commands::timer::{self, TimerArgs};
use killtimer_cli::logging;

#[derive(Parser)]
#[command(
    name = "killtimer",
    version,
    about = "Close application when time runs out"
)]
struct Cli {
    #[command(flatten)]
    timer: TimerArgs,

    /// Log debug details to stderr
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match timer::run(cli.timer) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
