use clap::Parser;
use snafu::ErrorCompat;

mod args;
mod seating;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let res = match args.mode.as_deref().unwrap_or("import") {
        "import" => seating::run_import(&args),
        "assign" => seating::run_assign(&args),
        x => {
            eprintln!("Unknown mode {:?}: expected \"import\" or \"assign\"", x);
            std::process::exit(2);
        }
    };
    if let Err(e) = res {
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
