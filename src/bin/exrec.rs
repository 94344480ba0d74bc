extern crate clap;
extern crate exrec;
extern crate failure;

use std::path::PathBuf;
use std::process;

use clap::Parser;

use exrec::app::{init_logging, prepare_dirs, provide_app, LOG_FILE};
use exrec::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "exrec")]
#[command(about = "Run a recommender experiment described by a JSON config file")]
#[command(version)]
struct Args {
    /// Experiment config file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,
}

fn run(args: &Args) -> Result<(), failure::Error> {
    let config = AppConfig::from_path(&args.config)?;

    prepare_dirs(&config)?;
    init_logging(&config.out_dir.join(LOG_FILE))?;

    let scores = provide_app(&config)?.start()?;
    println!("{}", scores);

    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(err) = run(&args) {
        eprintln!("Error: {}", err);
        for cause in err.iter_causes() {
            eprintln!("Caused by: {}", cause);
        }

        process::exit(1);
    }
}
