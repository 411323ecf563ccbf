use std::error::Error;
use std::io;

use clap::Parser;
use termwit_cli::{logging, Cli};

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    termwit_cli::run(&cli, &mut out)
}
