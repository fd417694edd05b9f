use clap::Parser;
use cryptobt::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
