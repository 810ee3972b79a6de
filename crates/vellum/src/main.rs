use clap::Parser;
use vellum::cli::{init_logging, run, Cli};

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let stdout = std::io::stdout();
    run(cli, &mut stdout.lock())
}
