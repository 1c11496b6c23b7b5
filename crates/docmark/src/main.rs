use clap::Parser;

fn main() -> anyhow::Result<()> {
    docmark::init();

    let cli = docmark::cli::Cli::parse();
    let stdout = std::io::stdout();
    docmark::cli::run(cli, &mut stdout.lock())
}
