use clap::Parser;
use takeout_sidecars::args::Args;
use takeout_sidecars::processor::Processor;
use takeout_sidecars::report::{BarProgress, NoProgress, Progress};
use takeout_sidecars::writer::ExifToolWriter;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Validate before anything on disk is touched
    args.validate()?;

    let writer = ExifToolWriter::new()?;
    let progress: Box<dyn Progress> = if args.no_progress {
        Box::new(NoProgress)
    } else {
        Box::new(BarProgress::new())
    };

    let mut processor = Processor::new(&args.root, &args.backup_dir, writer, progress)?;
    let stats = processor.run()?;

    stats.print_summary(processor.backup_root());

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
