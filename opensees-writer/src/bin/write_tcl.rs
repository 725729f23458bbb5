use clap::Parser;
use std::path::PathBuf;

use opensees_writer::launcher::SolverLauncher;
use opensees_writer::models::WriteRequest;
use opensees_writer::writer::MAIN_FILE;
use opensees_writer::{ModelDocument, TclWriter, WriterConfig};

/// Write the OpenSees TCL scripts of a model document.
#[derive(Parser)]
#[command(name = "write_tcl", version)]
struct Cli {
    /// Model document (JSON), either bare or wrapped as `{"model": ...}`
    model: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "opensees_model")]
    output: PathBuf,

    /// Open the solver in a terminal once the files are written
    #[arg(long)]
    launch: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opensees_writer=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let json = std::fs::read_to_string(&cli.model)?;
    let model: ModelDocument = match serde_json::from_str::<WriteRequest>(&json) {
        Ok(request) => request.model,
        Err(_) => serde_json::from_str(&json)?,
    };

    let config = WriterConfig::from_env();
    let writer = TclWriter::new(config.clone());
    let report = writer.write_model(&model, &cli.output)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if cli.launch {
        let launcher = SolverLauncher::new(config, std::fs::canonicalize(&cli.output)?);
        let runner = launcher.launch(MAIN_FILE, report.process_count)?;
        tracing::info!("Solver started from {:?}", runner);
    }
    Ok(())
}
