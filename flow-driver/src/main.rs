use std::process::ExitCode;

use clap::Parser;
use flow_driver::Opt;
use tracing_subscriber::EnvFilter;
use utils::DiagnosticEmitter;

fn main() -> ExitCode {
    let opts = Opt::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut diag = DiagnosticEmitter::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()));
    let mut contents = Vec::new();
    for file in &opts.files {
        match std::fs::read_to_string(file) {
            Ok(source) => contents.push((file.as_str(), source)),
            Err(err) => {
                diag.err_ln(&format!("Failed to read '{file}': {err}"));
                return ExitCode::from(2);
            }
        }
    }
    let sources: Vec<(&str, &str)> = contents
        .iter()
        .map(|(path, source)| (*path, source.as_str()))
        .collect();

    if flow_driver::process_sources(&sources, &mut diag, &opts).is_none() {
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}
