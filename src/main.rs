use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rothplan::core::{ScenarioParameters, SimulationOptions, run_comparison_with};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "rothplan",
    about = "Year-by-year retirement projection comparing a baseline against early Roth conversions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run both scenarios and print the comparison as JSON.
    Run {
        #[arg(long, help = "JSON parameter file; missing keys use the built-in household")]
        config: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
        #[arg(long, help = "Do not model the taxable brokerage account")]
        no_taxable_account: bool,
        #[arg(long, help = "Do not charge Medicare IRMAA premiums")]
        no_irmaa: bool,
    },
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn run_projection(
    config: Option<PathBuf>,
    pretty: bool,
    modeling: SimulationOptions,
) -> Result<(), String> {
    let params = match config {
        Some(path) => ScenarioParameters::from_json_file(&path).map_err(|e| e.to_string())?,
        None => ScenarioParameters::default(),
    };

    let comparison = run_comparison_with(&params, modeling);
    let json = if pretty {
        serde_json::to_string_pretty(&comparison)
    } else {
        serde_json::to_string(&comparison)
    }
    .map_err(|e| format!("failed to serialize comparison: {e}"))?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            pretty,
            no_taxable_account,
            no_irmaa,
        } => {
            let modeling = SimulationOptions {
                roth_conversions: false,
                model_taxable_account: !no_taxable_account,
                model_irmaa: !no_irmaa,
            };
            if let Err(e) = run_projection(config, pretty, modeling) {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        Command::Serve { port } => {
            if let Err(e) = rothplan::api::run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
    }
}
