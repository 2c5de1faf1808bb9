use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

use crate::auth;
use crate::client::{DEFAULT_TIMEOUT, LicenseClient};
use crate::features::UsageSummary;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputMode {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "lsc", version, about = "CLI for the PCoIP license-compliance API")]
struct Cli {
    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputMode::Text)]
    output: OutputMode,

    /// License server URL or instance id (overrides PCOIP_LS_SERVER)
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Username (overrides PCOIP_LS_USERNAME)
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Password (overrides PCOIP_LS_PASSWORD; use '-' to read from stdin)
    #[arg(short, long, global = true)]
    password: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show used feature counts for the standard and graphics classes
    Features,
    /// Authenticate and print the session token
    Token,
}

fn print_json(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("Value serialization is infallible")
    );
}

fn print_summary(summary: &UsageSummary) {
    println!(
        "standard: {} used of {}",
        summary.standard.used, summary.standard.count
    );
    println!(
        "graphics: {} used of {}",
        summary.graphics.used, summary.graphics.count
    );
}

/// Parse CLI arguments, construct the license client and execute the
/// requested command.
pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let login = auth::resolve_login(
        cli.server.as_deref(),
        cli.username.as_deref(),
        cli.password.as_deref(),
    )?;
    let mut client = LicenseClient::connect(
        &login.server,
        &login.username,
        &login.password,
        Duration::from_secs(cli.timeout),
    )?;

    match cli.command {
        Commands::Features => {
            let summary = client.get_used_features()?;
            match cli.output {
                OutputMode::Json => print_json(&serde_json::to_value(summary)?),
                OutputMode::Text => print_summary(&summary),
            }
        }
        Commands::Token => println!("{}", client.token()),
    }
    Ok(())
}
