//! stratadm - Entry Point
//!
//! Operator tool for storage clusters: resolves services of the cluster
//! topology to their containers and opens sessions into them.

use std::collections::HashMap;
use std::env;

use colored::Colorize;
use stratadm::app::enter::enter;
use stratadm::app::status::{status, ServiceStatus};
use stratadm::app::AppContext;
use stratadm::errors::AdmError;
use stratadm::logs::{init_logging, LogLevel, LogOptions};
use stratadm::session::TransportFactory;
use stratadm::storage::layout::StorageLayout;
use stratadm::storage::settings::Settings;
use stratadm::topology::{FilterOption, Match};
use stratadm::utils::version_info;

use tracing::{error, info};

const USAGE: &str = "\
Usage:
  stratadm enter <ID>                               open a shell in the service container
  stratadm status [--id=ID] [--role=ROLE] [--host=HOST] [--json]
  stratadm --version

Options:
  --home=DIR        configuration directory (default: $STRATADM_HOME or ~/.stratadm)
  --log-level=LEVEL trace, debug, info, warn or error
  --verbose         log to stderr instead of the log file";

#[tokio::main]
async fn main() {
    let code = run_cli().await;
    std::process::exit(code);
}

async fn run_cli() -> i32 {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();
    let mut positional: Vec<String> = Vec::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=').filter(|_| arg.starts_with("--")) {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        } else {
            positional.push(arg.clone());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => return fail(&e.into()),
        }
        return 0;
    }

    if cli_args.contains_key("help") {
        println!("{}", USAGE);
        return 0;
    }
    if positional.is_empty() {
        eprintln!("{}", USAGE);
        return 2;
    }

    let layout = match cli_args.get("home") {
        Some(home) => StorageLayout::new(home),
        None => StorageLayout::default(),
    };

    // Settings decide the log level, so they are read before logging starts
    let settings = match layout.settings_file().read_json_or_default::<Settings>().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} unable to read settings file: {}", "error:".red().bold(), e);
            return 1;
        }
    };

    let log_level = match cli_args.get("log-level").map(|l| l.parse::<LogLevel>()) {
        Some(Ok(level)) => level,
        Some(Err(e)) => return fail(&AdmError::InvalidArgument(e)),
        None => settings.log_level.clone(),
    };
    let log_options = LogOptions {
        log_level,
        stdout: cli_args.contains_key("verbose"),
        log_dir: layout.logs_dir(),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    info!("stratadm {} {:?}", version_info().version, positional);

    let result = match positional[0].as_str() {
        "enter" => run_enter(&layout, &positional).await,
        "status" => run_status(&layout, &cli_args).await,
        other => Err(AdmError::InvalidArgument(format!(
            "unknown command '{}'\n\n{}",
            other, USAGE
        ))),
    };

    match result {
        Ok(code) => code,
        Err(e) => fail(&e),
    }
}

async fn run_enter(layout: &StorageLayout, positional: &[String]) -> Result<i32, AdmError> {
    let [_, id] = positional else {
        return Err(AdmError::InvalidArgument(
            "enter takes exactly one service id".to_string(),
        ));
    };

    let ctx = AppContext::load(layout).await?;
    let factory = TransportFactory::new(ctx.settings.clone());
    let exit = enter(&ctx, &factory, id).await?;
    Ok(exit.exit_status())
}

async fn run_status(
    layout: &StorageLayout,
    cli_args: &HashMap<String, String>,
) -> Result<i32, AdmError> {
    let field = |name: &str| cli_args.get(name).map(|v| Match::parse(v)).unwrap_or_default();
    let filter = FilterOption {
        id: field("id"),
        role: field("role"),
        host: field("host"),
    };
    if let Match::Exact(id) = &filter.id {
        stratadm::topology::check_id(id)?;
    }

    let ctx = AppContext::load(layout).await?;
    let factory = TransportFactory::new(ctx.settings.clone());
    let rows = status(&ctx, &factory, &filter).await?;

    if cli_args.contains_key("json") {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_status(&rows);
    }

    let failed = rows.iter().filter(|row| row.error.is_some()).count();
    Ok(if failed == 0 { 0 } else { 1 })
}

fn print_status(rows: &[ServiceStatus]) {
    println!(
        "{:<14}{:<28}{:<14}{:<16}{:<16}{}",
        "ID", "NAME", "ROLE", "HOST", "CONTAINER", "STATUS"
    );
    for row in rows {
        let container = row.container_id.as_deref().unwrap_or("-");
        let container: String = container.chars().take(12).collect();
        let state = match (&row.status, &row.error) {
            (Some(status), _) if status == "running" => status.green().to_string(),
            (Some(status), _) => status.yellow().to_string(),
            (None, Some(e)) => e.red().to_string(),
            (None, None) => "-".to_string(),
        };
        println!(
            "{:<14}{:<28}{:<14}{:<16}{:<16}{}",
            row.id, row.name, row.role, row.host, container, state
        );
    }
}

fn fail(e: &AdmError) -> i32 {
    error!("{}", e);
    eprintln!("{} {}", "error:".red().bold(), e);
    1
}
