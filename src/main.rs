use clap::Parser;
use snapvault::cli::{Cli, Command, ProfileAction};
use snapvault::config::Config;
use snapvault::engine::Engine;
use snapvault::provider::FileProvider;
use snapvault::registry::Registry;
use snapvault::store::Store;
use snapvault::surface::{self, Operation, Response};
use std::path::PathBuf;

fn operation_for(command: &Command) -> Operation {
    match command {
        Command::Profile(args) => match &args.action {
            ProfileAction::Set { name } => Operation::SetProfile {
                profile: name.clone(),
            },
            ProfileAction::Get => Operation::GetProfile,
            ProfileAction::List => Operation::GetProfiles,
            ProfileAction::Delete { name } => Operation::DeleteProfile {
                profile: name.clone(),
            },
        },
        Command::Snapshot(args) => Operation::Snapshot {
            name: args.name.clone(),
        },
        Command::Restore(args) => Operation::Restore {
            name: args.name.clone(),
        },
        Command::Clear(args) => Operation::Clear {
            name: args.name.clone(),
        },
        Command::List => Operation::GetSnapshots,
        Command::Current => Operation::GetCurrent,
    }
}

fn format_timestamp(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn print_response(response: &Response, json: bool) {
    if json {
        match serde_json::to_string_pretty(response) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => eprintln!("failed to render output: {e}"),
        }
        return;
    }

    match response {
        Response::Ok => {}
        Response::Profile(name) => println!("{name}"),
        Response::Profiles(names) => {
            for name in names {
                println!("{name}");
            }
        }
        Response::Current(Some(ordinal)) => println!("{ordinal}"),
        Response::Current(None) => println!("(none)"),
        Response::Snapshots(snapshots) => {
            if snapshots.is_empty() {
                println!("No snapshots in the active profile.");
                return;
            }

            println!("{:<8} {:<24} {:<20}", "Ordinal", "Name", "Date");
            println!("{}", "-".repeat(54));
            for snapshot in snapshots {
                println!(
                    "{:<8} {:<24} {:<20}",
                    snapshot.ordinal,
                    snapshot.name,
                    format_timestamp(snapshot.timestamp)
                );
            }
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = match Config::resolve(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    // only capture/restore actually touch the live state
    let needs_state = matches!(cli.command, Command::Snapshot(_) | Command::Restore(_));
    if needs_state && config.state_path.is_none() {
        eprintln!("No state file configured. Pass --state or set state_path in config.toml.");
        std::process::exit(2);
    }

    let provider = FileProvider::new(config.state_path.clone().unwrap_or_else(PathBuf::new));

    let store = match Store::open(&config.db_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("error opening snapshot store: {e}");
            std::process::exit(1);
        }
    };

    let registry = match Registry::open(&config.registry_path) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("error opening profile registry: {e}");
            std::process::exit(1);
        }
    };

    let engine = Engine::new(store, registry, provider);
    let operation = operation_for(&cli.command);

    match surface::dispatch(&engine, operation) {
        Ok(response) => print_response(&response, cli.json),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
