use clap::{App, Arg, SubCommand};
use simplelog::{Config, SimpleLogger};
use std::error::Error;
use std::path::Path;
use waypoint::config::ConfigManager;

mod commands;
mod error;

use commands::*;
use error::CliError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let matches = App::new("Waypoint")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Kenny (Miller) Song")
        .about("Leader-elected distributed search CLI")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Loads node settings from a JSON file")
                .global(true)
                .required(false),
        )
        .subcommand(
            SubCommand::with_name("cluster")
                .about("Run a local cluster of nodes")
                .arg(
                    Arg::new("nodes")
                        .short('n')
                        .long("nodes")
                        .value_name("NODES")
                        .help("Sets the number of nodes")
                        .required(true),
                )
                .arg(
                    Arg::new("base-port")
                        .short('p')
                        .long("base-port")
                        .value_name("PORT")
                        .help("Sets the port of the first node; node i listens on PORT + i")
                        .required(false),
                )
                .arg(
                    Arg::new("documents")
                        .short('d')
                        .long("documents")
                        .value_name("DIR")
                        .help("Sets the directory holding the documents to search")
                        .required(true),
                )
                .arg(
                    Arg::new("pattern")
                        .long("pattern")
                        .value_name("GLOB")
                        .help("Sets the file pattern of the documents (default *.txt)")
                        .required(false),
                ),
        )
        .subcommand(
            SubCommand::with_name("search")
                .about("Send a search query to the coordinator")
                .arg(
                    Arg::new("address")
                        .short('a')
                        .long("address")
                        .value_name("URL")
                        .help("Specify the coordinator's search endpoint")
                        .required(true),
                )
                .arg(
                    Arg::new("query")
                        .short('q')
                        .long("query")
                        .value_name("QUERY")
                        .help("Specify the search query")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("status")
                .about("Check the status of a node")
                .arg(
                    Arg::new("address")
                        .short('a')
                        .long("address")
                        .value_name("URL")
                        .help("Specify the node's base URL")
                        .required(true),
                ),
        )
        .get_matches();

    let manager = match matches.value_of("config") {
        Some(path) => ConfigManager::from_file(Path::new(path)),
        None => Ok(ConfigManager::new()),
    };
    let manager = match manager {
        Ok(manager) => manager,
        Err(err) => {
            eprintln!("Error: {}", CliError::from(err));
            std::process::exit(1);
        }
    };
    let config = manager.into_config();
    let _ = SimpleLogger::init(config.log_level(), Config::default());

    let result = match matches.subcommand() {
        Some(("cluster", sub_matches)) => handle_cluster_command(sub_matches, &config).await,
        Some(("search", sub_matches)) => handle_search_command(sub_matches).await,
        Some(("status", sub_matches)) => handle_status_command(sub_matches).await,
        Some((cmd, _)) => Err(CliError::UnknownCommand(cmd.to_string())),
        None => Err(CliError::NoCommand),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    Ok(())
}
