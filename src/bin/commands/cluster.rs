use crate::error::{CliError, CliResult};
use clap::ArgMatches;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use waypoint::config::NodeConfig;
use waypoint::coordination::MemoryEnsemble;
use waypoint::node::Node;
use waypoint::search::HttpWorkerClient;

struct ClusterArgs {
    nodes: u16,
    base_port: u16,
    documents: PathBuf,
    pattern: String,
}

fn validate_args(matches: &ArgMatches) -> CliResult<ClusterArgs> {
    let nodes: u16 = matches
        .value_of("nodes")
        .ok_or_else(|| CliError::ParseError {
            field: "nodes".to_string(),
            message: "Number of nodes not specified. Please use the --nodes option.".to_string(),
        })?
        .parse()
        .map_err(|e| CliError::ParseError {
            field: "nodes".to_string(),
            message: format!("Invalid number of nodes: {} (Please specify a positive integer)", e),
        })?;

    if nodes == 0 {
        return Err(CliError::ParseError {
            field: "nodes".to_string(),
            message: "Number of nodes must be at least 1.".to_string(),
        });
    }

    let base_port: u16 = matches
        .value_of("base-port")
        .unwrap_or("8080")
        .parse()
        .map_err(|e| CliError::ParseError {
            field: "base-port".to_string(),
            message: format!("Invalid port: {}", e),
        })?;

    if base_port == 0 || base_port.checked_add(nodes - 1).is_none() {
        return Err(CliError::ParseError {
            field: "base-port".to_string(),
            message: format!("Ports {}..{} are out of range", base_port, u32::from(base_port) + u32::from(nodes)),
        });
    }

    let documents = PathBuf::from(matches.value_of("documents").ok_or_else(|| CliError::ParseError {
        field: "documents".to_string(),
        message: "Documents directory not specified. Please use the --documents option.".to_string(),
    })?);

    if !documents.is_dir() {
        return Err(CliError::ParseError {
            field: "documents".to_string(),
            message: format!("{} is not a directory", documents.display()),
        });
    }

    let pattern = matches.value_of("pattern").unwrap_or("*.txt").to_string();

    Ok(ClusterArgs {
        nodes,
        base_port,
        documents,
        pattern,
    })
}

/// Starts a local cluster sharing one in-memory coordination ensemble and
/// runs it until Ctrl-C.
pub async fn handle_cluster_command(matches: &ArgMatches, template: &NodeConfig) -> CliResult<()> {
    let args = validate_args(matches)?;
    let ensemble = MemoryEnsemble::new();

    let mut nodes = Vec::with_capacity(usize::from(args.nodes));
    let mut handles = Vec::with_capacity(usize::from(args.nodes));
    for index in 0..args.nodes {
        let mut config = template.clone();
        config.network.port = args.base_port + index;
        config.search.documents_dir = args.documents.clone();
        config.search.documents_pattern = args.pattern.clone();
        config.validate()?;

        let client = HttpWorkerClient::new(config.request_timeout())?;
        let (session, events) = ensemble.connect();
        let node = Node::new(config, Arc::new(session), Arc::new(client))?;
        let handle = node.start(events).map_err(|e| {
            CliError::ClusterError(format!("Failed to start node on port {}: {}", args.base_port + index, e))
        })?;
        println!("Started node {} at {}", handle.node_id(), node.config().base_url());
        nodes.push(node);
        handles.push(handle);
    }

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .map_err(|e| CliError::ClusterError(format!("Failed to install Ctrl-C handler: {}", e)))?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    if let Some(leader) = nodes.iter().find(|node| node.election().is_leader()) {
        println!(
            "Coordinator: {}/search (try: waypoint search --address {}/search --query \"...\")",
            leader.config().base_url(),
            leader.config().base_url()
        );
    }
    println!("Press Ctrl-C to stop the cluster");

    shutdown_rx.recv().await;
    println!("Stopping {} nodes...", handles.len());
    for handle in handles {
        handle.stop().await;
    }
    Ok(())
}
