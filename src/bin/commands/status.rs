use crate::error::{CliError, CliResult};
use clap::ArgMatches;
use waypoint::search::client::fetch_status;

/// Accepts either a node's base URL or its `/status` URL.
fn status_url(address: &str) -> String {
    let address = address.trim_end_matches('/');
    if address.ends_with("/status") {
        address.to_string()
    } else {
        format!("{}/status", address)
    }
}

pub async fn handle_status_command(matches: &ArgMatches) -> CliResult<()> {
    let address = matches.value_of("address").ok_or_else(|| CliError::ParseError {
        field: "address".to_string(),
        message: "Node address not specified. Please use the --address option.".to_string(),
    })?;

    let status = fetch_status(&status_url(address)).await?;
    let pretty = serde_json::to_string_pretty(&status)
        .map_err(|e| CliError::NetworkError(e.to_string()))?;
    println!("{}", pretty);
    Ok(())
}
