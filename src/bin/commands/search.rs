use crate::error::{CliError, CliResult};
use clap::ArgMatches;
use waypoint::search::client::query_coordinator;

pub async fn handle_search_command(matches: &ArgMatches) -> CliResult<()> {
    let address = matches.value_of("address").ok_or_else(|| CliError::ParseError {
        field: "address".to_string(),
        message: "Coordinator address not specified. Please use the --address option.".to_string(),
    })?;
    let query = matches.value_of("query").ok_or_else(|| CliError::ParseError {
        field: "query".to_string(),
        message: "Search query not specified. Please use the --query option.".to_string(),
    })?;

    let response = query_coordinator(address, query).await?;
    if response.relevant_documents.is_empty() {
        println!("No matching documents");
        return Ok(());
    }

    for (rank, document) in response.relevant_documents.iter().enumerate() {
        println!(
            "{:>3}. {} (score {:.6}, {} bytes)",
            rank + 1,
            document.document_name,
            document.score,
            document.document_size
        );
    }
    Ok(())
}
