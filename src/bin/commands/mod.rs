pub mod cluster;
pub mod search;
pub mod status;

pub use cluster::handle_cluster_command;
pub use search::handle_search_command;
pub use status::handle_status_command;
