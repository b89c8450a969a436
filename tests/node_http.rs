use actix_web::{App, http::StatusCode, test, web};
use futures_util::future::BoxFuture;
use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use waypoint::config::NodeConfig;
use waypoint::coordination::{EventReceiver, MemoryEnsemble};
use waypoint::node::server::{self, DEBUG_HEADER, DEBUG_INFO_HEADER, STATUS_MESSAGE};
use waypoint::node::{Node, NodeStatus, ServiceMode};
use waypoint::search::client::query_coordinator;
use waypoint::search::{
    HttpWorkerClient, SearchRequest, SearchResponse, SearchResult, SearchWorker, Task, TaskResult,
    WorkerClient,
};

/// Runs every task in-process.
struct InProcessClient;

impl WorkerClient for InProcessClient {
    fn send_task<'a>(&'a self, _address: &'a str, task: &'a Task) -> BoxFuture<'a, SearchResult<TaskResult>> {
        Box::pin(async move { Ok(SearchWorker::new().process_task(task)) })
    }
}

fn config_for(documents: &Path, port: u16) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.network.port = port;
    config.search.documents_dir = documents.to_path_buf();
    config
}

fn joined_node(ensemble: &MemoryEnsemble, documents: &Path, port: u16) -> (Node, EventReceiver) {
    let (session, mut events) = ensemble.connect();
    let node = Node::new(
        config_for(documents, port),
        Arc::new(session),
        Arc::new(InProcessClient),
    )
    .unwrap();
    node.event_loop().drain(&mut events);
    (node, events)
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Test for the status endpoint.
///
/// # Purpose
/// `/status` reports liveness together with the node's role.
///
/// # Steps
/// 1. Join a single node, which becomes coordinator.
/// 2. Request `/status` and verify the body.
#[actix_rt::test]
async fn test_status_reports_role() {
    let ensemble = MemoryEnsemble::new();
    let dir = tempdir().unwrap();
    let (node, _events) = joined_node(&ensemble, dir.path(), 8080);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(node.server_state()))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/status").to_request();
    let status: NodeStatus = test::call_and_read_body_json(&app, req).await;

    assert_eq!(status.message, STATUS_MESSAGE);
    assert_eq!(status.mode, ServiceMode::Coordinator);
    assert_eq!(status.election_role, "Leader");
    assert_eq!(status.node_id, node.node_id());
    assert!(status.identity.is_some());
}

/// Test for role gating of the endpoints.
///
/// # Purpose
/// A coordinator refuses tasks and a worker refuses searches.
///
/// # Steps
/// 1. Join a coordinator and a worker.
/// 2. Post a task to the coordinator and a search to the worker.
/// 3. Verify both answer 503.
#[actix_rt::test]
async fn test_endpoints_are_gated_by_role() {
    let ensemble = MemoryEnsemble::new();
    let dir = tempdir().unwrap();
    let (leader, _leader_events) = joined_node(&ensemble, dir.path(), 8080);
    let (worker, _worker_events) = joined_node(&ensemble, dir.path(), 8081);

    let leader_app = test::init_service(
        App::new()
            .app_data(web::Data::new(leader.server_state()))
            .configure(server::configure),
    )
    .await;
    let req = test::TestRequest::post()
        .uri("/task")
        .set_json(Task::default())
        .to_request();
    let resp = test::call_service(&leader_app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let worker_app = test::init_service(
        App::new()
            .app_data(web::Data::new(worker.server_state()))
            .configure(server::configure),
    )
    .await;
    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(SearchRequest::new("dog"))
        .to_request();
    let resp = test::call_service(&worker_app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// Test for the worker endpoint with debug timing.
///
/// # Purpose
/// A worker processes posted tasks and reports handling time on request.
///
/// # Steps
/// 1. Join a coordinator and a worker and write one document.
/// 2. Post a task with `X-Debug: true` to the worker.
/// 3. Verify the result and the `X-Debug-Info` header.
#[actix_rt::test]
async fn test_task_endpoint_with_debug_header() {
    let ensemble = MemoryEnsemble::new();
    let dir = tempdir().unwrap();
    let document = dir.path().join("a.txt");
    fs::write(&document, "dog cat dog bird").unwrap();
    let (_leader, _leader_events) = joined_node(&ensemble, dir.path(), 8080);
    let (worker, _worker_events) = joined_node(&ensemble, dir.path(), 8081);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(worker.server_state()))
            .configure(server::configure),
    )
    .await;
    let req = test::TestRequest::post()
        .uri("/task")
        .insert_header((DEBUG_HEADER, "true"))
        .set_json(Task::new(vec!["dog".to_string()], vec![document.clone()]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let debug_info = resp
        .headers()
        .get(DEBUG_INFO_HEADER)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(debug_info.starts_with("Operation took "));
    assert!(debug_info.ends_with(" ns"));

    let result: TaskResult = test::read_body_json(resp).await;
    let data = &result.document_to_document_data[&document.to_string_lossy().to_string()];
    assert_eq!(data.frequency("dog"), 0.5);
}

#[actix_rt::test]
async fn test_malformed_task_yields_empty_result() {
    let ensemble = MemoryEnsemble::new();
    let dir = tempdir().unwrap();
    let (_leader, _leader_events) = joined_node(&ensemble, dir.path(), 8080);
    let (worker, _worker_events) = joined_node(&ensemble, dir.path(), 8081);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(worker.server_state()))
            .configure(server::configure),
    )
    .await;
    let req = test::TestRequest::post()
        .uri("/task")
        .set_payload("{\"search_terms\": 7")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert!(resp.headers().get(DEBUG_INFO_HEADER).is_none());

    let result: TaskResult = test::read_body_json(resp).await;
    assert!(result.is_empty());
}

/// Test for the coordinator endpoint.
///
/// # Purpose
/// The leader fans a search out to the registered workers and ranks the
/// results.
///
/// # Steps
/// 1. Join a coordinator and two workers over two documents.
/// 2. Drain the coordinator's events so it sees both workers.
/// 3. Post a search and verify the tie between the two documents.
#[actix_rt::test]
async fn test_search_endpoint_ranks_documents() {
    let ensemble = MemoryEnsemble::new();
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "dog runs dog home").unwrap();
    fs::write(dir.path().join("b.txt"), "cat sleeps").unwrap();
    let (leader, mut leader_events) = joined_node(&ensemble, dir.path(), 8080);
    let (_first, _first_events) = joined_node(&ensemble, dir.path(), 8081);
    let (_second, _second_events) = joined_node(&ensemble, dir.path(), 8082);
    leader.event_loop().drain(&mut leader_events);
    assert_eq!(leader.workers().get_addresses().len(), 2);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(leader.server_state()))
            .configure(server::configure),
    )
    .await;
    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(SearchRequest::new("dog cat"))
        .to_request();
    let response: SearchResponse = test::call_and_read_body_json(&app, req).await;

    let names: Vec<_> = response
        .relevant_documents
        .iter()
        .map(|d| d.document_name.as_str())
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert_eq!(
        response.relevant_documents[0].score,
        response.relevant_documents[1].score
    );
}

#[actix_rt::test]
async fn test_metrics_endpoint() {
    let ensemble = MemoryEnsemble::new();
    let dir = tempdir().unwrap();
    let (node, _events) = joined_node(&ensemble, dir.path(), 8080);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(node.server_state()))
            .configure(server::configure),
    )
    .await;
    let req = test::TestRequest::get().uri("/metrics").to_request();
    let body = test::call_and_read_body(&app, req).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("waypoint_leadership_acquired_total"));
}

/// Test for a small cluster over real HTTP.
///
/// # Purpose
/// Three started nodes elect a coordinator that answers searches by calling
/// the other two over HTTP.
///
/// # Steps
/// 1. Start three nodes on free ports sharing one ensemble.
/// 2. Wait until the leader sees two workers.
/// 3. Query the leader and verify the ranking, then stop every node.
#[actix_rt::test]
async fn test_cluster_over_http() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ensemble = MemoryEnsemble::new();
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "dog runs dog home").unwrap();
    fs::write(dir.path().join("b.txt"), "cat sleeps").unwrap();

    let mut nodes = Vec::new();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let (session, events) = ensemble.connect();
        let node = Node::new(
            config_for(dir.path(), free_port()),
            Arc::new(session),
            Arc::new(HttpWorkerClient::new(Duration::from_secs(5)).unwrap()),
        )
        .unwrap();
        handles.push(node.start(events).unwrap());
        nodes.push(node);
    }

    let mut leader = None;
    for _ in 0..100 {
        leader = nodes
            .iter()
            .find(|node| node.election().is_leader())
            .filter(|node| node.workers().cached_addresses().is_some_and(|a| a.len() == 2));
        if leader.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let leader = leader.expect("no coordinator with two workers");

    let address = format!("{}/search", leader.config().base_url());
    let response = query_coordinator(&address, "dog cat").await.unwrap();
    let names: Vec<_> = response
        .relevant_documents
        .iter()
        .map(|d| d.document_name.as_str())
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);

    for handle in handles {
        handle.stop().await;
    }
}
