//! HTTP surface of a node.
//!
//! # Endpoints
//!
//! | Function          | Type  | Endpoint   | Description                                              |
//! |-------------------|-------|------------|----------------------------------------------------------|
//! | [`node_status`]   | GET   | `/status`  | Liveness plus the node's role and election identity.     |
//! | [`handle_task`]   | POST  | `/task`    | Worker endpoint: JSON `Task` in, JSON `TaskResult` out.   |
//! | [`handle_search`] | POST  | `/search`  | Coordinator endpoint: JSON `SearchRequest` in, ranking out. |
//! | [`metrics`]       | GET   | `/metrics` | Prometheus metrics in text format.                       |
//!
//! `/task` answers 503 unless the node is a worker and `/search` answers 503
//! unless it is the coordinator. Sending `X-Debug: true` adds an
//! `X-Debug-Info` header with the handling time.

use crate::cluster::leader::LeaderElection;
use crate::metrics::{REQUEST_HISTOGRAM, gather_text};
use crate::node::role::{RoleController, ServiceMode};
use crate::search::{SearchCoordinator, SearchWorker};
use actix_web::dev::Server;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, Responder, web};
use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

pub const STATUS_MESSAGE: &str = "Server is alive";
pub const DEBUG_HEADER: &str = "X-Debug";
pub const DEBUG_INFO_HEADER: &str = "X-Debug-Info";

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct ServerState {
    pub node_id: String,
    pub started_at: DateTime<Utc>,
    pub election: Arc<LeaderElection>,
    pub role: Arc<RoleController>,
    pub worker: SearchWorker,
    pub coordinator: Arc<SearchCoordinator>,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub message: String,
    pub node_id: String,
    pub mode: ServiceMode,
    pub election_role: String,
    pub identity: Option<String>,
    pub uptime_secs: i64,
}

/// Registers every route of a node.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/status", web::get().to(node_status))
        .route(SearchWorker::ENDPOINT, web::post().to(handle_task))
        .route(SearchCoordinator::ENDPOINT, web::post().to(handle_search))
        .route("/metrics", web::get().to(metrics));
}

fn debug_requested(req: &HttpRequest) -> bool {
    req.headers()
        .get(DEBUG_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

fn json_response(req: &HttpRequest, payload: Vec<u8>, started: Instant) -> HttpResponse {
    let mut response = HttpResponse::Ok();
    response.content_type("application/json");
    if debug_requested(req) {
        let elapsed = started.elapsed().as_nanos();
        response.insert_header((DEBUG_INFO_HEADER, format!("Operation took {} ns", elapsed)));
    }
    response.body(payload)
}

/// Reports liveness, service mode and election identity.
pub async fn node_status(data: web::Data<ServerState>) -> impl Responder {
    let status = NodeStatus {
        message: STATUS_MESSAGE.to_string(),
        node_id: data.node_id.clone(),
        mode: data.role.mode(),
        election_role: data.election.role().to_string(),
        identity: data.election.identity(),
        uptime_secs: (Utc::now() - data.started_at).num_seconds(),
    };
    HttpResponse::Ok().json(status)
}

/// Processes a task on the worker's blocking pool.
pub async fn handle_task(
    req: HttpRequest,
    body: web::Bytes,
    data: web::Data<ServerState>,
) -> HttpResponse {
    let timer = REQUEST_HISTOGRAM.start_timer();
    if data.role.mode() != ServiceMode::Worker {
        timer.observe_duration();
        return HttpResponse::ServiceUnavailable().body("This node is not serving tasks");
    }

    let started = Instant::now();
    let worker = data.worker;
    let result = web::block(move || worker.handle_request(&body)).await;
    timer.observe_duration();
    match result {
        Ok(payload) => json_response(&req, payload, started),
        Err(e) => {
            error!("Task processing failed: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Runs a search across the registered workers.
pub async fn handle_search(
    req: HttpRequest,
    body: web::Bytes,
    data: web::Data<ServerState>,
) -> HttpResponse {
    let timer = REQUEST_HISTOGRAM.start_timer();
    if data.role.mode() != ServiceMode::Coordinator {
        timer.observe_duration();
        return HttpResponse::ServiceUnavailable().body("This node is not the coordinator");
    }

    let started = Instant::now();
    let payload = data.coordinator.handle_request(&body).await;
    timer.observe_duration();
    json_response(&req, payload, started)
}

pub async fn metrics() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(gather_text())
}

/// Binds the node's HTTP server. The returned server must be awaited or
/// spawned to run.
pub fn run_server(state: ServerState, host: &str, port: u16) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(configure)
    })
    .workers(2)
    .shutdown_timeout(2)
    .disable_signals()
    .bind((host, port))?
    .run();
    Ok(server)
}
