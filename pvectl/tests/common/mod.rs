//! Mock cluster management API for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use pvectl::api::{ApiClient, ClientConfig};
use pvectl::retry::RetryPolicy;

/// One request as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
}

/// Cluster contents and injected faults.
#[derive(Default)]
pub struct Cluster {
    guests: Vec<Value>,
    nodes: Vec<Value>,
    failing: HashMap<u32, (u16, String)>,
    unavailable_dispatches: HashMap<u32, u32>,
    unavailable_listings: u32,
    exit_status: HashMap<u32, String>,
    running: HashSet<u32>,
    requests: Vec<Request>,
    authorization: Option<String>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, name: &str, status: &str) -> Self {
        self.nodes.push(json!({ "node": name, "status": status, "type": "node" }));
        self
    }

    pub fn vm(self, id: u32, node: &str, name: &str, status: &str) -> Self {
        self.guest(id, node, "qemu", name, status, "")
    }

    pub fn container(self, id: u32, node: &str, name: &str, status: &str) -> Self {
        self.guest(id, node, "lxc", name, status, "")
    }

    pub fn guest(
        mut self,
        id: u32,
        node: &str,
        type_tag: &str,
        name: &str,
        status: &str,
        tags: &str,
    ) -> Self {
        self.guests.push(json!({
            "id": format!("{type_tag}/{id}"),
            "vmid": id,
            "node": node,
            "type": type_tag,
            "name": name,
            "status": status,
            "tags": tags,
            "template": 0,
        }));
        self
    }

    /// Every dispatch for `id` is rejected with `status`.
    pub fn failing(mut self, id: u32, status: u16, message: &str) -> Self {
        self.failing.insert(id, (status, message.to_string()));
        self
    }

    /// The first `times` dispatches for `id` answer 503.
    pub fn unavailable_dispatches(mut self, id: u32, times: u32) -> Self {
        self.unavailable_dispatches.insert(id, times);
        self
    }

    /// The first `times` cluster listings answer 503.
    pub fn unavailable_listings(mut self, times: u32) -> Self {
        self.unavailable_listings = times;
        self
    }

    /// Tasks for `id` stop with `exit_status` instead of `OK`.
    pub fn exit_status(mut self, id: u32, exit_status: &str) -> Self {
        self.exit_status.insert(id, exit_status.to_string());
        self
    }

    /// Tasks for `id` never finish.
    pub fn running(mut self, id: u32) -> Self {
        self.running.insert(id);
        self
    }

    fn handle(&mut self, method: Method, path: &str) -> Response {
        let segments: Vec<&str> = path
            .trim_start_matches("/api2/json/")
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match (method, segments.as_slice()) {
            (Method::GET, ["cluster", "resources"]) => {
                if self.unavailable_listings > 0 {
                    self.unavailable_listings -= 1;
                    return error(StatusCode::SERVICE_UNAVAILABLE, "proxy busy");
                }
                data(Value::Array(self.guests.clone()))
            }
            (Method::GET, ["nodes"]) => data(Value::Array(self.nodes.clone())),
            (Method::GET, ["nodes", node, kind @ ("qemu" | "lxc")]) => {
                let rows = self
                    .guests
                    .iter()
                    .filter(|g| g["node"] == *node && g["type"] == *kind)
                    .map(|g| {
                        let mut row = g.clone();
                        if let Some(row) = row.as_object_mut() {
                            row.remove("node");
                            row.remove("type");
                        }
                        row
                    })
                    .collect();
                data(Value::Array(rows))
            }
            (Method::GET, ["nodes", _, "tasks", task, "status"]) => self.task_status(task),
            (Method::POST, ["nodes", node, kind, id, "status", action]) => {
                self.dispatch(node, kind, id, action)
            }
            (Method::POST, ["nodes", node, kind, id, "template"]) => {
                self.dispatch(node, kind, id, "template")
            }
            (Method::DELETE, ["nodes", node, kind, id]) => self.dispatch(node, kind, id, "destroy"),
            _ => error(StatusCode::NOT_IMPLEMENTED, "Method not implemented"),
        }
    }

    fn dispatch(&mut self, node: &str, kind: &str, id: &str, action: &str) -> Response {
        let Ok(id) = id.parse::<u32>() else {
            return error(StatusCode::BAD_REQUEST, "invalid vmid");
        };
        let exists = self
            .guests
            .iter()
            .any(|g| g["vmid"] == id && g["node"] == node && g["type"] == kind);
        if !exists {
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Configuration file for {id} does not exist"),
            );
        }
        if let Some((status, message)) = self.failing.get(&id) {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return error(status, message);
        }
        if let Some(remaining) = self.unavailable_dispatches.get_mut(&id)
            && *remaining > 0
        {
            *remaining -= 1;
            return error(StatusCode::SERVICE_UNAVAILABLE, "proxy busy");
        }
        data(json!(format!("UPID:{node}:{id}:{action}:root@pam:")))
    }

    fn task_status(&self, task: &str) -> Response {
        let Some(id) = task.split(':').nth(2).and_then(|id| id.parse::<u32>().ok()) else {
            return error(StatusCode::BAD_REQUEST, "unable to parse worker upid");
        };
        if self.running.contains(&id) {
            return data(json!({ "status": "running" }));
        }
        let exit_status = self
            .exit_status
            .get(&id)
            .cloned()
            .unwrap_or_else(|| "OK".to_string());
        data(json!({ "status": "stopped", "exitstatus": exit_status }))
    }
}

fn data(value: Value) -> Response {
    Json(json!({ "data": value })).into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "data": null, "message": format!("{message}\n") }))).into_response()
}

type Shared = Arc<Mutex<Cluster>>;

async fn handler(State(cluster): State<Shared>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    let mut cluster = cluster.lock().unwrap();
    cluster.authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    cluster.requests.push(Request {
        method: method.clone(),
        path: uri.path().to_string(),
    });
    cluster.handle(method, uri.path())
}

/// Mock API server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    cluster: Shared,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn(cluster: Cluster) -> Self {
        let cluster = Arc::new(Mutex::new(cluster));
        let router = Router::new().fallback(handler).with_state(cluster.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            cluster,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client config with short poll and backoff intervals.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.url());
        config.poll_interval = Duration::from_millis(10);
        config.retry = RetryPolicy::new(3, Duration::from_millis(5), Duration::from_millis(20));
        config
    }

    pub fn client(&self) -> Arc<ApiClient> {
        Arc::new(ApiClient::new(self.config()).expect("Failed to build client"))
    }

    pub fn requests(&self) -> Vec<Request> {
        self.cluster.lock().unwrap().requests.clone()
    }

    /// Requests with the given method whose path ends with `suffix`.
    pub fn count(&self, method: Method, suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path.ends_with(suffix))
            .count()
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.cluster.lock().unwrap().authorization.clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
