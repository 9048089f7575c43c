//! REST API tests driven through the router with `oneshot`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use fogmesh_api::{BackgroundTasks, build_router};
use fogmesh_core::{Application, Assignment, Infrastructure, Location, Mode, Node, NodeProfile, Placement};
use fogmesh_deploy::{Manager, ManagerConfig, NodeInventory, ProvisionError, Provisioner};
use fogmesh_placement::{PlacementEngine, PlacementResult};

struct StaticInventory(Vec<Node>);

#[async_trait]
impl NodeInventory for StaticInventory {
    async fn nodes(&self) -> Vec<Node> {
        self.0.clone()
    }
}

/// Places every service on the first node.
struct FirstNodeEngine;

#[async_trait]
impl PlacementEngine for FirstNodeEngine {
    async fn resolve(&self, _mode: Mode, app: &Application, infra: &Infrastructure) -> PlacementResult<Placement> {
        let node = &infra.nodes[0];
        Ok(Placement {
            probability: 1.0,
            assignments: app
                .services
                .iter()
                .map(|s| Assignment {
                    service_id: s.id.clone(),
                    node_id: node.id.clone(),
                    node_name: node.name.clone(),
                })
                .collect(),
        })
    }
}

struct NoopProvisioner;

#[async_trait]
impl Provisioner for NoopProvisioner {
    async fn apply(&self, _app: &Application, _placement: &Placement) -> Vec<ProvisionError> {
        Vec::new()
    }

    async fn teardown(&self, _app: &Application) -> Vec<ProvisionError> {
        Vec::new()
    }
}

fn node(id: &str, name: &str) -> Node {
    Node {
        id: id.to_string(),
        name: name.to_string(),
        address: "10.0.0.1".to_string(),
        location: Location::default(),
        profiles: vec![NodeProfile {
            probability: 1.0,
            hw_caps: 4,
            iot_caps: vec![],
            sec_caps: vec![],
        }],
    }
}

fn setup() -> (Router, Arc<Manager>) {
    let (router, manager, _) = setup_with_tasks();
    (router, manager)
}

fn setup_with_tasks() -> (Router, Arc<Manager>, BackgroundTasks) {
    let inventory: Arc<dyn NodeInventory> = Arc::new(StaticInventory(vec![node("uid-1", "edge-1")]));
    let manager = Arc::new(Manager::new(
        Arc::new(FirstNodeEngine),
        Arc::new(NoopProvisioner),
        inventory.clone(),
        ManagerConfig::default(),
    ));
    let tasks = BackgroundTasks::new();
    (build_router(manager.clone(), inventory, tasks.clone()), manager, tasks)
}

fn app_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": "demo",
        "services": [
            { "id": "web", "t_proc": 1, "hw_reqs": 1, "images": [{ "name": "nginx:1.27" }] },
            { "id": "db", "t_proc": 1, "hw_reqs": 1, "images": [{ "name": "postgres:16" }] }
        ],
        "flows": [{ "src": "web", "dst": "db", "bandwidth": 10 }],
        "max_latency": [{ "chain": ["web", "db"], "value": 50 }]
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn wait_until<F, Fut>(mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if cond().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn list_applications_starts_empty() {
    let (app, _) = setup();
    let resp = app.oneshot(empty("GET", "/api/v1/applications")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], json!([]));
}

#[tokio::test]
async fn create_is_accepted_and_deployed_in_background() {
    let (app, manager) = setup();
    let resp = app
        .clone()
        .oneshot(post("/api/v1/applications", &app_json("app1")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let json = body_json(resp).await;
    assert_eq!(json["data"]["id"], "app1");

    wait_until(|| {
        let manager = manager.clone();
        async move { manager.get_deploy_by_application_id("app1").await.is_some() }
    })
    .await;

    let resp = app.oneshot(empty("GET", "/api/v1/applications/app1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["data"]["application"]["id"], "app1");
    assert_eq!(json["data"]["placement"]["assignments"][0]["node_name"], "edge-1");
}

#[tokio::test]
async fn get_unknown_application_is_404() {
    let (app, _) = setup();
    let resp = app.oneshot(empty("GET", "/api/v1/applications/ghost")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn invalid_submissions_are_rejected() {
    let (app, manager) = setup();

    let mut no_services = app_json("app1");
    no_services["services"] = json!([]);

    let mut dangling_flow = app_json("app2");
    dangling_flow["flows"] = json!([{ "src": "web", "dst": "cache", "bandwidth": 1 }]);

    let mut duplicate = app_json("app3");
    duplicate["services"][1]["id"] = json!("web");

    for body in [no_services, dangling_flow, duplicate, app_json(" ")] {
        let resp = app
            .clone()
            .oneshot(post("/api/v1/applications", &body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    assert!(manager.deployments().await.is_empty());
}

#[tokio::test]
async fn delete_unknown_application_is_404() {
    let (app, _) = setup();
    let resp = app.oneshot(empty("DELETE", "/api/v1/applications/ghost")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_application_in_background() {
    let (app, manager) = setup();
    let new_app: Application = serde_json::from_value(app_json("app1")).unwrap();
    manager.add_application(new_app).await.unwrap();

    let resp = app.oneshot(empty("DELETE", "/api/v1/applications/app1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    wait_until(|| {
        let manager = manager.clone();
        async move { manager.get_deploy_by_application_id("app1").await.is_none() }
    })
    .await;
}

#[tokio::test]
async fn list_nodes_returns_inventory() {
    let (app, _) = setup();
    let resp = app.oneshot(empty("GET", "/api/v1/nodes")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["data"][0]["id"], "uid-1");
    assert_eq!(json["data"][0]["name"], "edge-1");
}

#[tokio::test]
async fn accepted_requests_finish_when_tasks_drain() {
    let (app, manager, tasks) = setup_with_tasks();

    let resp = app
        .clone()
        .oneshot(post("/api/v1/applications", &app_json("app1")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    tasks.drain().await;
    assert!(manager.get_deploy_by_application_id("app1").await.is_some());

    let resp = app.oneshot(empty("DELETE", "/api/v1/applications/app1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    tasks.drain().await;
    assert!(manager.get_deploy_by_application_id("app1").await.is_none());
    assert!(tasks.is_empty());
}
