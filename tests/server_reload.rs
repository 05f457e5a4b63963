//! Serving, hot swapping and reloading route tables.

use std::fs;
use std::time::{Duration, SystemTime};

use railyard::config::loader::{load_config, parse_config};
use railyard::lifecycle::Application;
use railyard::routing::{HttpMethod, LoadState, RequestEnv, RouteSet};
use reqwest::StatusCode;

mod common;

const ROUTES: &str = r#"
[[routes]]
name = "post"
path = "posts/:id(.:format)"
controller = "posts"
action = "show"
methods = ["get"]

[[routes]]
path = "posts/:id"
controller = "posts"
action = "update"
methods = ["put"]
"#;

const SWAPPED: &str = r#"
[[routes]]
path = "articles/:id"
controller = "articles"
action = "show"
"#;

#[tokio::test]
async fn test_recognition_over_http() {
    let server = common::start_server(ROUTES).await;
    let client = common::client();

    let res = client.get(server.url("/posts/5.json")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["controller"], "posts");
    assert_eq!(body["action"], "show");
    assert_eq!(body["params"]["format"], "json");
    assert_eq!(body["route_name"], "post");

    let res = client.delete(server.url("/posts/5")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()["allow"], "GET, PUT");

    let res = client
        .request(
            reqwest::Method::from_bytes(b"PROPFIND").unwrap(),
            server.url("/posts/5"),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_IMPLEMENTED);

    let res = client.get(server.url("/nothing/here")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let server = common::start_server(ROUTES).await;
    let client = common::client();

    let res = client
        .get(server.url("/posts/1"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-me");

    let res = client.get(server.url("/posts/1")).send().await.unwrap();
    assert!(!res.headers()["x-request-id"].is_empty());

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_hot_swap_replaces_table() {
    let server = common::start_server(ROUTES).await;
    let client = common::client();

    server.updates.send(parse_config(SWAPPED).unwrap()).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let res = client.get(server.url("/articles/4")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = client.get(server.url("/posts/4")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_broken_update_keeps_table() {
    let server = common::start_server(ROUTES).await;
    let client = common::client();

    let broken = parse_config(
        r#"
[[routes]]
path = "orphans/:id"
"#,
    )
    .unwrap();
    server.updates.send(broken).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let res = client.get(server.url("/posts/4")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    server.shutdown.trigger();
}

#[test]
fn test_route_set_reloads_only_when_file_changes() {
    let file = common::route_file(ROUTES);
    let mut set = RouteSet::new();
    set.add_configuration_file(file.path());

    assert_eq!(set.state(), LoadState::Unloaded);
    assert!(set.reload().unwrap());
    assert!(set.is_loaded());
    assert_eq!(set.len(), 2);
    assert!(!set.reload().unwrap());

    fs::write(file.path(), SWAPPED).unwrap();
    fs::File::options()
        .write(true)
        .open(file.path())
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();

    assert!(set.reload().unwrap());
    assert_eq!(set.len(), 1);
    let get = RequestEnv::new(HttpMethod::Get);
    assert!(set.recognize_path("/articles/1", &get).is_ok());
    assert!(set.recognize_path("/posts/1", &get).is_err());
}

#[test]
fn test_failed_load_leaves_set_unloaded() {
    let file = common::route_file("[[routes]]\npath = \"orphans/:id\"\n");
    let mut set = RouteSet::new();
    set.add_configuration_file(file.path());

    assert!(set.load().is_err());
    assert_eq!(set.state(), LoadState::Unloaded);
    assert!(set.is_empty());
}

#[tokio::test]
async fn test_application_lifecycle() {
    let file = common::route_file(&format!(
        r#"
[listener]
bind_address = "127.0.0.1:0"

[routing]
watch = false

{ROUTES}
"#
    ));
    let config = load_config(file.path()).unwrap();
    let app = Application::build(file.path(), config).await.unwrap();
    let addr = app.local_addr().unwrap();
    let shutdown = app.shutdown_handle();
    let reload = app.reload_sender();

    let handle = tokio::spawn(app.run());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = common::client();
    let res = client
        .get(format!("http://{addr}/posts/9"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    reload.send(parse_config(SWAPPED).unwrap()).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let res = client
        .get(format!("http://{addr}/articles/9"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    shutdown.trigger();
    let finished = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(finished.is_ok());
}
