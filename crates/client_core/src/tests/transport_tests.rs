use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::Path,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::json;
use shared::{domain::ServiceName, error::FetchErrorKind};
use tokio::net::TcpListener;

use super::*;
use crate::test_support::{deployment, description, service};

const API_PREFIX: &str = "/ecs-deploy/api/v1";

async fn spawn_api_server(routes: Router) -> Result<Url> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().nest(API_PREFIX, routes);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(Url::parse(&format!("http://{addr}{API_PREFIX}"))?)
}

fn fetcher(base_url: Url, token: Option<&str>) -> HttpFetcher {
    HttpFetcher::new(base_url, token.map(str::to_owned), Duration::from_secs(5))
        .expect("http fetcher")
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some("Bearer secret")
}

fn deployment_routes() -> Router {
    Router::new()
        .route(
            "/deploy/list",
            get(|headers: HeaderMap| async move {
                if !authorized(&headers) {
                    return Err(StatusCode::UNAUTHORIZED);
                }
                Ok(Json(json!({
                    "deployments": [
                        deployment("web", "2024-03-05T14:07:09Z"),
                        deployment("worker", "2024-03-04T10:00:00Z"),
                    ]
                })))
            }),
        )
        .route(
            "/deploy/list/:service",
            get(|Path(service): Path<String>| async move {
                Json(json!({ "deployments": [deployment(&service, "2024-03-05T14:07:09Z")] }))
            }),
        )
        .route(
            "/service/list",
            get(|| async { Json(json!({ "services": [service("web"), service("worker")] })) }),
        )
}

#[tokio::test]
async fn fetches_full_list_with_bearer_token() {
    let base_url = spawn_api_server(deployment_routes()).await.expect("spawn server");
    let items = fetcher(base_url, Some("secret"))
        .fetch(&Resource::deployments())
        .await
        .expect("deployments");

    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["ServiceName"], "web");
}

#[tokio::test]
async fn missing_token_is_reported_as_unauthorized() {
    let base_url = spawn_api_server(deployment_routes()).await.expect("spawn server");
    let err = fetcher(base_url, None)
        .fetch(&Resource::deployments())
        .await
        .expect_err("rejected");

    assert_eq!(err.kind, FetchErrorKind::Unauthorized);
    assert!(err.requires_reauth());
    assert_eq!(err.user_message(), "Token expired, log in again");
}

#[tokio::test]
async fn service_scoped_list_uses_service_path_segment() {
    let base_url = spawn_api_server(deployment_routes()).await.expect("spawn server");
    let items = fetcher(base_url, Some("secret"))
        .fetch(&Resource::deployments_for(ServiceName::from("billing-api")))
        .await
        .expect("deployments");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["ServiceName"], "billing-api");
}

#[tokio::test]
async fn services_are_read_from_their_own_collection() {
    let base_url = spawn_api_server(deployment_routes()).await.expect("spawn server");
    let items = fetcher(base_url, None)
        .fetch(&Resource::Services)
        .await
        .expect("services");

    let names: Vec<&str> = items.iter().filter_map(|item| item["S"].as_str()).collect();
    assert_eq!(names, vec!["web", "worker"]);
}

#[tokio::test]
async fn service_descriptions_share_the_services_field() {
    let routes = Router::new().route(
        "/service/describe",
        get(|| async { Json(json!({ "services": [description("web", Vec::new())] })) }),
    );
    let base_url = spawn_api_server(routes).await.expect("spawn server");
    let items = fetcher(base_url, None)
        .fetch(&Resource::ServiceDescriptions)
        .await
        .expect("descriptions");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["serviceName"], "web");
}

#[tokio::test]
async fn error_field_in_ok_response_is_a_server_failure() {
    let routes = Router::new().route(
        "/deploy/list",
        get(|| async { Json(json!({ "error": "could not query deployments" })) }),
    );
    let base_url = spawn_api_server(routes).await.expect("spawn server");
    let err = fetcher(base_url, None)
        .fetch(&Resource::deployments())
        .await
        .expect_err("server failure");

    assert_eq!(err.kind, FetchErrorKind::Server);
    assert_eq!(err.message, "could not query deployments");
}

#[tokio::test]
async fn null_collection_is_empty() {
    let routes = Router::new().route(
        "/service/list",
        get(|| async { Json(json!({ "services": null })) }),
    );
    let base_url = spawn_api_server(routes).await.expect("spawn server");
    let items = fetcher(base_url, None)
        .fetch(&Resource::Services)
        .await
        .expect("services");

    assert!(items.is_empty());
}

#[tokio::test]
async fn gateway_timeout_is_reported_as_unavailable() {
    let routes = Router::new().route(
        "/deploy/list",
        get(|| async { StatusCode::GATEWAY_TIMEOUT }),
    );
    let base_url = spawn_api_server(routes).await.expect("spawn server");
    let err = fetcher(base_url, None)
        .fetch(&Resource::deployments())
        .await
        .expect_err("unavailable");

    assert_eq!(err.kind, FetchErrorKind::Unavailable);
    assert_eq!(
        err.user_message(),
        "Couldn't connect to the backend - try again later"
    );
}

#[tokio::test]
async fn other_error_status_is_a_transport_failure() {
    let routes = Router::new().route(
        "/deploy/list",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base_url = spawn_api_server(routes).await.expect("spawn server");
    let err = fetcher(base_url, None)
        .fetch(&Resource::deployments())
        .await
        .expect_err("transport");

    assert_eq!(err.kind, FetchErrorKind::Transport);
}

#[tokio::test]
async fn non_json_body_is_a_decode_failure() {
    let routes = Router::new().route("/deploy/list", get(|| async { "<html>login</html>" }));
    let base_url = spawn_api_server(routes).await.expect("spawn server");
    let err = fetcher(base_url, None)
        .fetch(&Resource::deployments())
        .await
        .expect_err("decode");

    assert_eq!(err.kind, FetchErrorKind::Decode);
}

#[tokio::test]
async fn unreachable_backend_is_reported_as_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let base_url = Url::parse(&format!("http://{addr}{API_PREFIX}")).expect("url");
    let err = fetcher(base_url, None)
        .fetch(&Resource::deployments())
        .await
        .expect_err("unreachable");

    assert_eq!(err.kind, FetchErrorKind::Unavailable);
}

#[test]
fn urls_extend_the_base_path() {
    let fetcher = fetcher(
        Url::parse("https://deploy.example.com/ecs-deploy/api/v1/").expect("url"),
        None,
    );

    assert_eq!(
        fetcher.url_for(&Resource::deployments()).expect("url").as_str(),
        "https://deploy.example.com/ecs-deploy/api/v1/deploy/list"
    );
    assert_eq!(
        fetcher
            .url_for(&Resource::deployments_for(ServiceName::from("web api")))
            .expect("url")
            .as_str(),
        "https://deploy.example.com/ecs-deploy/api/v1/deploy/list/web%20api"
    );
    assert_eq!(
        fetcher.url_for(&Resource::Services).expect("url").as_str(),
        "https://deploy.example.com/ecs-deploy/api/v1/service/list"
    );
    assert_eq!(
        fetcher
            .url_for(&Resource::ServiceDescriptions)
            .expect("url")
            .as_str(),
        "https://deploy.example.com/ecs-deploy/api/v1/service/describe"
    );
}
