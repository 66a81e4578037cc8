//! HTTP-level tests for DroneClient against a mock Drone server.

use drone_client::{BuildParams, BuildStatus, CiClient, ClientError, DroneClient, DroneConfig};
use mockito::Matcher;

fn client_for(server: &mockito::ServerGuard) -> DroneClient {
    DroneClient::new(DroneConfig::new(&server.url(), "secret-token")).expect("client")
}

fn build_json(number: u64, source: &str, status: &str) -> String {
    serde_json::json!({
        "id": number + 1000,
        "number": number,
        "status": status,
        "event": "push",
        "source": source,
        "target": source,
        "created": 1700000000,
    })
    .to_string()
}

/// Test: latest build of a branch is fetched with the bearer token
#[tokio::test]
async fn test_last_build_sends_branch_and_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Regex(r"^/api/repos/octo/app/builds/latest".to_string()))
        .match_query(Matcher::UrlEncoded("branch".to_string(), "main".to_string()))
        .match_header("authorization", "Bearer secret-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(build_json(12, "main", "running"))
        .create_async()
        .await;

    let build = client_for(&server)
        .last_build("octo", "app", "main")
        .await
        .expect("last build");

    mock.assert_async().await;
    assert_eq!(build.number, 12);
    assert_eq!(build.status, BuildStatus::Running);
}

/// Test: 404 maps to NotFound so callers can treat absence as durable
#[tokio::test]
async fn test_missing_build_is_not_found() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/repos/octo/app/builds/99")
        .with_status(404)
        .with_body("{\"message\":\"Not Found\"}")
        .create_async()
        .await;

    let err = client_for(&server)
        .build("octo", "app", 99)
        .await
        .expect_err("should fail");

    assert!(err.is_not_found(), "got {err:?}");
}

/// Test: server errors keep status and body
#[tokio::test]
async fn test_server_error_is_http() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/repos/octo/app/builds")
        .with_status(500)
        .with_body("database locked")
        .create_async()
        .await;

    let err = client_for(&server)
        .list_builds("octo", "app")
        .await
        .expect_err("should fail");

    assert_eq!(
        err,
        ClientError::Http {
            status: 500,
            body: "database locked".to_string()
        }
    );
}

/// Test: list keeps server order (newest first)
#[tokio::test]
async fn test_list_builds_preserves_order() {
    let mut server = mockito::Server::new_async().await;
    let body = format!(
        "[{},{},{}]",
        build_json(9, "main", "failure"),
        build_json(8, "dev", "success"),
        build_json(7, "main", "success")
    );
    server
        .mock("GET", "/api/repos/octo/app/builds")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let builds = client_for(&server)
        .list_builds("octo", "app")
        .await
        .expect("list");

    let numbers: Vec<u64> = builds.iter().map(|b| b.number).collect();
    assert_eq!(numbers, vec![9, 8, 7]);
    assert_eq!(builds[0].status, BuildStatus::Failing);
}

/// Test: promote passes target environment and params as query values
#[tokio::test]
async fn test_promote_sends_target_and_params() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock(
            "POST",
            Matcher::Regex(r"^/api/repos/octo/app/builds/42/promote".to_string()),
        )
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("target".to_string(), "production".to_string()),
            Matcher::UrlEncoded("IMAGE_TAG".to_string(), "v1.2.3".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(build_json(43, "main", "pending"))
        .create_async()
        .await;

    let mut params = BuildParams::new();
    params.insert("IMAGE_TAG".to_string(), "v1.2.3".to_string());

    let build = client_for(&server)
        .promote_build("octo", "app", 42, "production", &params)
        .await
        .expect("promote");

    mock.assert_async().await;
    assert_eq!(build.number, 43);
}

/// Test: restart posts to the build and returns the new build
#[tokio::test]
async fn test_restart_returns_new_build() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Regex(r"^/api/repos/octo/app/builds/5".to_string()))
        .match_query(Matcher::UrlEncoded(
            "DRONE_UPSTREAM_BUILD_NUMBER".to_string(),
            "77".to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(build_json(6, "main", "pending"))
        .create_async()
        .await;

    let mut params = BuildParams::new();
    params.insert("DRONE_UPSTREAM_BUILD_NUMBER".to_string(), "77".to_string());

    let build = client_for(&server)
        .restart_build("octo", "app", 5, &params)
        .await
        .expect("restart");

    mock.assert_async().await;
    assert_eq!(build.number, 6);
    assert_eq!(build.status, BuildStatus::Pending);
}

/// Test: cancel issues DELETE and rejected tokens surface as Unauthorized
#[tokio::test]
async fn test_cancel_build() {
    let mut server = mockito::Server::new_async().await;
    let ok = server
        .mock("DELETE", "/api/repos/octo/app/builds/6")
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("DELETE", "/api/repos/octo/app/builds/7")
        .with_status(401)
        .create_async()
        .await;

    let client = client_for(&server);
    client.cancel_build("octo", "app", 6).await.expect("cancel");
    ok.assert_async().await;

    let err = client
        .cancel_build("octo", "app", 7)
        .await
        .expect_err("should be rejected");
    assert!(matches!(err, ClientError::Unauthorized(_)));
}
