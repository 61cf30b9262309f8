use couch_percentiles::{N1qlClient, N1qlConfig, QueryError, QueryRequest, QueryRow};
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

// Helper: a client config aimed at the given mockito server URL.
fn n1ql_config(server_url: &str) -> N1qlConfig {
    N1qlConfig {
        server_url: server_url.to_string(),
        timeout: Duration::from_secs(1000),
        request_timeout: Duration::from_secs(5),
        username: None,
        password: None,
    }
}

#[test]
fn test_request_body_named_params() {
    let request = QueryRequest::new("select 1").named("start", 100).named("$end", 160);
    let body = request.to_body(Duration::from_secs(1000));
    assert_eq!(
        body,
        json!({
            "statement": "select 1",
            "timeout": "1000000ms",
            "$start": 100,
            "$end": 160,
        })
    );
}

#[test]
fn test_request_body_positional_args() {
    let request = QueryRequest::new("select * from stats where timestamp > $1").arg(4400);
    let body = request.to_body(Duration::from_millis(1500));
    assert_eq!(body["args"], json!([4400]));
    assert_eq!(body["timeout"], json!("1500ms"));
}

#[test]
fn test_client_rejects_empty_url() {
    let err = N1qlClient::new(n1ql_config("")).err().unwrap();
    assert!(matches!(err, QueryError::InvalidConfig(_)));
}

#[test]
fn test_client_rejects_half_credentials() {
    let mut config = n1ql_config("http://localhost:8093");
    config.username = Some("admin".into());
    let err = N1qlClient::new(config).err().unwrap();
    assert!(matches!(err, QueryError::InvalidConfig(_)));
}

#[test]
fn test_service_urls_trim_trailing_slash() {
    let client = N1qlClient::new(n1ql_config("http://localhost:8093/")).unwrap();
    assert_eq!(client.service_url(), "http://localhost:8093/query/service");
    assert_eq!(client.ping_url(), "http://localhost:8093/admin/ping");
}

#[tokio::test]
async fn test_query_returns_rows_in_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/query/service")
        .match_body(Matcher::PartialJson(json!({
            "statement": "select 1",
            "$start": 10,
            "$end": 70,
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "status": "success",
                "results": [
                    {"metric": "a", "subtype": "1", "timeMsec": "5"},
                    {"metric": "a", "subtype": "1", "timeMsec": "9"},
                ],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = N1qlClient::new(n1ql_config(&server.url())).unwrap();
    let request = QueryRequest::new("select 1").named("start", 10).named("end", 70);
    let rows: Vec<QueryRow> = client.query_rows(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].metric.as_deref(), Some("a"));
    assert_eq!(rows[1].time_msec.as_ref().unwrap().to_string(), "9");
}

#[tokio::test]
async fn test_query_sends_basic_auth() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/query/service")
        .match_header("authorization", "Basic YWRtaW46c2VjcmV0")
        .with_status(200)
        .with_body(json!({"status": "success", "results": []}).to_string())
        .create_async()
        .await;

    let mut config = n1ql_config(&server.url());
    config.username = Some("admin".into());
    config.password = Some("secret".into());
    let client = N1qlClient::new(config).unwrap();

    let rows = client.query(&QueryRequest::new("select 1")).await.unwrap();
    mock.assert_async().await;
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_query_service_error_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/query/service")
        .with_status(200)
        .with_body(
            json!({
                "status": "errors",
                "errors": [{"code": 3000, "msg": "syntax error - at from"}],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = N1qlClient::new(n1ql_config(&server.url())).unwrap();
    let err = client.query(&QueryRequest::new("select from")).await.unwrap_err();
    match err {
        QueryError::QueryFailed { status, message } => {
            assert_eq!(status, "errors");
            assert_eq!(message, "[3000] syntax error - at from");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_query_http_error_uses_service_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/query/service")
        .with_status(401)
        .with_body(
            json!({
                "status": "fatal",
                "errors": [{"code": 10000, "msg": "Authentication Failure"}],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = N1qlClient::new(n1ql_config(&server.url())).unwrap();
    let err = client.query(&QueryRequest::new("select 1")).await.unwrap_err();
    match err {
        QueryError::HttpError(code, message) => {
            assert_eq!(code, 401);
            assert_eq!(message, "[10000] Authentication Failure");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_query_http_error_without_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/query/service")
        .with_status(503)
        .create_async()
        .await;

    let client = N1qlClient::new(n1ql_config(&server.url())).unwrap();
    let err = client.query(&QueryRequest::new("select 1")).await.unwrap_err();
    assert!(matches!(err, QueryError::HttpError(503, _)));
}

#[tokio::test]
async fn test_query_malformed_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/query/service")
        .with_status(200)
        .with_body("<html>proxy</html>")
        .create_async()
        .await;

    let client = N1qlClient::new(n1ql_config(&server.url())).unwrap();
    let err = client.query(&QueryRequest::new("select 1")).await.unwrap_err();
    assert!(matches!(err, QueryError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_query_rows_malformed_row() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/query/service")
        .with_status(200)
        .with_body(
            json!({
                "status": "success",
                "results": [{"metric": "a", "subtype": 1, "timeMsec": 1}, {"metric": 7}],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = N1qlClient::new(n1ql_config(&server.url())).unwrap();
    let err = client
        .query_rows::<QueryRow>(&QueryRequest::new("select 1"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::MalformedRow { index: 1, .. }));
}

#[tokio::test]
async fn test_ping() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/admin/ping")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = N1qlClient::new(n1ql_config(&server.url())).unwrap();
    client.ping().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ping_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/admin/ping")
        .with_status(500)
        .create_async()
        .await;

    let client = N1qlClient::new(n1ql_config(&server.url())).unwrap();
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, QueryError::HttpError(500, _)));
}
