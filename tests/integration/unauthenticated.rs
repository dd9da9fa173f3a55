use std::sync::Arc;

use bearer_dispatch::{NetworkError, RequestDescriptor, RequestManager, WaitingQueue};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::common::{Reply, ScriptedTransport, init_logging};

fn manager_over(transport: &Arc<ScriptedTransport>) -> RequestManager {
    RequestManager::with_max_attempts(transport.clone(), WaitingQueue::shared(), 2).unwrap()
}

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    id: u64,
}

#[tokio::test]
async fn unauthorized_without_credentials_is_a_server_error() {
    init_logging();
    let transport = ScriptedTransport::new(|_| Reply::Status(401, b"denied".to_vec()));
    let manager = manager_over(&transport);

    let err = manager
        .fire_async(Arc::new(RequestDescriptor::get("https://api.example.com/public")))
        .await
        .expect_err("401 without auth is not refreshed");

    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(
        err,
        NetworkError::ServerError {
            status: StatusCode::UNAUTHORIZED,
            body: b"denied".to_vec(),
        }
    );
    assert!(manager.queue().is_empty());
    assert_eq!(transport.sent()[0].header("authorization"), None);
}

#[tokio::test]
async fn server_error_carries_status_and_body() {
    init_logging();
    let transport = ScriptedTransport::new(|_| Reply::Status(503, b"maintenance".to_vec()));
    let manager = manager_over(&transport);

    let err = manager
        .fire_async(Arc::new(RequestDescriptor::delete(
            "https://api.example.com/items/1",
        )))
        .await
        .expect_err("503");

    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert!(err.to_string().contains("503"));
    assert!(err.to_string().contains("maintenance"));
}

#[tokio::test]
async fn missing_response_is_no_connectivity() {
    init_logging();
    for offline in [true, false] {
        let transport = ScriptedTransport::new(move |_| {
            if offline {
                Reply::Offline
            } else {
                Reply::NoBody(200)
            }
        });
        let manager = manager_over(&transport);
        let res = manager
            .fire_async(Arc::new(RequestDescriptor::get("https://api.example.com/x")))
            .await;
        assert_eq!(res, Err(NetworkError::NoConnectivity));
    }
}

#[tokio::test]
async fn success_statuses_return_the_body() {
    init_logging();
    let transport = ScriptedTransport::new(|req| match req.url.path() {
        "/empty" => Reply::status(204),
        _ => Reply::Status(201, b"created".to_vec()),
    });
    let manager = manager_over(&transport);

    let created = manager
        .fire_async(Arc::new(
            RequestDescriptor::post("https://api.example.com/items").with_body("{}"),
        ))
        .await;
    assert_eq!(created, Ok(b"created".to_vec()));

    let empty = manager
        .fire_async(Arc::new(RequestDescriptor::get(
            "https://api.example.com/empty",
        )))
        .await;
    assert_eq!(empty, Ok(Vec::new()));
}

#[tokio::test]
async fn fire_json_decodes_or_reports_parse_failure() {
    init_logging();
    let transport = ScriptedTransport::new(|req| match req.url.path() {
        "/item" => Reply::ok(r#"{"id":42}"#),
        _ => Reply::ok("<html>"),
    });
    let manager = manager_over(&transport);

    let item: Item = manager
        .fire_json(Arc::new(RequestDescriptor::get("https://api.example.com/item")))
        .await
        .expect("json body");
    assert_eq!(item, Item { id: 42 });

    let err = manager
        .fire_json::<Item>(Arc::new(RequestDescriptor::get(
            "https://api.example.com/page",
        )))
        .await
        .expect_err("html body");
    assert_eq!(err, NetworkError::ParseFailure("<html>".into()));
}

#[tokio::test]
async fn unbuildable_requests_are_never_sent() {
    init_logging();
    let transport = ScriptedTransport::new(|_| Reply::ok("unreachable"));
    let manager = manager_over(&transport);

    let res = manager
        .fire_async(Arc::new(RequestDescriptor::get("::not a url::")))
        .await;
    assert_eq!(res, Err(NetworkError::Aborted));

    let res = manager
        .fire_async(Arc::new(
            RequestDescriptor::get("https://api.example.com/x").with_header("X-Bad", "a\r\nb"),
        ))
        .await;
    assert!(matches!(res, Err(NetworkError::Custom(_))));

    assert_eq!(transport.sent_count(), 0);
    assert!(!manager.has_task_in_flight());
}
