//! End-to-end relay tests: real HTTP callers, a real WebSocket executor.

use reqwest::StatusCode;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;

mod common;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[tokio::test]
async fn round_trip_returns_executor_payload() {
    let broker = common::start_broker(addr(38101), |_| {}).await;
    let _executor = common::spawn_executor(&broker, |_, body| {
        json!({"n": body["n"].as_i64().unwrap_or_default() + 1})
    })
    .await;

    let res = common::client()
        .post(broker.url("/v1beta/models/m:generateContent"))
        .json(&json!({"n": 1}))
        .send()
        .await
        .expect("broker unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({"n": 2}));
    assert!(broker.table.is_empty());
}

#[tokio::test]
async fn relayed_task_carries_path_query_and_body() {
    let broker = common::start_broker(addr(38102), |_| {}).await;
    let mut executor = common::connect_executor(&broker).await;

    let caller = tokio::spawn({
        let url = broker.url("/v1beta/models/m:streamGenerateContent?alt=sse");
        async move { common::client().post(url).json(&json!({"contents": []})).send().await }
    });

    let task = common::next_task(&mut executor).await;
    assert_eq!(task["path"], json!("/v1beta/models/m:streamGenerateContent?alt=sse"));
    assert_eq!(task["body"], json!({"contents": []}));
    assert!(task["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert_eq!(broker.table.size(), 1);

    common::reply_success(&mut executor, &task["id"], json!("done")).await;
    let res = caller.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!("done"));
}

#[tokio::test]
async fn no_executor_is_unavailable() {
    let broker = common::start_broker(addr(38103), |_| {}).await;

    let res = common::client()
        .post(broker.url("/v1beta/x"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({"error": {
            "code": 503,
            "message": "Service Unavailable: No executor connected",
            "status": "UNAVAILABLE"
        }})
    );
    assert!(broker.table.is_empty());
}

#[tokio::test]
async fn upstream_failure_is_internal_error() {
    let broker = common::start_broker(addr(38104), |_| {}).await;
    let mut executor = common::connect_executor(&broker).await;

    let caller = tokio::spawn({
        let url = broker.url("/v1beta/x");
        async move { common::client().post(url).json(&json!({"q": 1})).send().await }
    });

    let task = common::next_task(&mut executor).await;
    common::send_reply(
        &mut executor,
        json!({"id": task["id"], "success": false, "error": "quota exhausted"}),
    )
    .await;

    let res = caller.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], json!(500));
    assert_eq!(body["error"]["message"], json!("quota exhausted"));
    assert_eq!(body["error"]["status"], json!("INTERNAL_ERROR"));
}

#[tokio::test]
async fn silent_executor_times_out_and_late_reply_is_ignored() {
    let broker = common::start_broker(addr(38105), |c| c.relay.request_timeout_secs = 1).await;
    let mut executor = common::connect_executor(&broker).await;

    let caller = tokio::spawn({
        let url = broker.url("/v1beta/slow");
        async move { common::client().post(url).json(&json!({})).send().await }
    });
    let stale = common::next_task(&mut executor).await;

    let res = caller.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["message"], json!("Gateway Timeout"));
    assert_eq!(body["error"]["status"], json!("DEADLINE_EXCEEDED"));
    assert!(broker.table.is_empty());

    // the late reply must not disturb the next request
    common::reply_success(&mut executor, &stale["id"], json!("late")).await;

    let caller = tokio::spawn({
        let url = broker.url("/v1beta/fast");
        async move { common::client().post(url).json(&json!({})).send().await }
    });
    let task = common::next_task(&mut executor).await;
    assert_ne!(task["id"], stale["id"]);
    common::reply_success(&mut executor, &task["id"], json!("fresh")).await;

    let res = caller.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!("fresh"));
    assert!(broker.channel.is_connected());
}

#[tokio::test]
async fn disconnect_fails_every_pending_request() {
    let broker = common::start_broker(addr(38106), |_| {}).await;
    let mut executor = common::connect_executor(&broker).await;

    let callers: Vec<_> = (0..3)
        .map(|i| {
            let url = broker.url(&format!("/v1beta/task/{i}"));
            tokio::spawn(async move { common::client().post(url).json(&json!({"i": i})).send().await })
        })
        .collect();

    for _ in 0..3 {
        common::next_task(&mut executor).await;
    }
    assert_eq!(broker.table.size(), 3);

    executor.close(None).await.unwrap();

    for caller in callers {
        let res = caller.await.unwrap().unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"]["message"], json!("Execution node disconnected."));
    }
    assert!(broker.table.is_empty());

    let channel = broker.channel.clone();
    common::wait_until(move || !channel.is_connected()).await;
}

#[tokio::test]
async fn replaced_connection_only_fails_its_own_requests() {
    let broker = common::start_broker(addr(38107), |_| {}).await;
    let mut first = common::connect_executor(&broker).await;

    let old_caller = tokio::spawn({
        let url = broker.url("/v1beta/old");
        async move { common::client().post(url).json(&json!({})).send().await }
    });
    common::next_task(&mut first).await;

    let mut second = common::connect_executor(&broker).await;
    let new_caller = tokio::spawn({
        let url = broker.url("/v1beta/new");
        async move { common::client().post(url).json(&json!({})).send().await }
    });
    let task = common::next_task(&mut second).await;
    assert_eq!(task["path"], json!("/v1beta/new"));

    first.close(None).await.unwrap();

    let res = old_caller.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    assert!(broker.channel.is_connected());
    assert_eq!(broker.table.size(), 1);
    common::reply_success(&mut second, &task["id"], json!({"ok": true})).await;

    let res = new_caller.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({"ok": true}));
}

#[tokio::test]
async fn out_of_order_replies_reach_their_callers() {
    let broker = common::start_broker(addr(38108), |_| {}).await;
    let mut executor = common::connect_executor(&broker).await;

    let callers: Vec<_> = (0..20)
        .map(|i| {
            let url = broker.url(&format!("/v1beta/item/{i}"));
            tokio::spawn(async move {
                let res = common::client().post(url).json(&json!({"i": i})).send().await.unwrap();
                (i, res.status(), res.json::<Value>().await.unwrap())
            })
        })
        .collect();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        tasks.push(common::next_task(&mut executor).await);
    }
    for task in tasks.iter().rev() {
        common::reply_success(&mut executor, &task["id"], json!({"echo": task["body"]["i"]})).await;
    }

    for caller in callers {
        let (i, status, body) = caller.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"echo": i}));
    }
    assert!(broker.table.is_empty());
}

#[tokio::test]
async fn status_document_reflects_executor_and_pending() {
    let broker = common::start_broker(addr(38109), |_| {}).await;
    let client = common::client();

    let status: Value = client.get(broker.url("/")).send().await.unwrap().json().await.unwrap();
    assert_eq!(status, json!({"status": "running", "executorConnected": false, "pendingTasks": 0}));

    let mut executor = common::connect_executor(&broker).await;
    let caller = tokio::spawn({
        let url = broker.url("/v1beta/x");
        async move { common::client().post(url).json(&json!({})).send().await }
    });
    let task = common::next_task(&mut executor).await;

    let status: Value = client.get(broker.url("/")).send().await.unwrap().json().await.unwrap();
    assert_eq!(status, json!({"status": "running", "executorConnected": true, "pendingTasks": 1}));

    common::reply_success(&mut executor, &task["id"], Value::Null).await;
    assert_eq!(caller.await.unwrap().unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn shutdown_fails_pending_requests() {
    let broker = common::start_broker(addr(38110), |_| {}).await;
    let mut executor = common::connect_executor(&broker).await;

    let caller = tokio::spawn({
        let url = broker.url("/v1beta/x");
        async move { common::client().post(url).json(&json!({})).send().await }
    });
    common::next_task(&mut executor).await;

    broker.shutdown.trigger();

    let res = tokio::time::timeout(Duration::from_secs(5), caller)
        .await
        .expect("caller not answered on shutdown")
        .unwrap()
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(broker.table.is_empty());
}

#[tokio::test]
async fn form_body_is_relayed_as_object() {
    let broker = common::start_broker(addr(38111), |_| {}).await;
    let _executor = common::spawn_executor(&broker, |_, body| body.clone()).await;

    let res = common::client()
        .post(broker.url("/v1beta/form"))
        .form(&[("prompt", "hello world"), ("lang", "en")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({"prompt": "hello world", "lang": "en"})
    );
}

#[tokio::test]
async fn silent_idle_executor_is_terminated() {
    let broker = common::start_broker(addr(38112), |c| c.relay.probe_interval_secs = 1).await;
    // never polled, so pings go unanswered
    let _silent = common::connect_executor(&broker).await;

    let channel = broker.channel.clone();
    common::wait_for(Duration::from_secs(5), move || !channel.is_connected()).await;
    assert!(broker.table.is_empty());

    let status: Value = common::client()
        .get(broker.url("/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["executorConnected"], json!(false));
}

#[tokio::test]
async fn responsive_executor_survives_probes() {
    let broker = common::start_broker(addr(38113), |c| c.relay.probe_interval_secs = 1).await;
    let _executor = common::spawn_executor(&broker, |_, body| body.clone()).await;
    let connection = broker.channel.current().map(|c| c.id());

    tokio::time::sleep(Duration::from_millis(3500)).await;

    assert!(broker.channel.is_connected());
    assert_eq!(broker.channel.current().map(|c| c.id()), connection);
}

#[tokio::test]
async fn silent_executor_with_work_in_flight_is_kept() {
    let broker = common::start_broker(addr(38114), |c| c.relay.probe_interval_secs = 1).await;
    let mut executor = common::connect_executor(&broker).await;

    let caller = tokio::spawn({
        let url = broker.url("/v1beta/long");
        async move { common::client().post(url).json(&json!({})).send().await }
    });
    let task = common::next_task(&mut executor).await;

    // stop polling: probes go unanswered while the request is pending
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert!(broker.channel.is_connected());
    assert_eq!(broker.table.size(), 1);

    common::reply_success(&mut executor, &task["id"], json!({"done": true})).await;
    let res = caller.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({"done": true}));
}
