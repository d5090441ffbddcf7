//! Flow engine tests against an in-process mock transport.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert2::{check, let_assert};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use serde_json::json;
use url::Url;

use aqueduct::{
    AbortReason, Body, Client, Context, DecodeMode, Error, Flow, MergeOptions, Method,
    RawResponse, Response, Transport, WireRequest, abort_pair, middleware,
};

type Responder = Box<dyn Fn(&WireRequest, u32) -> aqueduct::Result<RawResponse> + Send + Sync>;

/// Records every wire request and answers via a configurable responder.
struct MockTransport {
    calls: Mutex<Vec<WireRequest>>,
    respond: Option<Responder>,
}

impl MockTransport {
    fn with(
        respond: impl Fn(&WireRequest, u32) -> aqueduct::Result<RawResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Some(Box::new(respond)),
        })
    }

    fn ok_json(body: serde_json::Value) -> Arc<Self> {
        Self::with(move |request, _| Ok(raw_json(&request.url, &body)))
    }

    /// A transport whose exchange never completes.
    fn pending() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: None,
        })
    }

    fn call_count(&self) -> u32 {
        u32::try_from(self.calls.lock().unwrap().len()).unwrap()
    }

    fn last_call(&self) -> Option<WireRequest> {
        self.calls.lock().unwrap().last().cloned()
    }
}

impl Transport for MockTransport {
    fn send(&self, _ctx: Context, request: WireRequest) -> BoxFuture<'static, aqueduct::Result<RawResponse>> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(request.clone());
        let attempt = u32::try_from(calls.len()).unwrap();
        drop(calls);

        match &self.respond {
            None => Box::pin(std::future::pending()),
            Some(respond) => {
                let result = respond(&request, attempt);
                Box::pin(async move { result })
            }
        }
    }
}

fn raw_json(url: &Url, body: &serde_json::Value) -> RawResponse {
    let mut headers = http::HeaderMap::new();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    RawResponse {
        status: 200,
        status_text: "OK".to_string(),
        headers,
        url: url.clone(),
        body: Bytes::from(body.to_string()),
    }
}

fn client_with(transport: Arc<MockTransport>) -> Client {
    let base = Url::parse("https://api.example.com/").unwrap();
    Client::builder().base_url(base).transport(transport).build()
}

#[tokio::test]
async fn handlers_run_as_an_onion() {
    let mock = MockTransport::ok_json(json!({"ok": true}));
    let events = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    let outer_events = Arc::clone(&events);
    let inner_events = Arc::clone(&events);
    let client = client_with(Arc::clone(&mock));

    let response = client
        .get("items")
        .flow(Flow::from_fn(move |_scope, next| {
            let events = Arc::clone(&outer_events);
            async move {
                events.lock().unwrap().push("outer:before");
                let result = next.run().await;
                events.lock().unwrap().push("outer:after");
                result
            }
        }))
        .flow(Flow::from_fn(move |_scope, next| {
            let events = Arc::clone(&inner_events);
            async move {
                events.lock().unwrap().push("inner:before");
                let result = next.run().await;
                events.lock().unwrap().push("inner:after");
                result
            }
        }))
        .send()
        .await
        .unwrap();

    check!(response.ok());
    check!(mock.call_count() == 1);
    check!(
        *events.lock().unwrap()
            == vec!["outer:before", "inner:before", "inner:after", "outer:after"]
    );
}

#[tokio::test]
async fn default_flows_run_ahead_of_call_flows() {
    let mock = MockTransport::ok_json(json!({}));
    let events = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    let default_events = Arc::clone(&events);
    let call_events = Arc::clone(&events);

    let base = Url::parse("https://api.example.com/").unwrap();
    let client = Client::builder()
        .base_url(base)
        .transport(mock.clone())
        .flow(Flow::from_fn(move |_scope, next| {
            let events = Arc::clone(&default_events);
            async move {
                events.lock().unwrap().push("default");
                next.run().await
            }
        }))
        .build();

    client
        .get("items")
        .flow(Flow::from_fn(move |_scope, next| {
            let events = Arc::clone(&call_events);
            async move {
                events.lock().unwrap().push("call");
                next.run().await
            }
        }))
        .send()
        .await
        .unwrap();

    check!(*events.lock().unwrap() == vec!["default", "call"]);
}

#[tokio::test]
async fn nested_groups_execute_in_visual_order() {
    let mock = MockTransport::ok_json(json!({}));
    let events = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    let tag = |label: &'static str, events: &Arc<Mutex<Vec<&'static str>>>| {
        let events = Arc::clone(events);
        Flow::from_fn(move |_scope, next| {
            let events = Arc::clone(&events);
            async move {
                events.lock().unwrap().push(label);
                next.run().await
            }
        })
    };

    let client = client_with(Arc::clone(&mock));
    client
        .get("items")
        .flow(tag("a", &events))
        .flow(Flow::group(vec![
            tag("b", &events),
            Flow::group(vec![tag("c", &events)]),
        ]))
        .flow(tag("d", &events))
        .send()
        .await
        .unwrap();

    check!(*events.lock().unwrap() == vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn merge_flow_rewrites_the_request() {
    let mock = MockTransport::ok_json(json!({}));
    let client = client_with(Arc::clone(&mock));

    client
        .get("items")
        .flow(Flow::merge(
            MergeOptions::new()
                .method(Method::Post)
                .query("audit", "1")
                .header("x-env", "test")
                .unwrap(),
        ))
        .send()
        .await
        .unwrap();

    let wire = mock.last_call().unwrap();
    check!(wire.method == Method::Post);
    check!(wire.url.query() == Some("audit=1"));
    check!(wire.headers.get("x-env").unwrap() == "test");
}

#[tokio::test]
async fn short_circuit_skips_the_transport() {
    let mock = MockTransport::ok_json(json!({}));
    let client = client_with(Arc::clone(&mock));

    let response = client
        .get("items")
        .flow(Flow::from_fn(|scope, _next| async move {
            let url = scope.request().url().clone();
            Ok(Response::new(
                DecodeMode::Auto,
                Some(Body::Text("cached".to_string())),
                None,
                http::HeaderMap::new(),
                true,
                200,
                "OK",
                url,
            ))
        }))
        .send()
        .await
        .unwrap();

    check!(response.text() == Some("cached"));
    check!(mock.call_count() == 0);
}

#[tokio::test]
async fn abort_before_next_stops_the_chain() {
    let mock = MockTransport::ok_json(json!({}));
    let client = client_with(Arc::clone(&mock));

    let result = client
        .get("items")
        .flow(Flow::from_fn(|scope, next| async move {
            scope.abort("not today");
            next.run().await
        }))
        .send()
        .await;

    let_assert!(Err(Error::Aborted(reason)) = result);
    check!(reason == AbortReason::from("not today"));
    check!(mock.call_count() == 0);
}

#[tokio::test]
async fn first_abort_reason_wins() {
    let mock = MockTransport::ok_json(json!({}));
    let client = client_with(Arc::clone(&mock));

    let result = client
        .get("items")
        .flow(Flow::from_fn(|scope, next| async move {
            scope.abort("first");
            scope.abort("second");
            next.run().await
        }))
        .send()
        .await;

    let_assert!(Err(Error::Aborted(reason)) = result);
    check!(reason == AbortReason::from("first"));
}

#[tokio::test]
async fn provide_flows_downstream_not_upstream() {
    let mock = MockTransport::ok_json(json!({}));
    let client = client_with(Arc::clone(&mock));

    let upstream_saw = Arc::new(Mutex::new(None::<bool>));
    let downstream_saw = Arc::new(Mutex::new(None::<String>));

    let upstream_slot = Arc::clone(&upstream_saw);
    let downstream_slot = Arc::clone(&downstream_saw);

    client
        .get("items")
        .flow(Flow::from_fn(move |scope, next| {
            let slot = Arc::clone(&upstream_slot);
            async move {
                scope.provide("token", "abc123".to_string());
                let result = next.run().await;
                // Values provided deeper in the chain stay invisible here.
                *slot.lock().unwrap() = Some(scope.inject::<String>("deep").is_some());
                result
            }
        }))
        .flow(Flow::from_fn(move |scope, next| {
            let slot = Arc::clone(&downstream_slot);
            async move {
                scope.provide("deep", "hidden".to_string());
                *slot.lock().unwrap() = scope.inject::<String>("token").map(|t| (*t).clone());
                next.run().await
            }
        }))
        .send()
        .await
        .unwrap();

    check!(*upstream_saw.lock().unwrap() == Some(false));
    check!(*downstream_saw.lock().unwrap() == Some("abc123".to_string()));
}

#[tokio::test]
async fn signal_aborts_an_in_flight_exchange() {
    let mock = MockTransport::pending();
    let (handle, signal) = abort_pair();
    let client = client_with(Arc::clone(&mock));

    let send = client.get("slow").signal(Arc::new(signal)).send();
    let (result, ()) = tokio::join!(send, async {
        tokio::task::yield_now().await;
        handle.abort();
    });

    let_assert!(Err(Error::Aborted(reason)) = result);
    check!(reason == AbortReason::Canceled);
    check!(mock.call_count() == 1);
}

#[tokio::test]
async fn pre_aborted_signal_never_reaches_the_transport() {
    let mock = MockTransport::ok_json(json!({}));
    let (handle, signal) = abort_pair();
    handle.abort();

    let client = client_with(Arc::clone(&mock));
    let result = client.get("items").signal(Arc::new(signal)).send().await;

    let_assert!(Err(Error::Aborted(_)) = result);
    check!(mock.call_count() == 0);
}

#[tokio::test(start_paused = true)]
async fn timeout_middleware_aborts_a_slow_exchange() {
    let mock = MockTransport::pending();
    let client = client_with(Arc::clone(&mock));

    let result = client
        .get("slow")
        .flow(middleware::timeout(Duration::from_millis(50)))
        .send()
        .await;

    let_assert!(Err(err) = result);
    check!(err.is_timeout());
    check!(mock.call_count() == 1);
}

#[tokio::test]
async fn retry_reinvokes_until_success() {
    let mock = MockTransport::with(|request, attempt| {
        if attempt < 3 {
            Err(Error::connection("connection reset"))
        } else {
            Ok(raw_json(&request.url, &json!({"attempt": attempt})))
        }
    });
    let client = client_with(Arc::clone(&mock));

    let response = client
        .get("flaky")
        .flow(middleware::retry(3))
        .send()
        .await
        .unwrap();

    check!(response.ok());
    check!(mock.call_count() == 3);
}

#[tokio::test]
async fn retry_gives_up_after_the_attempt_budget() {
    let mock = MockTransport::with(|_, _| Err(Error::connection("connection reset")));
    let client = client_with(Arc::clone(&mock));

    let result = client.get("down").flow(middleware::retry(3)).send().await;

    let_assert!(Err(err) = result);
    check!(err.is_connection());
    check!(mock.call_count() == 3);
}

#[tokio::test]
async fn retry_never_reruns_an_aborted_chain() {
    let mock = MockTransport::ok_json(json!({}));
    let inner_runs = Arc::new(AtomicU32::new(0));
    let client = client_with(Arc::clone(&mock));

    let runs = Arc::clone(&inner_runs);
    let result = client
        .get("items")
        .flow(middleware::retry(3))
        .flow(Flow::from_fn(move |scope, _next| {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Err(scope.err("user canceled"))
            }
        }))
        .send()
        .await;

    let_assert!(Err(Error::Aborted(_)) = result);
    check!(inner_runs.load(Ordering::SeqCst) == 1);
    check!(mock.call_count() == 0);
}

#[tokio::test]
async fn terminal_step_encodes_body_and_query() {
    let mock = MockTransport::ok_json(json!({}));
    let client = client_with(Arc::clone(&mock));

    client
        .post("submit")
        .query_body(&json!({"a": 1, "b": "x"}))
        .unwrap()
        .query("page", "2")
        .send()
        .await
        .unwrap();

    let wire = mock.last_call().unwrap();
    check!(wire.body.as_deref() == Some(b"a=1&b=x".as_slice()));
    check!(wire.url.query() == Some("page=2"));
    check!(
        wire.headers.get(http::header::CONTENT_TYPE).unwrap()
            == "application/x-www-form-urlencoded"
    );
}

#[tokio::test]
async fn call_headers_override_same_named_defaults() {
    let mock = MockTransport::ok_json(json!({}));
    let client = Client::builder()
        .base_url(Url::parse("https://api.example.com/").unwrap())
        .header("x-tenant", "alpha")
        .unwrap()
        .header("accept", "application/json")
        .unwrap()
        .transport(Arc::clone(&mock) as Arc<dyn Transport>)
        .build();

    client
        .get("items")
        .header("x-tenant", "beta")
        .unwrap()
        .header("x-tenant", "gamma")
        .unwrap()
        .send()
        .await
        .unwrap();

    let wire = mock.last_call().unwrap();
    // The default value is gone; both call values survive in order.
    let tenants: Vec<_> = wire.headers.get_all("x-tenant").iter().collect();
    check!(tenants == ["beta", "gamma"]);
    // Defaults the call never names are untouched.
    check!(wire.headers.get(http::header::ACCEPT).unwrap() == "application/json");
}
