//! The request dispatcher: global headers, lifecycle hooks, and the
//! send pipeline.
//!
//! # Design
//! A `Dispatcher` owns its global headers and two single-occupant hook slots
//! (before-send, after-send); registering a hook replaces the previous one.
//! Each call runs one linear pipeline:
//!
//! 1. resolve the response kind and build the `HttpRequest` (`prepare`);
//! 2. run the before-send hook;
//! 3. make exactly one `Transport::send`;
//! 4. reject non-2xx statuses, otherwise decode by response kind.
//!
//! The after-send hook runs from a drop guard, so it fires exactly once per
//! `send` whatever the outcome, including when the future is dropped
//! mid-flight.
//!
//! # Concurrency
//! Headers and hook slots sit behind locks and `send` takes `&self`, so any
//! number of calls may share one dispatcher. Calls are not coordinated:
//! headers are snapshotted when a call starts, but the hook slots are read
//! twice, once before the transport call and once when the call finishes.
//! A hook replaced while a call is in flight can therefore leave that call
//! running the old before-send hook and the new after-send hook.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::body;
use crate::decode;
use crate::error::{RequestError, Result};
use crate::headers::HeaderSet;
use crate::http::HttpRequest;
use crate::transport::Transport;
use crate::types::{DispatcherDefaults, RequestConfig, ResponseKind, ResponseValue};

/// A zero-argument lifecycle callback.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    global_headers: RwLock<HeaderSet>,
    before_send: RwLock<Hook>,
    after_send: RwLock<Hook>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_defaults(transport, DispatcherDefaults::default())
    }

    pub fn with_defaults(transport: Arc<dyn Transport>, defaults: DispatcherDefaults) -> Self {
        Self {
            transport,
            global_headers: RwLock::new(defaults.headers),
            before_send: RwLock::new(noop()),
            after_send: RwLock::new(noop()),
        }
    }

    /// Merge `headers` into the global set, overwriting same-named entries.
    pub fn set_global_headers<I, K, V>(&self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.global_headers.write().extend(headers);
    }

    /// Remove each named global header. Absent names are ignored.
    pub fn remove_global_headers<I, K>(&self, names: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut global = self.global_headers.write();
        for name in names {
            global.remove(name);
        }
    }

    pub fn global_headers(&self) -> HeaderSet {
        self.global_headers.read().clone()
    }

    /// Replace the before-send hook.
    pub fn before_request(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.before_send.write() = Arc::new(hook);
    }

    /// Replace the after-send hook.
    pub fn after_request(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.after_send.write() = Arc::new(hook);
    }

    /// Build the request `config` describes without running hooks or I/O.
    ///
    /// Headers are the current global headers with `config.headers` laid
    /// over them; the body follows the `BodyEncoding` decision. A blank
    /// payload (see `Payload::is_blank`) is treated as no payload.
    pub fn prepare(&self, config: &RequestConfig) -> Result<HttpRequest> {
        let mut headers = self.global_headers().merged(&config.headers);
        let body = match config.data.as_ref().filter(|payload| !payload.is_blank()) {
            Some(payload) => Some(body::encode(payload, &mut headers)?),
            None => None,
        };
        Ok(HttpRequest {
            method: config.method,
            url: config.url.clone(),
            headers: headers.into_pairs(),
            body,
        })
    }

    /// Send one request and decode the response by `config.response_type`.
    ///
    /// Errors are logged once and returned. The after-send hook runs exactly
    /// once, after the outcome is known.
    pub async fn send(&self, config: RequestConfig) -> Result<ResponseValue> {
        let _after_send = AfterSend(&self.after_send);
        let result = self.dispatch(config).await;
        if let Err(error) = &result {
            tracing::error!(%error, "request error");
        }
        result
    }

    /// Blocking form of [`Dispatcher::send`], driven on a private
    /// current-thread runtime.
    ///
    /// Called from within an async runtime it fails with
    /// [`RequestError::Runtime`] instead of blocking that runtime; the
    /// after-send hook still runs.
    pub fn send_blocking(&self, config: RequestConfig) -> Result<ResponseValue> {
        let runtime = if tokio::runtime::Handle::try_current().is_ok() {
            Err("send_blocking called from within an async runtime".to_string())
        } else {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| e.to_string())
        };
        match runtime {
            Ok(runtime) => runtime.block_on(self.send(config)),
            Err(reason) => {
                let _after_send = AfterSend(&self.after_send);
                let error = RequestError::Runtime(reason);
                tracing::error!(%error, "request error");
                Err(error)
            }
        }
    }

    async fn dispatch(&self, config: RequestConfig) -> Result<ResponseValue> {
        let kind: ResponseKind = config.response_type.parse()?;
        let request = self.prepare(&config)?;
        tracing::debug!(method = %request.method, url = %request.url, %kind, "sending request");

        // Clone out of the slot so a hook may re-register hooks.
        let before_send = self.before_send.read().clone();
        before_send();

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(RequestError::Transport {
                status: response.status,
                status_text: response.status_text,
            });
        }
        decode::decode(kind, response).await
    }
}

fn noop() -> Hook {
    Arc::new(|| {})
}

/// Runs the after-send hook current at drop time.
struct AfterSend<'a>(&'a RwLock<Hook>);

impl Drop for AfterSend<'_> {
    fn drop(&mut self) {
        let hook = self.0.read().clone();
        hook();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, HttpResponse, RequestBody};
    use crate::test_util::CapturedLogs;
    use crate::types::{FormData, Payload};
    use futures_util::FutureExt;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    type Events = Arc<Mutex<Vec<&'static str>>>;
    type Reply = Box<dyn Fn() -> Result<HttpResponse> + Send + Sync>;

    /// In-memory transport that records requests and replays a canned reply.
    struct RecordingTransport {
        events: Events,
        requests: Mutex<Vec<HttpRequest>>,
        reply: Reply,
        hang: bool,
    }

    #[async_trait::async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.events.lock().push("transport");
            self.requests.lock().push(request);
            if self.hang {
                std::future::pending::<()>().await;
            }
            (self.reply)()
        }
    }

    fn reply(status: u16, status_text: &str, content_type: &str, body: &str) -> Reply {
        let response = HttpResponse {
            status,
            status_text: status_text.to_string(),
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body: body.as_bytes().to_vec(),
        };
        Box::new(move || -> Result<HttpResponse> { Ok(response.clone()) })
    }

    fn ok_json() -> Reply {
        reply(200, "OK", "application/json", r#"{"ok":true}"#)
    }

    struct Harness {
        dispatcher: Dispatcher,
        transport: Arc<RecordingTransport>,
        events: Events,
    }

    impl Harness {
        fn new(reply: Reply) -> Self {
            Self::build(reply, false)
        }

        fn build(reply: Reply, hang: bool) -> Self {
            let events: Events = Arc::default();
            let transport = Arc::new(RecordingTransport {
                events: events.clone(),
                requests: Mutex::new(Vec::new()),
                reply,
                hang,
            });
            let dispatcher = Dispatcher::new(transport.clone());
            let before = events.clone();
            dispatcher.before_request(move || before.lock().push("before"));
            let after = events.clone();
            dispatcher.after_request(move || after.lock().push("after"));
            Self {
                dispatcher,
                transport,
                events,
            }
        }

        fn last_request(&self) -> HttpRequest {
            self.transport.requests.lock().last().cloned().unwrap()
        }

        fn events(&self) -> Vec<&'static str> {
            self.events.lock().clone()
        }
    }

    // --- headers ---

    #[tokio::test]
    async fn per_call_header_overrides_global() {
        let h = Harness::new(ok_json());
        h.dispatcher
            .set_global_headers([("Authorization", "Bearer global"), ("X-App", "shiblin")]);

        let config = RequestConfig::new("/me").header("authorization", "Bearer call");
        h.dispatcher.send(config).await.unwrap();

        let req = h.last_request();
        assert_eq!(req.header("authorization"), Some("Bearer call"));
        assert_eq!(req.header("x-app"), Some("shiblin"));
        assert_eq!(
            h.dispatcher.global_headers().get("authorization"),
            Some("Bearer global")
        );
    }

    #[test]
    fn later_global_headers_overwrite_earlier() {
        let h = Harness::new(ok_json());
        h.dispatcher.set_global_headers([("X-Token", "one")]);
        h.dispatcher.set_global_headers([("x-token", "two"), ("x-other", "o")]);

        let global = h.dispatcher.global_headers();
        assert_eq!(global.get("X-Token"), Some("two"));
        assert_eq!(global.len(), 2);
    }

    #[test]
    fn remove_global_headers_ignores_absent_names() {
        let h = Harness::new(ok_json());
        h.dispatcher
            .set_global_headers([("X-One", "1"), ("X-Two", "2")]);
        h.dispatcher.remove_global_headers(["x-one", "x-missing"]);

        let global = h.dispatcher.global_headers();
        assert!(!global.contains("x-one"));
        assert_eq!(global.get("x-two"), Some("2"));
    }

    #[test]
    fn defaults_seed_global_headers() {
        let transport = Arc::new(RecordingTransport {
            events: Arc::default(),
            requests: Mutex::new(Vec::new()),
            reply: ok_json(),
            hang: false,
        });
        let defaults = DispatcherDefaults::from_json(r#"{"headers":{"X-Api-Key":"k"}}"#).unwrap();
        let dispatcher = Dispatcher::with_defaults(transport, defaults);

        let req = dispatcher.prepare(&RequestConfig::new("/a")).unwrap();
        assert_eq!(req.header("x-api-key"), Some("k"));
    }

    // --- body encoding ---

    #[test]
    fn prepare_json_payload() {
        let h = Harness::new(ok_json());
        let config = RequestConfig::new("/todos")
            .method(HttpMethod::Post)
            .data(json!({"title": "Buy milk"}));

        let req = h.dispatcher.prepare(&config).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "/todos");
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: serde_json::Value =
            serde_json::from_str(req.body.as_ref().and_then(RequestBody::as_text).unwrap())
                .unwrap();
        assert_eq!(body, json!({"title": "Buy milk"}));
        assert!(h.events().is_empty(), "prepare must not run hooks");
    }

    #[test]
    fn prepare_url_encoded_payload_from_global_content_type() {
        let h = Harness::new(ok_json());
        h.dispatcher
            .set_global_headers([("Content-Type", "application/x-www-form-urlencoded")]);
        let config = RequestConfig::new("/login")
            .method(HttpMethod::Post)
            .data(json!({"user": "ada", "pass": "x y"}));

        let req = h.dispatcher.prepare(&config).unwrap();
        assert_eq!(
            req.body,
            Some(RequestBody::Text("pass=x+y&user=ada".to_string()))
        );
        assert_eq!(
            req.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn prepare_multipart_leaves_content_type_unset() {
        let h = Harness::new(ok_json());
        let form = FormData::new().text("name", "shiblin");
        let config = RequestConfig::new("/upload")
            .method(HttpMethod::Post)
            .data(form.clone());

        let req = h.dispatcher.prepare(&config).unwrap();
        assert_eq!(req.body, Some(RequestBody::Multipart(form)));
        assert!(req.header("content-type").is_none());
    }

    #[test]
    fn prepare_without_payload_has_no_body() {
        let h = Harness::new(ok_json());
        let req = h.dispatcher.prepare(&RequestConfig::new("/todos")).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert!(req.body.is_none());
        assert!(req.header("content-type").is_none());
    }

    #[test]
    fn blank_payloads_have_no_body() {
        let h = Harness::new(ok_json());
        let blanks: [Payload; 5] = [
            json!(false).into(),
            json!(0).into(),
            json!("").into(),
            Value::Null.into(),
            "".into(),
        ];
        for blank in blanks {
            let config = RequestConfig::new("/todos")
                .method(HttpMethod::Post)
                .data(blank.clone());
            let req = h.dispatcher.prepare(&config).unwrap();
            assert!(req.body.is_none(), "{blank:?}");
            assert!(req.header("content-type").is_none(), "{blank:?}");
        }
    }

    #[tokio::test]
    async fn blank_payload_is_sent_without_body() {
        let h = Harness::new(ok_json());
        h.dispatcher
            .send(
                RequestConfig::new("/todos")
                    .method(HttpMethod::Post)
                    .data(json!(false)),
            )
            .await
            .unwrap();

        let req = h.last_request();
        assert!(req.body.is_none());
        assert!(req.header("content-type").is_none());
    }

    #[tokio::test]
    async fn encode_failure_is_returned_before_transport() {
        let h = Harness::new(ok_json());
        let config = RequestConfig::new("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .data(json!([1, 2]));

        let err = h.dispatcher.send(config).await.unwrap_err();
        assert!(matches!(err, RequestError::Encode(_)));
        assert_eq!(h.events(), ["after"]);
    }

    // --- outcomes and hooks ---

    #[tokio::test]
    async fn hooks_wrap_the_transport_call() {
        let h = Harness::new(ok_json());
        let value = h.dispatcher.send(RequestConfig::new("/ok")).await.unwrap();

        assert_eq!(value, ResponseValue::Json(json!({"ok": true})));
        assert_eq!(h.events(), ["before", "transport", "after"]);
    }

    #[tokio::test]
    async fn failing_status_is_a_transport_error() {
        let h = Harness::new(reply(404, "Not Found", "text/html", "<h1>missing</h1>"));
        let err = h
            .dispatcher
            .send(RequestConfig::new("/missing"))
            .await
            .unwrap_err();

        match err {
            RequestError::Transport {
                status,
                status_text,
            } => {
                assert_eq!(status, 404);
                assert_eq!(status_text, "Not Found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.events(), ["before", "transport", "after"]);
    }

    #[tokio::test]
    async fn returned_error_is_logged_once() {
        let (logs, _guard) = CapturedLogs::install();
        let h = Harness::new(reply(500, "Internal Server Error", "text/plain", "boom"));

        let err = h
            .dispatcher
            .send(RequestConfig::new("/broken"))
            .await
            .unwrap_err();

        let logs = logs.contents();
        assert_eq!(logs.matches("ERROR").count(), 1, "{logs}");
        assert!(logs.contains("request error"), "{logs}");
        assert!(logs.contains(&err.to_string()), "{logs}");
    }

    #[tokio::test]
    async fn network_failure_propagates_and_runs_after_hook() {
        let h = Harness::new(Box::new(|| -> Result<HttpResponse> {
            Err(RequestError::Network("connection refused".to_string()))
        }));
        let err = h
            .dispatcher
            .send(RequestConfig::new("/down"))
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Network(ref msg) if msg == "connection refused"));
        assert_eq!(h.events(), ["before", "transport", "after"]);
    }

    #[tokio::test]
    async fn empty_text_body_declared_json_is_empty_object() {
        let h = Harness::new(reply(200, "OK", "text/plain", ""));
        let value = h.dispatcher.send(RequestConfig::new("/empty")).await.unwrap();
        assert_eq!(value, ResponseValue::Json(json!({})));
    }

    #[tokio::test]
    async fn non_json_text_declared_json_is_wrapped() {
        let h = Harness::new(reply(200, "OK", "text/plain", "hello"));
        let value = h.dispatcher.send(RequestConfig::new("/plain")).await.unwrap();
        assert_eq!(
            value,
            ResponseValue::Json(json!({"success": true, "data": "hello"}))
        );
    }

    #[tokio::test]
    async fn form_data_on_json_response_names_content_type() {
        let h = Harness::new(ok_json());
        let err = h
            .dispatcher
            .send(RequestConfig::new("/ok").response_type(ResponseKind::FormData))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RequestError::UnexpectedContentType { ref content_type, .. } if content_type == "application/json"
        ));
        assert_eq!(h.events(), ["before", "transport", "after"]);
    }

    #[tokio::test]
    async fn unknown_response_type_never_reaches_transport() {
        let h = Harness::new(ok_json());
        let err = h
            .dispatcher
            .send(RequestConfig::new("/ok").response_type("xml"))
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::UnsupportedResponseKind(ref kind) if kind == "xml"));
        assert!(err.to_string().contains("xml"));
        assert!(h.transport.requests.lock().is_empty());
        assert_eq!(h.events(), ["after"]);
    }

    #[tokio::test]
    async fn text_and_blob_kinds() {
        let h = Harness::new(reply(200, "OK", "text/plain", "raw"));
        let text = h
            .dispatcher
            .send(RequestConfig::new("/t").response_type(ResponseKind::Text))
            .await
            .unwrap();
        assert_eq!(text.as_text(), Some("raw"));

        let blob = h
            .dispatcher
            .send(RequestConfig::new("/b").response_type(ResponseKind::Blob))
            .await
            .unwrap();
        assert_eq!(blob.as_bytes(), Some(&b"raw"[..]));
        assert_eq!(
            h.events(),
            ["before", "transport", "after", "before", "transport", "after"]
        );
    }

    #[tokio::test]
    async fn replacing_a_hook_discards_the_previous_one() {
        let h = Harness::new(ok_json());
        let events = h.events.clone();
        h.dispatcher
            .before_request(move || events.lock().push("replacement"));

        h.dispatcher.send(RequestConfig::new("/ok")).await.unwrap();
        assert_eq!(h.events(), ["replacement", "transport", "after"]);
    }

    #[tokio::test]
    async fn hook_may_replace_hooks_while_running() {
        let h = Arc::new(Harness::new(ok_json()));
        let inner = h.clone();
        h.dispatcher.before_request(move || {
            let events = inner.events.clone();
            inner
                .dispatcher
                .after_request(move || events.lock().push("late-after"));
        });

        h.dispatcher.send(RequestConfig::new("/ok")).await.unwrap();
        assert_eq!(h.events(), ["transport", "late-after"]);
    }

    #[tokio::test]
    async fn dropped_call_still_runs_after_hook() {
        let h = Harness::build(ok_json(), true);

        let pending = h.dispatcher.send(RequestConfig::new("/slow")).now_or_never();
        assert!(pending.is_none());
        assert_eq!(h.events(), ["before", "transport", "after"]);
    }

    #[test]
    fn send_blocking_matches_send() {
        let h = Harness::new(reply(200, "OK", "text/plain", "hello"));
        let value = h
            .dispatcher
            .send_blocking(RequestConfig::new("/plain"))
            .unwrap();

        assert_eq!(
            value,
            ResponseValue::Json(json!({"success": true, "data": "hello"}))
        );
        assert_eq!(h.events(), ["before", "transport", "after"]);

        let err = h
            .dispatcher
            .send_blocking(RequestConfig::new("/plain").response_type("xml"))
            .unwrap_err();
        assert!(matches!(err, RequestError::UnsupportedResponseKind(_)));
    }

    #[tokio::test]
    async fn send_blocking_inside_a_runtime_fails_without_sending() {
        let h = Harness::new(ok_json());
        let err = h
            .dispatcher
            .send_blocking(RequestConfig::new("/ok"))
            .unwrap_err();

        assert!(matches!(err, RequestError::Runtime(_)), "{err:?}");
        assert_eq!(h.events(), ["after"]);
        assert!(h.transport.requests.lock().is_empty());
    }

    #[test]
    fn pre_encoded_payload_round_trips_through_config() {
        let h = Harness::new(ok_json());
        let config: RequestConfig = serde_json::from_str(
            r#"{"url":"/login","method":"POST","data":"a=1&b=two",
                "headers":{"Content-Type":"application/x-www-form-urlencoded"}}"#,
        )
        .unwrap();
        assert!(matches!(config.data, Some(Payload::Text(_))));

        let req = h.dispatcher.prepare(&config).unwrap();
        assert_eq!(req.body, Some(RequestBody::Text("a=1&b=two".to_string())));
    }
}
