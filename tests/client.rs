use label_system_client::{Client, Error, PageQuery, RequestOptions, NO_PARAMS};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::json;
use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> Client {
    Client::builder(format!("{}/api/v1", server.uri()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn request_returns_body_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/labels/7"))
        .and(header("content-type", "application/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 7}, "message": "ok"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let body = client(&server).get_label(7).await.unwrap();
    assert_eq!(body, json!({"data": {"id": 7}, "message": "ok"}));
}

#[tokio::test]
async fn failure_uses_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/rules/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
        .mount(&server)
        .await;

    let err = client(&server).get_rule(99).await.unwrap_err();
    assert_eq!(err.to_string(), "not found");
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn failure_without_message_uses_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/items/1"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = client(&server).get_item(1).await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 500");
}

#[tokio::test]
async fn unparseable_body_is_a_json_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/labels/tree"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let err = client(&server).label_tree(NO_PARAMS).await.unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}

#[tokio::test]
async fn connection_refused_is_transport_failure() {
    let client = Client::builder("http://127.0.0.1:1/api/v1").build().unwrap();
    let err = client.list_rules(NO_PARAMS).await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn timeout_is_honored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/labels/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = Client::builder(format!("{}/api/v1", server.uri()))
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let err = client.get_label(1).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
}

#[tokio::test]
async fn list_sends_query_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/labels"))
        .and(query_param("label_type", "intent"))
        .and(query_param("size", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = BTreeMap::new();
    params.insert("label_type", "intent");
    params.insert("size", "50");
    client(&server).list_labels(&params).await.unwrap();
}

#[tokio::test]
async fn list_endpoints_query_suffix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let client = client(&server);
    let empty = BTreeMap::<String, String>::new();
    client.list_labels(&empty).await.unwrap();
    client.list_rules(&empty).await.unwrap();
    client.list_items(&empty).await.unwrap();
    client.list_entity_tags(&empty).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let urls: Vec<String> = requests
        .iter()
        .map(|r| match r.url.query() {
            Some(query) => format!("{}?{}", r.url.path(), query),
            None => r.url.path().to_string(),
        })
        .collect();
    assert_eq!(
        urls,
        vec![
            "/api/v1/labels?",
            "/api/v1/rules?",
            "/api/v1/items?",
            "/api/v1/entity_tags/",
        ]
    );
}

#[tokio::test]
async fn caller_headers_override_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/labels"))
        .and(header("content-type", "application/json; charset=utf-8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 1}})))
        .expect(1)
        .mount(&server)
        .await;

    let mut options = RequestOptions::with_body(Method::POST, json!({"label_name": "x"}));
    options.headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    client(&server).request("/labels", options).await.unwrap();
}

#[tokio::test]
async fn entity_tag_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/entity_tags/"))
        .and(body_json(json!({"entity_tag_name": "city"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 3}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/entity-tags/tag/city/entities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": ["Paris"]})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client
        .create_entity_tag(&json!({"entity_tag_name": "city"}))
        .await
        .unwrap();
    let entities = client.entities_by_tag_name("city").await.unwrap();
    assert_eq!(entities, json!({"data": ["Paris"]}));
}

#[tokio::test]
async fn entity_tag_names_are_distinct() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/entity_tags/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"entity_tag_name": "a"},
            {"entity_name": "a"},
            {"entity_tag_name": "b"},
            {"other": 1},
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let names = client(&server).entity_tag_names().await.unwrap();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn recognize_intent_posts_query_and_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/intent_recognition/recognize"))
        .and(body_json(json!({"query": "refund my order", "context": {"channel": "web"}})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"intent": "refund"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .recognize_intent("refund my order", &json!({"channel": "web"}))
        .await
        .unwrap();
    assert_eq!(result["data"]["intent"], "refund");
}

#[tokio::test]
async fn cached_reads_until_a_write() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/rules/by_label_code/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [1]})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/rules/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "deleted"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder(format!("{}/api/v1", server.uri()))
        .cache_ttl(Duration::from_secs(60))
        .build()
        .unwrap();

    client.rules_by_label_code("L1").await.unwrap();
    client.rules_by_label_code("L1").await.unwrap();
    client.delete_rule(5).await.unwrap();
    let rules = client.rules_by_label_code("L1").await.unwrap();
    assert_eq!(rules, json!({"data": [1]}));
}

#[tokio::test]
async fn reads_are_not_cached_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/labels/A/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server);
    client.children_labels("A").await.unwrap();
    client.children_labels("A").await.unwrap();
}

#[tokio::test]
async fn paged_listing_and_supplementary_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/rules"))
        .and(query_param("page", "2"))
        .and(query_param("size", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"items": []}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/entity-tags/tag-names/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": ["city"]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/labels/L1/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client
        .list_rules(&PageQuery {
            page: Some(2),
            size: Some(10),
        })
        .await
        .unwrap();
    assert_eq!(
        client.entity_tag_name_list().await.unwrap(),
        json!({"data": ["city"]})
    );
    client.label_items("L1").await.unwrap();
}

#[tokio::test]
async fn write_during_pending_read_keeps_stale_body_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/rules/by_label_code/L1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": ["old"]}))
                .set_delay(Duration::from_millis(300)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/rules/by_label_code/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": ["new"]})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/rules/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "deleted"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder(format!("{}/api/v1", server.uri()))
        .cache_ttl(Duration::from_secs(60))
        .build()
        .unwrap();

    let (pending, deleted) = tokio::join!(client.rules_by_label_code("L1"), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.delete_rule(5).await
    });
    assert_eq!(pending.unwrap(), json!({"data": ["old"]}));
    deleted.unwrap();

    let rules = client.rules_by_label_code("L1").await.unwrap();
    assert_eq!(rules, json!({"data": ["new"]}));
}

#[tokio::test]
async fn cached_reads_are_keyed_by_call_headers() {
    let server = MockServer::start().await;
    for tenant in ["a", "b"] {
        Mock::given(method("GET"))
            .and(path("/api/v1/labels/1"))
            .and(header("x-tenant", tenant))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": format!("tenant-{}", tenant)})),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = Client::builder(format!("{}/api/v1", server.uri()))
        .cache_ttl(Duration::from_secs(60))
        .build()
        .unwrap();

    let tenant_request = |tenant: &'static str| {
        let mut options = RequestOptions::default();
        options.headers.insert(
            HeaderName::from_static("x-tenant"),
            HeaderValue::from_static(tenant),
        );
        options
    };

    for _ in 0..2 {
        let a = client.request("/labels/1", tenant_request("a")).await.unwrap();
        let b = client.request("/labels/1", tenant_request("b")).await.unwrap();
        assert_eq!(a, json!({"data": "tenant-a"}));
        assert_eq!(b, json!({"data": "tenant-b"}));
    }
}

#[tokio::test]
async fn builder_default_headers_sit_between_content_type_and_call_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/labels/1"))
        .and(header("content-type", "application/vnd.labels+json"))
        .and(header("x-client", "builder"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/labels/2"))
        .and(header("content-type", "application/vnd.labels+json"))
        .and(header("x-client", "call"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": 2})))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder(format!("{}/api/v1", server.uri()))
        .default_header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.labels+json"),
        )
        .default_header(
            HeaderName::from_static("x-client"),
            HeaderValue::from_static("builder"),
        )
        .build()
        .unwrap();

    assert_eq!(client.get_label(1).await.unwrap(), json!({"data": 1}));

    let mut options = RequestOptions::default();
    options.headers.insert(
        HeaderName::from_static("x-client"),
        HeaderValue::from_static("call"),
    );
    assert_eq!(
        client.request("/labels/2", options).await.unwrap(),
        json!({"data": 2})
    );
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn encoding_failures_are_logged() {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    // Nothing listens here; both calls must fail before any request is sent.
    let client = Client::builder("http://127.0.0.1:1/api/v1").build().unwrap();

    let err = client
        .list_labels(&json!({"filter": {"nested": 1}}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Query(_)));
    assert!(logs.contents().contains("/labels"));

    let mut body = BTreeMap::new();
    body.insert((1, 2), "tuple keys are not JSON");
    let err = client.create_rule(&body).await.unwrap_err();
    assert!(matches!(err, Error::Json(_)));

    let output = logs.contents();
    assert_eq!(output.matches("API request failed").count(), 2);
    assert!(output.contains("/rules"));
}
