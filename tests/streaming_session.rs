mod common;

use std::time::Duration;

use chatai::conversation::{Role, WindowMessage};
use chatai::llm::{CancelFlag, CompletionRequest, Fragment, LlmClient};
use chatai::prompts::STOP_MARKER;
use common::{sse_data, unused_addr, CannedResponse, TestServer};
use futures::StreamExt;

fn request() -> CompletionRequest {
    CompletionRequest::new(
        vec![
            WindowMessage::new(Role::System, "You are terse."),
            WindowMessage::new(Role::User, "Say hello"),
        ],
        "meta-llama/llama-3-8b-instruct",
        0.7,
    )
}

async fn collect(client: &LlmClient, cancel: CancelFlag) -> Vec<String> {
    client
        .stream_response(request(), cancel)
        .map(Fragment::into_text)
        .collect()
        .await
}

#[tokio::test]
async fn concatenates_content_and_skips_malformed_lines() {
    let server = TestServer::start(CannedResponse::raw_sse(vec![
        (Duration::ZERO, ": OPENROUTER PROCESSING\n\n".to_string()),
        (Duration::ZERO, sse_data("Hel")),
        (Duration::ZERO, "data: {broken json\n\n".to_string()),
        (Duration::ZERO, sse_data("lo")),
        (Duration::ZERO, "data: {\"choices\":[{\"delta\":{}}]}\n\n".to_string()),
        (Duration::ZERO, "data: [DONE]\n\n".to_string()),
    ]))
    .await;
    let client = LlmClient::new(&server.config()).expect("client");

    let fragments = collect(&client, CancelFlag::new()).await;

    assert_eq!(fragments, vec!["Hel".to_string(), "lo".to_string()]);
    assert_eq!(fragments.concat(), "Hello");
}

#[tokio::test]
async fn done_sentinel_ends_the_stream() {
    let server = TestServer::start(CannedResponse::raw_sse(vec![
        (Duration::ZERO, sse_data("only")),
        (Duration::ZERO, "data: [DONE]\n\n".to_string()),
        (Duration::ZERO, sse_data("ignored")),
    ]))
    .await;
    let client = LlmClient::new(&server.config()).expect("client");

    assert_eq!(collect(&client, CancelFlag::new()).await, vec!["only".to_string()]);
}

#[tokio::test]
async fn model_text_starting_with_stop_marker_is_content() {
    let server = TestServer::start(CannedResponse::sse(&["🛑 is the stop sign emoji."])).await;
    let client = LlmClient::new(&server.config()).expect("client");

    let fragments: Vec<Fragment> = client
        .stream_response(request(), CancelFlag::new())
        .collect()
        .await;

    assert_eq!(
        fragments,
        vec![Fragment::Content("🛑 is the stop sign emoji.".to_string())]
    );
}

#[tokio::test]
async fn line_split_across_reads_is_reassembled() {
    let line = sse_data("héllo");
    let (head, tail) = line.split_at(20);
    let server = TestServer::start(CannedResponse::raw_sse(vec![
        (Duration::ZERO, head.to_string()),
        (Duration::from_millis(50), tail.to_string()),
        (Duration::ZERO, "data: [DONE]\n\n".to_string()),
    ]))
    .await;
    let client = LlmClient::new(&server.config()).expect("client");

    assert_eq!(collect(&client, CancelFlag::new()).await, vec!["héllo".to_string()]);
}

#[tokio::test]
async fn trailing_line_without_newline_is_flushed() {
    let server = TestServer::start(CannedResponse::raw_sse(vec![(
        Duration::ZERO,
        sse_data("tail").trim_end().to_string(),
    )]))
    .await;
    let client = LlmClient::new(&server.config()).expect("client");

    assert_eq!(collect(&client, CancelFlag::new()).await, vec!["tail".to_string()]);
}

#[tokio::test]
async fn cancellation_yields_notice_and_nothing_after() {
    let server = TestServer::start(CannedResponse::raw_sse(vec![
        (Duration::ZERO, sse_data("first")),
        (Duration::from_millis(300), sse_data("second")),
        (Duration::from_millis(300), sse_data("third")),
        (Duration::ZERO, "data: [DONE]\n\n".to_string()),
    ]))
    .await;
    let client = LlmClient::new(&server.config()).expect("client");
    let cancel = CancelFlag::new();
    let mut stream = client.stream_response(request(), cancel.clone());

    assert_eq!(stream.next().await, Some(Fragment::Content("first".to_string())));
    cancel.cancel();
    assert_eq!(stream.next().await, Some(Fragment::Cancelled));
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn http_error_becomes_single_stop_fragment() {
    let server = TestServer::start(CannedResponse::error(
        401,
        "Unauthorized",
        r#"{"error":{"message":"No auth credentials found","code":401}}"#,
    ))
    .await;
    let client = LlmClient::new(&server.config()).expect("client");

    let fragments: Vec<Fragment> = client
        .stream_response(request(), CancelFlag::new())
        .collect()
        .await;

    assert_eq!(
        fragments,
        vec![Fragment::Error(
            "🛑 HTTP error 401: Unauthorized. API: No auth credentials found".to_string()
        )]
    );
}

#[tokio::test]
async fn connection_refused_becomes_stop_fragment() {
    let addr = unused_addr().await;
    let mut config = chatai::Config::default();
    config.base_url = format!("http://{addr}/api/v1");
    config.set_api_key("sk-test".to_string());
    let client = LlmClient::new(&config).expect("client");

    let fragments = collect(&client, CancelFlag::new()).await;

    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].starts_with(STOP_MARKER), "{}", fragments[0]);
}

#[tokio::test]
async fn slow_server_times_out() {
    let mut response = CannedResponse::sse(&["late"]);
    response.head_delay = Duration::from_secs(3);
    let server = TestServer::start(response).await;
    let mut config = server.config();
    config.request_timeout_secs = 1;
    let client = LlmClient::new(&config).expect("client");

    let fragments = collect(&client, CancelFlag::new()).await;

    assert_eq!(fragments, vec!["🛑 Request timed out after 1 seconds.".to_string()]);
}

#[tokio::test]
async fn sends_auth_headers_and_streaming_body() {
    let server = TestServer::start(CannedResponse::sse(&["ok"])).await;
    let config = server.config();
    let client = LlmClient::new(&config).expect("client");

    let _ = collect(&client, CancelFlag::new()).await;

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let recorded = &requests[0];
    assert_eq!(recorded.request_line, "POST /api/v1/chat/completions HTTP/1.1");
    assert_eq!(recorded.headers.get("authorization").map(String::as_str), Some("Bearer sk-test"));
    assert_eq!(recorded.headers.get("http-referer"), Some(&config.http_referer));
    assert_eq!(recorded.headers.get("x-title"), Some(&config.app_title));

    let body: serde_json::Value = serde_json::from_str(&recorded.body).expect("json body");
    assert_eq!(body["model"], "meta-llama/llama-3-8b-instruct");
    assert_eq!(body["stream"], true);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "Say hello");
}
