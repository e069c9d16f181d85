use crate::config::Config;
use crate::conversation::WindowMessage;
use crate::error::ConfigError;
use crate::prompts::{CANCELLED_NOTICE, STOP_MARKER};
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Fragments buffered between the network task and the consumer
const FRAGMENT_BUFFER: usize = 256;

/// Longest server-provided error detail carried into an error fragment
const ERROR_DETAIL_CHARS: usize = 100;

/// Request body for the completions endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<WindowMessage>,
    pub stream: bool,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(messages: Vec<WindowMessage>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            temperature: temperature.clamp(0.0, 1.0),
        }
    }
}

/// Shared cancellation flag, observed once per received line
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One item of an exchange's stream, tagged with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Text produced by the model
    Content(String),
    /// Terminal transport or server failure, already rendered with the stop marker
    Error(String),
    /// Terminal notice that the user stopped generation
    Cancelled,
}

impl Fragment {
    pub fn text(&self) -> &str {
        match self {
            Fragment::Content(text) | Fragment::Error(text) => text,
            Fragment::Cancelled => CANCELLED_NOTICE,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Fragment::Content(text) | Fragment::Error(text) => text,
            Fragment::Cancelled => CANCELLED_NOTICE.to_string(),
        }
    }
}

/// Classification of one line of the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// `data: [DONE]`
    Done,
    /// Non-empty `choices[0].delta.content`
    Fragment(String),
    /// Anything else, including undecodable JSON
    Skip,
}

pub fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data: ") else {
        return SseLine::Skip;
    };
    if data.trim() == "[DONE]" {
        return SseLine::Done;
    }
    let Ok(chunk) = serde_json::from_str::<Value>(data) else {
        debug!(line = %data, "skipping undecodable stream chunk");
        return SseLine::Skip;
    };
    match chunk
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
    {
        Some(content) if !content.is_empty() => SseLine::Fragment(content.to_string()),
        _ => SseLine::Skip,
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(ERROR_DETAIL_CHARS).collect()
}

/// Ways an exchange can fail before or while reading the stream
#[derive(Debug)]
enum ExchangeError {
    Status { status: StatusCode, body: String },
    Transport(reqwest::Error),
}

impl ExchangeError {
    /// Render as the single terminal fragment the consumer sees.
    fn into_fragment(self, timeout: Duration) -> String {
        match self {
            ExchangeError::Status { status, body } => {
                let detail = if body.trim().is_empty() {
                    String::new()
                } else {
                    match serde_json::from_str::<Value>(&body) {
                        Ok(json) => {
                            let message = json
                                .pointer("/error/message")
                                .and_then(Value::as_str)
                                .unwrap_or(&body);
                            format!(" API: {}", truncate(message))
                        }
                        Err(_) => format!(" Detail: {}", truncate(&body)),
                    }
                };
                format!(
                    "{STOP_MARKER} HTTP error {}: {}.{}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown status"),
                    detail
                )
            }
            ExchangeError::Transport(err) if err.is_timeout() => format!(
                "{STOP_MARKER} Request timed out after {} seconds.",
                timeout.as_secs()
            ),
            ExchangeError::Transport(err) if err.is_connect() => {
                format!("{STOP_MARKER} Connection error: {}", truncate(&err.to_string()))
            }
            ExchangeError::Transport(err) => {
                format!("{STOP_MARKER} Error: {}", truncate(&err.to_string()))
            }
        }
    }
}

/// Lazy, finite sequence of fragments for one exchange.
///
/// Once the cancellation flag is observed the stream yields
/// [`Fragment::Cancelled`] and ends, whatever is still buffered.
pub struct FragmentStream {
    rx: mpsc::Receiver<Fragment>,
    cancel: CancelFlag,
    terminated: bool,
}

impl FragmentStream {
    pub fn new(rx: mpsc::Receiver<Fragment>, cancel: CancelFlag) -> Self {
        Self {
            rx,
            cancel,
            terminated: false,
        }
    }

    /// A stream that yields `fragments` and ends. Used for canned answers.
    pub fn from_fragments(fragments: Vec<Fragment>, cancel: CancelFlag) -> Self {
        let (tx, rx) = mpsc::channel(fragments.len().max(1));
        for fragment in fragments {
            let _ = tx.try_send(fragment);
        }
        Self::new(rx, cancel)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl Stream for FragmentStream {
    type Item = Fragment;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Fragment>> {
        if self.terminated {
            return Poll::Ready(None);
        }
        if self.cancel.is_cancelled() {
            self.terminated = true;
            self.rx.close();
            return Poll::Ready(Some(Fragment::Cancelled));
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(None) => {
                self.terminated = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Something that can run one streamed exchange with a model.
pub trait ModelBackend {
    fn stream(&self, request: CompletionRequest, cancel: CancelFlag) -> FragmentStream;
}

/// LLM client for streaming responses
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    http_referer: String,
    app_title: String,
    timeout: Duration,
}

impl LlmClient {
    /// Build a client from configuration. A missing API key is fatal.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config.api_key().ok_or(ConfigError::MissingApiKey)?;
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            url: config.completions_url(),
            api_key,
            http_referer: config.http_referer.clone(),
            app_title: config.app_title.clone(),
            timeout,
        })
    }

    /// Stream a response. Never fails: problems arrive as a final
    /// [`Fragment::Error`] starting with [`STOP_MARKER`].
    pub fn stream_response(&self, request: CompletionRequest, cancel: CancelFlag) -> FragmentStream {
        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        let client = self.clone();
        let timeout = self.timeout;
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let cancel = task_cancel;
            info!(
                model = %request.model,
                messages = request.messages.len(),
                temperature = request.temperature,
                "starting exchange"
            );
            match client.pump(request, &cancel, &tx).await {
                Ok(fragments) => info!(fragments, cancelled = cancel.is_cancelled(), "exchange finished"),
                Err(err) => {
                    let fragment = err.into_fragment(timeout);
                    warn!(error = %fragment, "exchange failed");
                    let _ = tx.send(Fragment::Error(fragment)).await;
                }
            }
        });

        FragmentStream::new(rx, cancel)
    }

    async fn pump(
        &self,
        request: CompletionRequest,
        cancel: &CancelFlag,
        tx: &mpsc::Sender<Fragment>,
    ) -> Result<usize, ExchangeError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.http_referer)
            .header("X-Title", &self.app_title)
            .json(&request)
            .send()
            .await
            .map_err(ExchangeError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Status { status, body });
        }

        let mut stream = Box::pin(response.bytes_stream());
        // Raw bytes so a UTF-8 sequence split across chunks decodes intact
        let mut buffer: Vec<u8> = Vec::new();
        let mut sent = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(ExchangeError::Transport)?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                if cancel.is_cancelled() {
                    debug!("cancellation observed, closing stream");
                    return Ok(sent);
                }
                match parse_sse_line(&String::from_utf8_lossy(&line)) {
                    SseLine::Done => return Ok(sent),
                    SseLine::Fragment(content) => {
                        if tx.send(Fragment::Content(content)).await.is_err() {
                            // Consumer dropped the stream
                            return Ok(sent);
                        }
                        sent += 1;
                    }
                    SseLine::Skip => {}
                }
            }
        }

        // Flush a final line that arrived without a trailing newline
        if !buffer.is_empty() && !cancel.is_cancelled() {
            if let SseLine::Fragment(content) = parse_sse_line(&String::from_utf8_lossy(&buffer)) {
                if tx.send(Fragment::Content(content)).await.is_ok() {
                    sent += 1;
                }
            }
        }

        Ok(sent)
    }
}

impl ModelBackend for LlmClient {
    fn stream(&self, request: CompletionRequest, cancel: CancelFlag) -> FragmentStream {
        self.stream_response(request, cancel)
    }
}
