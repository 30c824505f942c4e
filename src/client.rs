use std::env;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_CHUNKS,
};
use crate::sse::process_sse;
use crate::types::{ChatCompletionChunk, ChatCompletionParams, ChatMessage, Model};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

pub(crate) const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/";
pub(crate) const DEFAULT_REFERER: &str = "http://localhost:8501";
pub(crate) const DEFAULT_TITLE: &str = "SupportBot";
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A boxed stream of parsed chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk>> + Send>>;

/// A boxed stream of assistant text deltas.
///
/// Finite and single-use: each call that produces one opens exactly one request.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Something that can stream a chat completion as text deltas.
///
/// [`OpenRouter`] is the production implementation; tests substitute scripted backends.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Opens one streamed completion for `messages` on `model`.
    ///
    /// Errors before the first byte (connection, non-2xx status) are returned directly;
    /// later failures arrive as `Err` items in the stream.
    async fn stream_text(&self, model: &Model, messages: Vec<ChatMessage>) -> Result<TextStream>;
}

/// Client for OpenRouter and other OpenAI-compatible chat-completion APIs.
#[derive(Clone)]
pub struct OpenRouter {
    client: ReqwestClient,
    headers: HeaderMap,
    base_url: String,
    timeout: Duration,
    referer: String,
    title: String,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl std::fmt::Debug for OpenRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouter")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

impl OpenRouter {
    /// Create a new client.
    ///
    /// The API key can be provided directly or read from the OPENROUTER_API_KEY
    /// environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = resolve_api_key(api_key)?;
        let base_url = normalize_base_url(base_url.as_deref().unwrap_or(DEFAULT_API_URL))?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);

        // No whole-request timeout: header and inter-chunk waits are bounded in `stream`.
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        let referer = DEFAULT_REFERER.to_string();
        let title = DEFAULT_TITLE.to_string();
        let headers = build_headers(&api_key, &referer, &title)?;
        Ok(Self {
            client,
            headers,
            base_url,
            timeout,
            referer,
            title,
            logger: None,
        })
    }

    /// Sets the `HTTP-Referer` and `X-Title` headers identifying the calling application.
    pub fn with_app_identity(
        mut self,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self> {
        let referer = referer.into();
        let title = title.into();
        set_header(&mut self.headers, "http-referer", &referer)?;
        set_header(&mut self.headers, "x-title", &title)?;
        self.referer = referer;
        self.title = title;
        Ok(self)
    }

    /// Attaches a logger that sees every request and chunk.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The API root, always ending in `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The connect, header, and inter-chunk timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Value of the `HTTP-Referer` header.
    pub fn referer(&self) -> &str {
        &self.referer
    }

    /// Value of the `X-Title` header.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Process API response errors and convert to our Error type.
    ///
    /// Reading the error body is bounded by the client timeout.
    async fn process_error_response(&self, response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match tokio::time::timeout(self.timeout, response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
            Err(_) => {
                return Error::timeout(
                    format!("error body for status {status_code} did not arrive"),
                    Some(self.timeout.as_secs_f64()),
                );
            }
        };

        error_from_status(status_code, &error_body, retry_after)
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Send a chat-completion request and get a streaming response.
    ///
    /// Returns a stream of parsed chunks. The wait for response headers and the wait between
    /// consecutive chunks are each bounded by the client timeout.
    pub async fn stream(&self, mut params: ChatCompletionParams) -> Result<ChunkStream> {
        params.stream = true;
        let url = format!("{}chat/completions", self.base_url);
        if let Some(logger) = &self.logger {
            logger.log_request(&params);
        }
        tracing::debug!(
            model = %params.model,
            messages = params.messages.len(),
            "opening completion stream"
        );

        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let sent = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&url)
                .headers(self.headers.clone())
                .json(&params)
                .send(),
        )
        .await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                CLIENT_REQUEST_ERRORS.click();
                let err = self.map_send_error(e);
                tracing::warn!(error = %err, "completion request failed");
                return Err(err);
            }
            Err(_) => {
                CLIENT_REQUEST_ERRORS.click();
                tracing::warn!(timeout = ?self.timeout, "no response headers before timeout");
                return Err(Error::timeout(
                    "no response from the API",
                    Some(self.timeout.as_secs_f64()),
                ));
            }
        };

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = self.process_error_response(response).await;
            tracing::warn!(error = %err, "completion request rejected");
            return Err(err);
        }

        let logger = self.logger.clone();
        let chunks = process_sse(response.bytes_stream()).inspect(move |item| {
            if let Ok(chunk) = item {
                STREAM_CHUNKS.click();
                if let Some(logger) = &logger {
                    logger.log_stream_chunk(chunk);
                }
            }
        });
        Ok(with_idle_timeout(chunks, self.timeout))
    }
}

#[async_trait::async_trait]
impl ChatBackend for OpenRouter {
    async fn stream_text(&self, model: &Model, messages: Vec<ChatMessage>) -> Result<TextStream> {
        let params = ChatCompletionParams::new_streaming(model.clone(), messages);
        let chunks = self.stream(params).await?;
        Ok(text_deltas(chunks, self.logger.clone()))
    }
}

/// Reduce a chunk stream to its non-empty text deltas.
///
/// The logger sees the accumulated text only when the stream ends without error.
fn text_deltas(chunks: ChunkStream, logger: Option<Arc<dyn ClientLogger>>) -> TextStream {
    Box::pin(stream::unfold(
        (chunks, String::new(), logger, false),
        |(mut chunks, mut text, logger, mut failed)| async move {
            loop {
                match chunks.next().await {
                    Some(Ok(chunk)) => {
                        if let Some(delta) = chunk.text() {
                            let delta = delta.to_string();
                            text.push_str(&delta);
                            return Some((Ok(delta), (chunks, text, logger, failed)));
                        }
                    }
                    Some(Err(e)) => {
                        failed = true;
                        return Some((Err(e), (chunks, text, logger, failed)));
                    }
                    None => {
                        if !failed {
                            if let Some(logger) = &logger {
                                logger.log_stream_text(&text);
                            }
                        }
                        return None;
                    }
                }
            }
        },
    ))
}

/// Fail the stream with a timeout error when no item arrives within `timeout`.
fn with_idle_timeout<S>(inner: S, timeout: Duration) -> ChunkStream
where
    S: Stream<Item = Result<ChatCompletionChunk>> + Send + 'static,
{
    Box::pin(stream::unfold(
        (Box::pin(inner), false),
        move |(mut inner, timed_out)| async move {
            if timed_out {
                return None;
            }
            match tokio::time::timeout(timeout, inner.next()).await {
                Ok(Some(item)) => Some((item, (inner, false))),
                Ok(None) => None,
                Err(_) => Some((
                    Err(Error::timeout(
                        "no data received from the stream",
                        Some(timeout.as_secs_f64()),
                    )),
                    (inner, true),
                )),
            }
        },
    ))
}

fn resolve_api_key(api_key: Option<String>) -> Result<String> {
    let api_key = match api_key {
        Some(key) => key,
        None => env::var(API_KEY_ENV).map_err(|_| {
            Error::configuration(format!(
                "API key not provided and {API_KEY_ENV} environment variable not set"
            ))
        })?,
    };
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(Error::configuration("API key is empty"));
    }
    Ok(api_key)
}

fn normalize_base_url(base_url: &str) -> Result<String> {
    let mut base_url = base_url.trim().to_string();
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    let parsed = url::Url::parse(&base_url)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::url(
            format!("unsupported URL scheme: {}", parsed.scheme()),
            None,
        ));
    }
    Ok(base_url)
}

fn build_headers(api_key: &str, referer: &str, title: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
    set_header(&mut headers, "authorization", &format!("Bearer {api_key}")).map_err(|_| {
        Error::configuration("API key contains characters that cannot be sent in a header")
    })?;
    set_header(&mut headers, "http-referer", referer)?;
    set_header(&mut headers, "x-title", title)?;
    Ok(headers)
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<()> {
    let value = HeaderValue::from_str(value).map_err(|e| {
        Error::validation(
            format!("invalid value for header {name}: {e}"),
            Some(name.to_string()),
        )
    })?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

/// Map a non-2xx status and its body to an error.
fn error_from_status(status_code: u16, body: &str, retry_after: Option<u64>) -> Error {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        code: Option<serde_json::Value>,
        message: Option<String>,
    }

    let parsed_error = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error);
    // Numeric codes only repeat the status.
    let error_type = parsed_error
        .as_ref()
        .and_then(|e| e.code.as_ref())
        .and_then(|code| code.as_str())
        .map(String::from);
    let error_message = parsed_error
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.to_string());

    match status_code {
        400 => Error::bad_request(error_message),
        401 => Error::authentication(error_message),
        403 => Error::permission(error_message),
        404 => Error::not_found(error_message),
        408 => Error::timeout(error_message, None),
        429 => Error::rate_limit(error_message, retry_after),
        500 => Error::internal_server(error_message),
        502..=504 => Error::service_unavailable(error_message, retry_after),
        _ => Error::api(status_code, error_type, error_message),
    }
}
