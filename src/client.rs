use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::config::validation::validate_config;
use crate::error::StreamError;
use crate::protocol::chat::ChatCompletionRequest;
use crate::stream::{decode_stream, spawn_decoder, spawn_decoder_with, CompletionEvent};
use crate::transport::{ByteStream, HttpTransport};

/// Async stream of decoded events for one request.
pub type EventStream = BoxStream<'static, CompletionEvent>;

/// Streaming chat-completion client.
///
/// Each call opens one HTTP request and decodes its body incrementally. Setup
/// failures (invalid request, transport, non-2xx status) are returned as `Err`;
/// anything that goes wrong once the body is flowing arrives as the terminal
/// [`CompletionEvent::Failed`].
#[derive(Debug, Clone)]
pub struct ChatClient {
    config: ClientConfig,
    transport: HttpTransport,
}

impl ChatClient {
    /// Build a client from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Config`] when the config is invalid and
    /// [`StreamError::Transport`] when the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, StreamError> {
        validate_config(&config)?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self { config, transport })
    }

    /// Build a client around a caller-supplied transport, for example one
    /// wrapping a shared `reqwest::Client`. Pool and proxy settings in
    /// `config` are ignored; the transport's client owns them.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Config`] when the config is invalid.
    pub fn with_transport(
        config: ClientConfig,
        transport: HttpTransport,
    ) -> Result<Self, StreamError> {
        validate_config(&config)?;
        Ok(Self { config, transport })
    }

    /// Build a client from `OPENAI_*` environment variables.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`] and [`ChatClient::new`].
    pub fn from_env() -> Result<Self, StreamError> {
        Self::new(ClientConfig::from_env()?)
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send `request` with streaming enabled and decode the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid, cannot be sent, or is
    /// rejected with a non-2xx status.
    pub async fn stream_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<EventStream, StreamError> {
        let body = self.open(request).await?;
        Ok(decode_stream(body).boxed())
    }

    /// Like [`Self::stream_chat_completion`], but decodes on a spawned task and
    /// delivers events through a channel of `channel_capacity` slots.
    ///
    /// # Errors
    ///
    /// Same as [`Self::stream_chat_completion`].
    pub async fn stream_chat_completion_channel(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<mpsc::Receiver<CompletionEvent>, StreamError> {
        let body = self.open(request).await?;
        Ok(spawn_decoder(body, self.config.channel_capacity))
    }

    /// Like [`Self::stream_chat_completion`], but decodes on a spawned task and
    /// invokes `on_event` for every event.
    ///
    /// # Errors
    ///
    /// Same as [`Self::stream_chat_completion`].
    pub async fn stream_chat_completion_with<F>(
        &self,
        request: ChatCompletionRequest,
        on_event: F,
    ) -> Result<JoinHandle<()>, StreamError>
    where
        F: FnMut(CompletionEvent) + Send + 'static,
    {
        let body = self.open(request).await?;
        Ok(spawn_decoder_with(body, on_event))
    }

    async fn open(&self, mut request: ChatCompletionRequest) -> Result<ByteStream, StreamError> {
        request.stream = Some(true);
        request.validate()?;
        let body = serde_json::to_vec(&request)
            .map_err(|err| StreamError::InvalidRequest(format!("Failed to encode request: {err}")))?;
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "opening chat completion stream"
        );
        self.transport
            .open_stream(
                &self.config.chat_completions_url(),
                &self.config.api_key,
                self.config.organization.as_deref(),
                Bytes::from(body),
            )
            .await
    }
}
