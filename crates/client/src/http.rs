//! HTTP Threads Client
//!
//! reqwest implementation of `ThreadsClient`. Streaming responses are read on
//! a spawned task that decodes lines and forwards chunks over a channel; the
//! task stops as soon as the consumer drops the stream.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use threadline_core::ComponentStateMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

use crate::http_client::build_http_client;
use crate::provider::{parse_http_error, ChunkStream, ThreadsClient};
use crate::streaming::StreamChunkDecoder;
use crate::types::{
    AdvanceParams, AdvanceResponse, ClientConfig, ClientError, ClientResult, StreamChunk,
    ThreadSummary,
};

/// Buffered chunks between the reader task and the consumer.
const STREAM_CHANNEL_CAPACITY: usize = 64;

#[derive(Serialize)]
struct ComponentStateBody<'a> {
    state: &'a ComponentStateMap,
}

/// `ThreadsClient` talking to the thread API over HTTP.
#[derive(Clone)]
pub struct HttpThreadsClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpThreadsClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let mut raw = config.base_url.trim().to_string();
        if raw.is_empty() {
            return Err(ClientError::InvalidUrl {
                message: "Base URL is empty".to_string(),
            });
        }
        // Url::join drops the last path segment unless the base ends in '/'.
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw).map_err(|e| ClientError::InvalidUrl {
            message: format!("{}: {}", raw, e),
        })?;

        Ok(Self {
            client: build_http_client(config)?,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        self.base_url.join(path).map_err(|e| ClientError::InvalidUrl {
            message: format!("{}: {}", path, e),
        })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| ClientError::network(e.to_string()))?;
            return Err(parse_http_error(status.as_u16(), &body));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = self.send(builder).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::network(e.to_string()))?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn advance_path(thread_id: Option<&str>, suffix: &str) -> String {
        match thread_id {
            Some(id) => format!("threads/{}/{}", id, suffix),
            None => format!("threads/{}", suffix),
        }
    }
}

#[async_trait]
impl ThreadsClient for HttpThreadsClient {
    async fn advance(
        &self,
        thread_id: Option<&str>,
        params: &AdvanceParams,
    ) -> ClientResult<AdvanceResponse> {
        let url = self.url(&Self::advance_path(thread_id, "advance"))?;
        tracing::debug!(url = %url, "Advancing thread");
        self.send_json(self.request(Method::POST, url).json(params))
            .await
    }

    async fn advance_stream(
        &self,
        thread_id: Option<&str>,
        params: &AdvanceParams,
    ) -> ClientResult<ChunkStream> {
        let url = self.url(&Self::advance_path(thread_id, "advancestream"))?;
        tracing::debug!(url = %url, "Opening advance stream");
        let response = self
            .send(self.request(Method::POST, url).json(params))
            .await?;

        let (tx, rx) = mpsc::channel::<ClientResult<StreamChunk>>(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = StreamChunkDecoder::new();

            while let Some(read) = body.next().await {
                let decoded = match read {
                    Ok(bytes) => decoder.push(&bytes),
                    Err(e) => Err(ClientError::stream(e.to_string())),
                };
                match decoded {
                    Ok(chunks) => {
                        for chunk in chunks {
                            if tx.send(Ok(chunk)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
                if decoder.is_done() {
                    return;
                }
            }

            match decoder.finish() {
                Ok(chunks) => {
                    for chunk in chunks {
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn generate_name(&self, thread_id: &str) -> ClientResult<ThreadSummary> {
        let url = self.url(&format!("threads/{}/generate-name", thread_id))?;
        self.send_json(self.request(Method::POST, url)).await
    }

    async fn list_threads(&self, context_key: Option<&str>) -> ClientResult<Vec<ThreadSummary>> {
        let mut url = self.url("threads")?;
        if let Some(key) = context_key {
            url.query_pairs_mut().append_pair("contextKey", key);
        }
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn cancel(&self, thread_id: &str) -> ClientResult<()> {
        let url = self.url(&format!("threads/{}/cancel", thread_id))?;
        self.send(self.request(Method::POST, url)).await?;
        Ok(())
    }

    async fn update_component_state(
        &self,
        thread_id: &str,
        message_id: &str,
        state: &ComponentStateMap,
    ) -> ClientResult<()> {
        let url = self.url(&format!(
            "threads/{}/messages/{}/component-state",
            thread_id, message_id
        ))?;
        self.send(
            self.request(Method::PUT, url)
                .json(&ComponentStateBody { state }),
        )
        .await?;
        Ok(())
    }
}
