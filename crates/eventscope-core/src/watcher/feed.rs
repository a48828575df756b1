//! Change feed abstraction and the Kubernetes API implementation.

use crate::error::{Error, Result};
use crate::event::Cursor;

use async_trait::async_trait;
use futures::stream::Stream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;
use tracing::debug;

/// Kind of a single watch change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
}

/// One line of the watch stream: a change kind plus the raw object.
#[derive(Debug, Clone, Deserialize)]
pub struct RawChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub object: Value,
}

pub type RawChangeStream = Pin<Box<dyn Stream<Item = Result<RawChange>> + Send>>;

/// Source of event changes. The production implementation talks to the
/// Kubernetes API server; tests script one in memory.
#[async_trait]
pub trait WatchFeed: Send + Sync {
    /// Full current listing, plus the cursor to resume watching from.
    async fn list(&self) -> Result<(Vec<Value>, Cursor)>;

    /// Open a change stream, resuming after `cursor` when given.
    async fn open(&self, cursor: Option<&Cursor>) -> Result<RawChangeStream>;
}

/// Connection settings for [`KubeFeed`].
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub api_server: String,
    pub namespace: String,
    pub token_path: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
    pub insecure_skip_tls: bool,
}

/// Event feed backed by the Kubernetes events API.
pub struct KubeFeed {
    client: reqwest::Client,
    events_url: String,
    bearer: Option<String>,
}

impl KubeFeed {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(ca_path) = &config.ca_path {
            let pem = std::fs::read(ca_path)
                .map_err(|e| Error::Config(format!("read CA bundle {}: {e}", ca_path.display())))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| Error::Config(format!("parse CA bundle: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if config.insecure_skip_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build()?;

        let bearer = match &config.token_path {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .map(|s| s.trim().to_string())
                    .map_err(|e| Error::Config(format!("read token {}: {e}", path.display())))?,
            ),
            None => None,
        };

        let events_url = format!(
            "{}/api/v1/namespaces/{}/events",
            config.api_server.trim_end_matches('/'),
            config.namespace
        );
        Ok(Self {
            client,
            events_url,
            bearer,
        })
    }

    fn request(&self, query: &[(&str, &str)]) -> reqwest::RequestBuilder {
        let mut req = self.client.get(&self.events_url).query(query);
        if let Some(token) = &self.bearer {
            req = req.bearer_auth(token);
        }
        req
    }
}

#[async_trait]
impl WatchFeed for KubeFeed {
    async fn list(&self) -> Result<(Vec<Value>, Cursor)> {
        let response = self.request(&[]).send().await?.error_for_status()?;
        let body: Value = response.json().await?;

        let cursor = body
            .get("metadata")
            .and_then(|m| m.get("resourceVersion"))
            .and_then(Value::as_str)
            .map(Cursor::new)
            .ok_or_else(|| Error::Feed("listing carries no resourceVersion".into()))?;
        let items = match body.get("items") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        debug!(items = items.len(), cursor = %cursor, "listed events");
        Ok((items, cursor))
    }

    async fn open(&self, cursor: Option<&Cursor>) -> Result<RawChangeStream> {
        let mut query = vec![("watch", "true"), ("allowWatchBookmarks", "true")];
        if let Some(cursor) = cursor {
            query.push(("resourceVersion", cursor.as_str()));
        }

        let response = self.request(&query).send().await?;
        if response.status() == reqwest::StatusCode::GONE {
            return Err(Error::StaleCursor);
        }
        let response = response.error_for_status()?;

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        let reader = BufReader::new(StreamReader::new(bytes));
        let lines = reader.lines();

        let stream = futures::stream::unfold(lines, |mut lines| async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => return Some((parse_line(&line), lines)),
                    Ok(None) => return None,
                    Err(e) => return Some((Err(Error::Feed(format!("stream read: {e}"))), lines)),
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

/// Parse one NDJSON watch line. ERROR frames carrying an HTTP 410 status
/// become [`Error::StaleCursor`] so the session resyncs instead of retrying
/// a cursor the server no longer holds.
pub(crate) fn parse_line(line: &str) -> Result<RawChange> {
    let change: RawChange = serde_json::from_str(line)
        .map_err(|e| Error::Malformed(format!("watch frame: {e}")))?;
    if change.kind == ChangeKind::Error {
        let code = change.object.get("code").and_then(Value::as_i64);
        if code == Some(410) {
            return Err(Error::StaleCursor);
        }
        let message = change
            .object
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown watch error");
        return Err(Error::Feed(message.to_string()));
    }
    Ok(change)
}
