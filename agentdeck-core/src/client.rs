//! HTTP client for the dashboard REST API
//!
//! Reads feed the History Merger and the backfill path; writes are the
//! operator controls (message, interrupt, compact). Reads are retried on
//! transient failures, writes are sent once.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::types::{AgentEvent, Message, Thought};

/// Response from GET /api/messages
#[derive(Debug, Clone, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// Total messages on the server
    #[serde(default)]
    pub total: usize,
    /// Whether another page follows this one
    #[serde(default)]
    pub has_more: bool,
}

/// Response from GET /api/agent-events
#[derive(Debug, Clone, Deserialize)]
pub struct AgentEventList {
    pub events: Vec<AgentEvent>,
    #[serde(default)]
    pub total: usize,
}

/// Response from GET /api/thoughts
#[derive(Debug, Clone, Deserialize)]
struct ThoughtList {
    thoughts: Vec<Thought>,
}

/// Response from GET /api/agents/{id}/terminal
#[derive(Debug, Clone, Deserialize)]
pub struct TerminalSnapshot {
    pub agent_id: String,
    pub output: String,
    #[serde(default)]
    pub lines: usize,
}

/// Request body for POST /api/agents/{id}/message
#[derive(Serialize)]
struct SendMessageRequest<'a> {
    content: &'a str,
}

/// HTTP client for the dashboard server
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    max_retries: usize,
}

impl ApiClient {
    /// Create a new client from server configuration
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config("server.base_url is required".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            max_retries: config.max_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn agent_url(&self, agent_id: &str, action: &str) -> String {
        format!(
            "{}/api/agents/{}/{}",
            self.base_url,
            urlencoding::encode(agent_id),
            action
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Api(format!("HTTP request failed: {}", e)))?;
        read_json(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let mut request = self.http_client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::Api(format!("HTTP request failed: {}", e)))?;
        read_json(response).await
    }

    /// Run a read with retry
    ///
    /// Retries transient failures (5xx, timeouts) with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut request: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying {} (attempt {}/{}), waiting {:?}",
                    what,
                    attempt + 1,
                    self.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }

            match request().await {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable_error(&e) => {
                    tracing::warn!("Transient error during {}: {}", what, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Api("max retries exceeded".to_string())))
    }

    /// One page of chat messages, newest first as the server returns them
    pub async fn messages(&self, limit: usize, offset: usize) -> Result<MessagePage> {
        let url = format!(
            "{}/api/messages?limit={}&offset={}",
            self.base_url, limit, offset
        );
        self.with_retry("messages", || self.get_json(&url)).await
    }

    /// Recent tool-events, optionally for one session
    pub async fn agent_events(&self, session_id: Option<&str>, limit: usize) -> Result<Vec<AgentEvent>> {
        let mut url = format!("{}/api/agent-events?limit={}", self.base_url, limit);
        if let Some(session_id) = session_id {
            url.push_str(&format!("&session_id={}", urlencoding::encode(session_id)));
        }
        let list: AgentEventList = self.with_retry("agent events", || self.get_json(&url)).await?;
        Ok(list.events.into_iter().map(with_event_id).collect())
    }

    /// Persisted tool-events joined to the messages that produced them
    pub async fn events_by_messages(
        &self,
        message_ids: &[String],
    ) -> Result<HashMap<String, Vec<AgentEvent>>> {
        if message_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let joined = message_ids.join(",");
        let url = format!(
            "{}/api/agent-events/by-messages?message_ids={}",
            self.base_url,
            urlencoding::encode(&joined)
        );
        let map: HashMap<String, Vec<AgentEvent>> = self
            .with_retry("events by messages", || self.get_json(&url))
            .await?;
        Ok(map
            .into_iter()
            .map(|(id, events)| (id, events.into_iter().map(with_event_id).collect()))
            .collect())
    }

    /// Persisted thoughts, optionally for one agent
    pub async fn thoughts(&self, limit: usize, agent_name: Option<&str>) -> Result<Vec<Thought>> {
        let mut url = format!("{}/api/thoughts?limit={}", self.base_url, limit);
        if let Some(agent) = agent_name {
            url.push_str(&format!("&agent_name={}", urlencoding::encode(agent)));
        }
        let list: ThoughtList = self.with_retry("thoughts", || self.get_json(&url)).await?;
        Ok(list
            .thoughts
            .into_iter()
            .map(|mut thought| {
                thought.ensure_id();
                thought
            })
            .collect())
    }

    /// Last `lines` lines of an agent's terminal
    pub async fn agent_terminal(&self, agent_id: &str, lines: usize) -> Result<TerminalSnapshot> {
        let url = format!("{}?lines={}", self.agent_url(agent_id, "terminal"), lines);
        self.with_retry("terminal", || self.get_json(&url))
            .await
            .map_err(|e| not_found_as_agent(e, agent_id))
    }

    /// Send a chat message to an agent
    pub async fn send_message(&self, agent_id: &str, content: &str) -> Result<()> {
        let url = self.agent_url(agent_id, "message");
        let _: serde_json::Value = self
            .post_json(&url, Some(&SendMessageRequest { content }))
            .await
            .map_err(|e| not_found_as_agent(e, agent_id))?;
        Ok(())
    }

    /// Interrupt an agent's current turn
    pub async fn interrupt(&self, agent_id: &str) -> Result<()> {
        let url = self.agent_url(agent_id, "interrupt");
        let _: serde_json::Value = self
            .post_json::<_, ()>(&url, None)
            .await
            .map_err(|e| not_found_as_agent(e, agent_id))?;
        Ok(())
    }

    /// Ask an agent to compact its context
    pub async fn compact(&self, agent_id: &str) -> Result<()> {
        let url = self.agent_url(agent_id, "compact");
        let _: serde_json::Value = self
            .post_json::<_, ()>(&url, None)
            .await
            .map_err(|e| not_found_as_agent(e, agent_id))?;
        Ok(())
    }

    /// Check if the server is reachable by listing agents
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/agents", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| Error::Api(format!("failed to parse response: {}", e)))
    } else {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        Err(Error::Api(format!("API error ({}): {}", status, error_text)))
    }
}

fn with_event_id(mut event: AgentEvent) -> AgentEvent {
    event.ensure_id();
    event
}

fn not_found_as_agent(error: Error, agent_id: &str) -> Error {
    match &error {
        Error::Api(msg) if msg.starts_with("API error (404") => {
            Error::AgentNotFound(agent_id.to_string())
        }
        _ => error,
    }
}

/// Check if an error is retryable (transient)
fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Api(msg) => {
            // 5xx responses
            msg.starts_with("API error (5")
                // Network and timeout errors
                || msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("request failed")
        }
        _ => false,
    }
}
