//! OpenAI-compatible oracle client
//!
//! Talks to any chat-completions endpoint that speaks the OpenAI wire
//! shape (including local runtimes). Prompts instruct the model to
//! answer with a single JSON object; anything else is a parse error,
//! never a silently-accepted guess.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use super::{Classification, Oracle, OracleError, Selection};
use crate::coordinator::context::ExecutionContext;
use crate::config::OracleConfig;
use protocol::Candidate;

pub struct OpenAiOracle {
    config: OracleConfig,
    client: reqwest::Client,
}

impl OpenAiOracle {
    pub fn new(config: OracleConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    /// POST one chat request and return the assistant message content.
    async fn chat(&self, system: &str, user: &str) -> super::Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let payload = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0.0,
        });

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => OracleError::AuthenticationFailed(text),
                _ => OracleError::Unavailable(format!("HTTP {}: {}", status, text)),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::ParseError(e.to_string()))?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| OracleError::ParseError("missing message content".to_string()))
    }
}

/// Parse the model's answer as one JSON object, tolerating a fenced
/// code block around it but nothing looser.
fn parse_json_answer(content: &str) -> super::Result<serde_json::Value> {
    let trimmed = content.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str(inner)
        .map_err(|e| OracleError::ParseError(format!("{} — raw: {}", e, content)))
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn classify(&self, utterance: &str, ctx: &ExecutionContext) -> super::Result<Classification> {
        let system = "You classify requests made to a retro-game launcher. \
            Answer with one JSON object only: \
            {\"intent\": \"launch_title\" | \"find_alternative\" | \"recommend\", \
            \"target\": string or null, \"system\": string or null}.";

        let mut user = format!("Utterance: {utterance}\n");
        if let Some(playing) = ctx.now_playing() {
            user.push_str(&format!(
                "Currently playing: {} ({})\n",
                playing.name, playing.system
            ));
        }
        if let Some(previous) = ctx.previous_target() {
            user.push_str(&format!("Previous request target: {previous}\n"));
        }

        let content = self.chat(system, &user).await?;
        let value = parse_json_answer(&content)?;
        serde_json::from_value(value).map_err(|e| OracleError::ParseError(e.to_string()))
    }

    async fn select_best(
        &self,
        candidates: &[Candidate],
        target: &str,
        ctx: &ExecutionContext,
    ) -> super::Result<Selection> {
        let system = "You pick the search result best matching what the user asked for. \
            Answer with one JSON object only: \
            {\"found\": true, \"name\": \"<exact candidate name>\", \"reason\": \"...\"} \
            or {\"found\": false, \"reason\": \"...\"}.";

        let mut user = format!("User asked for: {target}\nCandidates:\n");
        for candidate in candidates {
            user.push_str(&format!("- {}\n", candidate.name));
        }
        if !ctx.rejected().is_empty() {
            user.push_str(&format!(
                "Already declined by the user: {}\n",
                ctx.rejected().join(", ")
            ));
        }

        let content = self.chat(system, &user).await?;
        let value = parse_json_answer(&content)?;

        let found = value["found"]
            .as_bool()
            .ok_or_else(|| OracleError::ParseError("missing 'found' field".to_string()))?;
        let reason = value["reason"].as_str().unwrap_or_default().to_string();

        if !found {
            return Ok(Selection::NoneSuitable { reason });
        }

        let name = value["name"]
            .as_str()
            .ok_or_else(|| OracleError::ParseError("missing 'name' field".to_string()))?;

        // The oracle must name one of the offered candidates; an
        // invented name is malformed data, not a result.
        let candidate = candidates
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| {
                OracleError::ParseError(format!("oracle chose unknown candidate {name:?}"))
            })?;

        Ok(Selection::Chosen { candidate, reason })
    }
}
