use std::time::Duration;

use mindgrove_domain::moderation::{ModerationRequest, Verdict, VerdictSource};
use mindgrove_domain::ports::moderation::GenerativeModerationProvider;
use mindgrove_domain::ports::BoxFuture;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::warn;

use crate::config::AppConfig;

/// Generative fallback reviewer. Never errors out; every failure mode
/// degrades to a flagged verdict with a diagnostic category.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    retry_max_attempts: u32,
    retry_backoff_base: Duration,
}

impl GeminiClient {
    pub fn from_config(config: &AppConfig) -> Self {
        let timeout = Duration::from_millis(config.gemini_timeout_ms.max(1));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            api_key: config.gemini_api_key.trim().to_string(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.trim().to_string(),
            retry_max_attempts: config.gemini_retry_max_attempts.max(1),
            retry_backoff_base: Duration::from_millis(config.gemini_retry_backoff_base_ms),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn prompt(request: &ModerationRequest) -> String {
        let media = request
            .image_url
            .as_deref()
            .or(request.video_url.as_deref())
            .unwrap_or("none");
        format!(
            "Moderate this post for a mindfulness community app.\n\
             Text: '{}'\nMedia: {media}\n\
             Respond with a JSON object: \
             {{\"status\": \"approved\" | \"rejected\", \"category\": \"...\", \"reason\": \"...\"}}",
            request.text
        )
    }

    async fn call(&self, request: &ModerationRequest) -> Verdict {
        let payload = json!({
            "contents": [{"parts": [{"text": Self::prompt(request)}]}]
        });
        let url = self.endpoint();
        let attempts = self.retry_max_attempts;

        for attempt in 0..attempts {
            let response = match self.http.post(&url).json(&payload).send().await {
                Ok(response) => response,
                Err(err) => {
                    warn!(error = %err, "gemini request failed");
                    return flagged("unreachable", format!("gemini transport error: {err}"));
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt + 1 < attempts {
                    // Linear backoff: base, 2*base, 3*base.
                    sleep(self.retry_backoff_base * (attempt + 1)).await;
                    continue;
                }
                return flagged("rate_limited", "gemini rate limit retries exhausted");
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return flagged(
                    "bad_status",
                    format!("gemini status {}: {message}", status.as_u16()),
                );
            }

            let body: Value = match response.json().await {
                Ok(body) => body,
                Err(err) => {
                    return flagged("malformed_response", format!("gemini decode error: {err}"))
                }
            };
            return interpret_response(&body);
        }

        flagged("rate_limited", "gemini rate limit retries exhausted")
    }
}

fn flagged(category: &str, detail: impl Into<String>) -> Verdict {
    Verdict::flagged(0.5, category, vec![detail.into()], VerdictSource::GenerativeFallback)
        .with_language("en")
}

/// A response with no candidates means the provider's own safety layer
/// refused to engage with the content.
fn interpret_response(body: &Value) -> Verdict {
    let candidates = match body.get("candidates").and_then(Value::as_array) {
        Some(candidates) if !candidates.is_empty() => candidates,
        _ => {
            return Verdict::rejected(
                1.0,
                "safety_block",
                vec!["inappropriate content blocked by provider".to_string()],
                VerdictSource::GenerativeFallback,
            )
            .with_language("en");
        }
    };

    let raw_text = candidates[0]
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .and_then(|parts| parts.first())
        .and_then(|part| part.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    match parse_model_reply(raw_text) {
        Some(verdict) => verdict,
        None => flagged(
            "malformed_response",
            format!("unparseable model reply: {raw_text:.120}"),
        ),
    }
}

/// The model wraps its JSON in ``` fences more often than not.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let inner = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };
    inner.split("```").next().unwrap_or(inner).trim()
}

fn parse_model_reply(raw: &str) -> Option<Verdict> {
    let value: Value = serde_json::from_str(strip_fences(raw)).ok()?;
    let status = value.get("status").and_then(Value::as_str).unwrap_or("");
    let category = value
        .get("category")
        .and_then(Value::as_str)
        .unwrap_or("unclassified")
        .to_string();
    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("model decision")
        .to_string();

    let verdict = match status {
        "approved" => Verdict::approved(0.1, VerdictSource::GenerativeFallback),
        // Anything the model does not clearly approve is treated as a
        // rejection rather than letting ambiguity pass content through.
        _ => Verdict::rejected(0.9, category, vec![reason], VerdictSource::GenerativeFallback),
    };
    Some(verdict.with_language("en"))
}

impl GenerativeModerationProvider for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn review(&self, request: &ModerationRequest) -> BoxFuture<'_, Verdict> {
        let request = request.clone();
        Box::pin(async move {
            if self.api_key.is_empty() {
                return flagged(
                    "credentials_missing",
                    "gemini api key is not configured",
                );
            }
            self.call(&request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindgrove_domain::moderation::VerdictStatus;

    #[test]
    fn fenced_json_replies_are_parsed() {
        let raw = "```json\n{\"status\": \"approved\", \"category\": \"safe\", \"reason\": \"ok\"}\n```";
        let verdict = parse_model_reply(raw).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Approved);
        assert_eq!(verdict.score, Some(0.1));
    }

    #[test]
    fn bare_fences_are_stripped_too() {
        let raw = "```\n{\"status\": \"rejected\", \"category\": \"harassment\", \"reason\": \"insults\"}\n```";
        let verdict = parse_model_reply(raw).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Rejected);
        assert_eq!(verdict.category.as_deref(), Some("harassment"));
        assert_eq!(verdict.details, vec!["insults".to_string()]);
    }

    #[test]
    fn unknown_statuses_are_conservatively_rejected() {
        let raw = "{\"status\": \"maybe\", \"category\": \"unclear\", \"reason\": \"hard to say\"}";
        let verdict = parse_model_reply(raw).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Rejected);
        assert_eq!(verdict.score, Some(0.9));
    }

    #[test]
    fn prose_replies_do_not_parse() {
        assert!(parse_model_reply("I cannot help with that.").is_none());
    }

    #[test]
    fn missing_candidates_is_a_safety_block() {
        let body = serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let verdict = interpret_response(&body);
        assert_eq!(verdict.status, VerdictStatus::Rejected);
        assert_eq!(verdict.category.as_deref(), Some("safety_block"));
        assert_eq!(verdict.score, Some(1.0));
    }
}
