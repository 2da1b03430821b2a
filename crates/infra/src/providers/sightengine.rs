use std::time::Duration;

use mindgrove_domain::moderation::{ModerationRequest, ProviderOutcome, Verdict, VerdictSource};
use mindgrove_domain::ports::moderation::MediaModerationProvider;
use mindgrove_domain::ports::BoxFuture;
use serde_json::Value;

use crate::config::AppConfig;

const IMAGE_MODELS: &str = "nudity-2.0,wad,scam,suggestive,gore";
const NUDITY_THRESHOLD: f64 = 0.1;
const NUDITY_PARTIAL_THRESHOLD: f64 = 0.2;
const WAD_THRESHOLD: f64 = 0.5;
const GORE_THRESHOLD: f64 = 0.3;
const SCAM_THRESHOLD: f64 = 0.6;

/// Sightengine adapter. Only ever returns definitive rejections; clean
/// reads defer to the next pipeline stage.
#[derive(Clone)]
pub struct SightengineClient {
    http: reqwest::Client,
    api_user: String,
    api_secret: String,
    text_url: String,
    image_url: String,
}

impl SightengineClient {
    pub fn from_config(config: &AppConfig) -> Self {
        let timeout = Duration::from_millis(config.sightengine_timeout_ms.max(1));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            api_user: config.sightengine_api_user.trim().to_string(),
            api_secret: config.sightengine_api_secret.trim().to_string(),
            text_url: config.sightengine_text_url.trim_end_matches('/').to_string(),
            image_url: config
                .sightengine_image_url
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn credentialed(&self) -> bool {
        !self.api_user.is_empty() && !self.api_secret.is_empty()
    }

    async fn check_text(&self, text: &str) -> Result<Option<Verdict>, ProviderOutcome> {
        let params = [
            ("text", text),
            ("lang", "en"),
            ("mode", "standard"),
            ("api_user", self.api_user.as_str()),
            ("api_secret", self.api_secret.as_str()),
        ];
        let response = self
            .http
            .post(&self.text_url)
            .form(&params)
            .send()
            .await
            .map_err(transport_error)?;
        let body = decode_success(response).await?;
        Ok(text_verdict(&body))
    }

    async fn check_image(&self, url: &str) -> Result<Option<Verdict>, ProviderOutcome> {
        let params = [
            ("models", IMAGE_MODELS),
            ("url", url),
            ("api_user", self.api_user.as_str()),
            ("api_secret", self.api_secret.as_str()),
        ];
        let response = self
            .http
            .get(&self.image_url)
            .query(&params)
            .send()
            .await
            .map_err(transport_error)?;
        let body = decode_success(response).await?;
        Ok(image_verdict(&body))
    }
}

fn transport_error(err: reqwest::Error) -> ProviderOutcome {
    let code = if err.is_timeout() {
        "timeout"
    } else {
        "unreachable"
    };
    ProviderOutcome::Error {
        code: code.to_string(),
        message: err.to_string(),
    }
}

async fn decode_success(response: reqwest::Response) -> Result<Value, ProviderOutcome> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ProviderOutcome::Error {
            code: "bad_status".to_string(),
            message: format!("status {}: {message}", status.as_u16()),
        });
    }
    let body: Value = response.json().await.map_err(|err| ProviderOutcome::Error {
        code: "invalid_response".to_string(),
        message: err.to_string(),
    })?;
    if body.get("status").and_then(Value::as_str) != Some("success") {
        return Err(ProviderOutcome::Error {
            code: "bad_status".to_string(),
            message: "provider reported a non-success status".to_string(),
        });
    }
    Ok(body)
}

fn score(body: &Value, path: &[&str]) -> f64 {
    let mut current = body;
    for key in path {
        match current.get(key) {
            Some(value) => current = value,
            None => return 0.0,
        }
    }
    current.as_f64().unwrap_or(0.0)
}

fn text_verdict(body: &Value) -> Option<Verdict> {
    let matches = body
        .get("profanity")
        .and_then(|profanity| profanity.get("matches"))
        .and_then(Value::as_array)?;
    if matches.is_empty() {
        return None;
    }
    let kinds: Vec<String> = matches
        .iter()
        .filter_map(|entry| entry.get("type").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    Some(
        Verdict::rejected(
            0.95,
            "profanity",
            vec![format!("harmful language detected: {}", kinds.join(", "))],
            VerdictSource::MediaProvider,
        )
        .with_language("en"),
    )
}

fn image_verdict(body: &Value) -> Option<Verdict> {
    let nudity_hit = score(body, &["nudity", "erotica"]) > NUDITY_THRESHOLD
        || score(body, &["nudity", "sexual_display"]) > NUDITY_THRESHOLD
        || score(body, &["nudity", "sexting"]) > NUDITY_THRESHOLD
        || score(body, &["nudity", "raw"]) > NUDITY_THRESHOLD
        || score(body, &["nudity", "partial"]) > NUDITY_PARTIAL_THRESHOLD;
    if nudity_hit {
        return Some(
            Verdict::rejected(
                1.0,
                "nudity",
                vec!["prohibited visual content detected".to_string()],
                VerdictSource::MediaProvider,
            )
            .with_language("en"),
        );
    }

    let wad = score(body, &["weapon"]) + score(body, &["alcohol"]) + score(body, &["drugs"]);
    if wad > WAD_THRESHOLD || score(body, &["gore", "prob"]) > GORE_THRESHOLD {
        return Some(
            Verdict::rejected(
                1.0,
                "harmful_visuals",
                vec!["content violates community safety guidelines".to_string()],
                VerdictSource::MediaProvider,
            )
            .with_language("en"),
        );
    }

    if score(body, &["scam", "prob"]) > SCAM_THRESHOLD {
        return Some(
            Verdict::rejected(
                0.9,
                "scam",
                vec!["scam pattern detected".to_string()],
                VerdictSource::MediaProvider,
            )
            .with_language("en"),
        );
    }

    None
}

impl MediaModerationProvider for SightengineClient {
    fn name(&self) -> &'static str {
        "sightengine"
    }

    fn check(&self, request: &ModerationRequest) -> BoxFuture<'_, ProviderOutcome> {
        let text = request.text.clone();
        let image_url = request.image_url.clone();
        Box::pin(async move {
            if !self.credentialed() {
                return ProviderOutcome::Error {
                    code: "credentials_missing".to_string(),
                    message: "sightengine credentials are not configured".to_string(),
                };
            }

            if !text.trim().is_empty() {
                match self.check_text(&text).await {
                    Ok(Some(verdict)) => return ProviderOutcome::Verdict(verdict),
                    Ok(None) => {}
                    Err(outcome) => return outcome,
                }
            }

            if let Some(url) = &image_url {
                match self.check_image(url).await {
                    Ok(Some(verdict)) => return ProviderOutcome::Verdict(verdict),
                    Ok(None) => {}
                    Err(outcome) => return outcome,
                }
            }

            // A clean read is never an approval; the next stage decides.
            ProviderOutcome::NoVerdict
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindgrove_domain::moderation::VerdictStatus;
    use serde_json::json;

    #[test]
    fn profanity_matches_reject_the_text() {
        let body = json!({
            "status": "success",
            "profanity": {"matches": [{"type": "sexual"}, {"type": "insult"}]}
        });
        let verdict = text_verdict(&body).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Rejected);
        assert_eq!(verdict.score, Some(0.95));
        assert_eq!(verdict.category.as_deref(), Some("profanity"));
        assert!(verdict.details[0].contains("sexual, insult"));
    }

    #[test]
    fn clean_text_defers() {
        let body = json!({"status": "success", "profanity": {"matches": []}});
        assert!(text_verdict(&body).is_none());
    }

    #[test]
    fn low_nudity_scores_pass_but_partial_has_its_own_threshold() {
        let clean = json!({
            "status": "success",
            "nudity": {"erotica": 0.05, "partial": 0.15},
            "weapon": 0.0, "alcohol": 0.1, "drugs": 0.0,
            "gore": {"prob": 0.0}, "scam": {"prob": 0.0}
        });
        assert!(image_verdict(&clean).is_none());

        let partial = json!({
            "status": "success",
            "nudity": {"partial": 0.3}
        });
        let verdict = image_verdict(&partial).unwrap();
        assert_eq!(verdict.category.as_deref(), Some("nudity"));
        assert_eq!(verdict.score, Some(1.0));
    }

    #[test]
    fn weapon_alcohol_drugs_scores_are_summed() {
        let body = json!({
            "status": "success",
            "nudity": {},
            "weapon": 0.2, "alcohol": 0.2, "drugs": 0.2,
            "gore": {"prob": 0.0}
        });
        let verdict = image_verdict(&body).unwrap();
        assert_eq!(verdict.category.as_deref(), Some("harmful_visuals"));
    }

    #[test]
    fn scam_probability_rejects_above_threshold() {
        let body = json!({
            "status": "success",
            "nudity": {},
            "scam": {"prob": 0.7}
        });
        let verdict = image_verdict(&body).unwrap();
        assert_eq!(verdict.category.as_deref(), Some("scam"));
        assert_eq!(verdict.score, Some(0.9));
    }
}
