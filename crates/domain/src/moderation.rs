use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::DomainError;
use crate::ports::moderation::{GenerativeModerationProvider, MediaModerationProvider};
use crate::DomainResult;

/// Final disposition of a piece of content after moderation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Approved,
    Rejected,
    Flagged,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Approved => "approved",
            VerdictStatus::Rejected => "rejected",
            VerdictStatus::Flagged => "flagged",
        }
    }

    pub fn parse(value: &str) -> DomainResult<Self> {
        match value {
            "approved" => Ok(VerdictStatus::Approved),
            "rejected" => Ok(VerdictStatus::Rejected),
            "flagged" => Ok(VerdictStatus::Flagged),
            other => Err(DomainError::Validation(format!(
                "unknown verdict status: {other}"
            ))),
        }
    }
}

/// Which stage of the pipeline produced the verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    Heuristic,
    MediaProvider,
    GenerativeFallback,
    ErrorDefault,
}

impl VerdictSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictSource::Heuristic => "heuristic",
            VerdictSource::MediaProvider => "media_provider",
            VerdictSource::GenerativeFallback => "generative_fallback",
            VerdictSource::ErrorDefault => "error_default",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub score: Option<f64>,
    pub category: Option<String>,
    #[serde(default)]
    pub details: Vec<String>,
    pub source: VerdictSource,
    pub language: Option<String>,
}

impl Verdict {
    pub fn approved(score: f64, source: VerdictSource) -> Self {
        Self {
            status: VerdictStatus::Approved,
            score: Some(score),
            category: None,
            details: Vec::new(),
            source,
            language: None,
        }
    }

    pub fn rejected(
        score: f64,
        category: impl Into<String>,
        details: Vec<String>,
        source: VerdictSource,
    ) -> Self {
        let category = category.into();
        let details = if details.is_empty() {
            vec![format!("content rejected: {category}")]
        } else {
            details
        };
        Self {
            status: VerdictStatus::Rejected,
            score: Some(score),
            category: Some(category),
            details,
            source,
            language: None,
        }
    }

    pub fn flagged(
        score: f64,
        category: impl Into<String>,
        details: Vec<String>,
        source: VerdictSource,
    ) -> Self {
        Self {
            status: VerdictStatus::Flagged,
            score: Some(score),
            category: Some(category.into()),
            details,
            source,
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn is_approved(&self) -> bool {
        self.status == VerdictStatus::Approved
    }
}

/// Content handed to the pipeline for review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModerationRequest {
    pub content_id: String,
    pub text: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

impl ModerationRequest {
    pub fn new(
        content_id: impl Into<String>,
        text: impl Into<String>,
        image_url: Option<String>,
        video_url: Option<String>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            text: text.into(),
            image_url,
            video_url,
        }
    }

    pub fn text_only(content_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(content_id, text, None, None)
    }

    pub fn with_image(
        content_id: impl Into<String>,
        text: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self::new(content_id, text, Some(image_url.into()), None)
    }

    pub fn has_media(&self) -> bool {
        self.image_url.is_some() || self.video_url.is_some()
    }
}

/// What a media provider call produced.
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderOutcome {
    Verdict(Verdict),
    NoVerdict,
    Error { code: String, message: String },
}

/// One pipeline stage's contribution to the audit trail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageAttempt {
    pub stage: VerdictSource,
    pub outcome: String,
}

impl StageAttempt {
    pub fn new(stage: VerdictSource, outcome: impl Into<String>) -> Self {
        Self {
            stage,
            outcome: outcome.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModerationOutcome {
    pub verdict: Verdict,
    pub attempts: Vec<StageAttempt>,
}

lazy_static! {
    static ref SAFE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(peace|peaceful|mindful|mindfulness|meditation|meditate)\b")
            .expect("safe pattern"),
        Regex::new(r"(?i)\b(breathe|breathing|calm|gratitude|grateful)\b").expect("safe pattern"),
        Regex::new(r"(?i)\b(love|joy|happiness|kindness|hope)\b").expect("safe pattern"),
        Regex::new(r"(?i)\b(good morning|have a great day|stay positive|keep going)\b")
            .expect("safe pattern"),
    ];
    static ref PROFANITY_PATTERN: Regex =
        Regex::new(r"(?i)\b(fuck(?:ing|er)?|shit(?:ty)?|bitch|asshole|bastard|cunt|dickhead)\b")
            .expect("profanity pattern");
    static ref SPAM_PATTERN: Regex = Regex::new(
        r"(?i)\b(buy now|click here|make money fast|limited time offer|act now)\b|earn \$\d+",
    )
    .expect("spam pattern");
    static ref THREAT_PATTERN: Regex =
        Regex::new(r"(?i)\b(kill yourself|kys|i will hurt you|i will kill)\b")
            .expect("threat pattern");
}

const SAFE_WORD_LIMIT: usize = 50;

fn matched_terms(pattern: &Regex, text: &str) -> Vec<String> {
    let mut terms: Vec<String> = pattern
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    terms.dedup();
    terms
}

/// Cheap first pass over the text. Returns `None` when inconclusive.
pub fn heuristic_verdict(request: &ModerationRequest) -> Option<Verdict> {
    let text = request.text.trim();

    let profanity = matched_terms(&PROFANITY_PATTERN, text);
    if !profanity.is_empty() {
        return Some(Verdict::rejected(
            1.0,
            "profanity",
            profanity,
            VerdictSource::Heuristic,
        ));
    }
    let threats = matched_terms(&THREAT_PATTERN, text);
    if !threats.is_empty() {
        return Some(Verdict::rejected(
            1.0,
            "harassment",
            threats,
            VerdictSource::Heuristic,
        ));
    }
    let spam = matched_terms(&SPAM_PATTERN, text);
    if !spam.is_empty() {
        return Some(Verdict::rejected(
            1.0,
            "spam",
            spam,
            VerdictSource::Heuristic,
        ));
    }

    let word_count = text.split_whitespace().count();
    let looks_safe = !text.is_empty()
        && word_count < SAFE_WORD_LIMIT
        && SAFE_PATTERNS.iter().any(|pattern| pattern.is_match(text));
    if looks_safe && !request.has_media() {
        return Some(Verdict::approved(0.0, VerdictSource::Heuristic));
    }

    None
}

/// Three-stage moderation: heuristics, then the media provider, then the
/// generative fallback. Each stage either settles the verdict or defers.
#[derive(Clone)]
pub struct ModerationPipeline {
    media: Option<Arc<dyn MediaModerationProvider>>,
    generative: Option<Arc<dyn GenerativeModerationProvider>>,
}

impl ModerationPipeline {
    pub fn new(
        media: Option<Arc<dyn MediaModerationProvider>>,
        generative: Option<Arc<dyn GenerativeModerationProvider>>,
    ) -> Self {
        Self { media, generative }
    }

    pub async fn check_content(&self, request: &ModerationRequest) -> ModerationOutcome {
        let mut attempts = Vec::new();
        let mut soft_errors: Vec<String> = Vec::new();

        if let Some(verdict) = heuristic_verdict(request) {
            attempts.push(StageAttempt::new(
                VerdictSource::Heuristic,
                format!("settled: {}", verdict.status.as_str()),
            ));
            info!(
                content_id = %request.content_id,
                status = verdict.status.as_str(),
                "heuristic stage settled verdict"
            );
            return ModerationOutcome { verdict, attempts };
        }
        attempts.push(StageAttempt::new(VerdictSource::Heuristic, "inconclusive"));

        if let Some(media) = &self.media {
            match media.check(request).await {
                ProviderOutcome::Verdict(verdict) => {
                    attempts.push(StageAttempt::new(
                        VerdictSource::MediaProvider,
                        format!("settled: {}", verdict.status.as_str()),
                    ));
                    info!(
                        content_id = %request.content_id,
                        provider = media.name(),
                        status = verdict.status.as_str(),
                        "media provider settled verdict"
                    );
                    return ModerationOutcome { verdict, attempts };
                }
                ProviderOutcome::NoVerdict => {
                    attempts.push(StageAttempt::new(VerdictSource::MediaProvider, "no verdict"));
                }
                ProviderOutcome::Error { code, message } => {
                    warn!(
                        content_id = %request.content_id,
                        provider = media.name(),
                        code = %code,
                        "media provider failed, deferring to fallback"
                    );
                    attempts.push(StageAttempt::new(
                        VerdictSource::MediaProvider,
                        format!("error {code}: {message}"),
                    ));
                    soft_errors.push(format!("{}: {code}: {message}", media.name()));
                }
            }
        }

        if let Some(generative) = &self.generative {
            let mut verdict = generative.review(request).await;
            verdict.details.extend(soft_errors);
            attempts.push(StageAttempt::new(
                VerdictSource::GenerativeFallback,
                format!("settled: {}", verdict.status.as_str()),
            ));
            info!(
                content_id = %request.content_id,
                provider = generative.name(),
                status = verdict.status.as_str(),
                "generative fallback settled verdict"
            );
            return ModerationOutcome { verdict, attempts };
        }

        warn!(
            content_id = %request.content_id,
            "no stage produced a verdict, flagging for manual review"
        );
        let mut details = vec!["no moderation stage reached a verdict".to_string()];
        details.extend(soft_errors);
        let verdict = Verdict::flagged(0.5, "needs_review", details, VerdictSource::ErrorDefault);
        attempts.push(StageAttempt::new(
            VerdictSource::ErrorDefault,
            "flagged for manual review",
        ));
        ModerationOutcome { verdict, attempts }
    }
}
