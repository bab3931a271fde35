//! # Score Aggregator
//! Blends the lexicon polarity and the signed classifier confidence into the
//! community vibe score and its 0–100 oracle rescaling.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::classifier::DynClassifier;
use crate::error::AnalyzeError;
use crate::lexicon::PolarityScorer;

pub const LEXICON_WEIGHT: f64 = 0.4;
pub const CLASSIFIER_WEIGHT: f64 = 0.6;
/// Input limit of the classifier, in characters.
pub const CLASSIFIER_MAX_CHARS: usize = 512;

/// One aggregation result. Wire names match the public API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentReading {
    #[serde(rename = "vader_score")]
    pub lexicon_score: f64,
    #[serde(rename = "huggingface_score")]
    pub classifier_score: f64,
    pub community_vibe_score: f64,
    pub oracle_score: u8,
}

impl SentimentReading {
    /// Combine two raw signals in `[-1, 1]`. Floats are rounded to 4 decimals;
    /// the oracle score is derived from the rounded vibe score.
    pub fn from_signals(lexicon: f64, classifier: f64) -> Self {
        let lexicon = lexicon.clamp(-1.0, 1.0);
        let classifier = classifier.clamp(-1.0, 1.0);
        let vibe = round4(blend(lexicon, classifier));
        Self {
            lexicon_score: round4(lexicon),
            classifier_score: round4(classifier),
            community_vibe_score: vibe,
            oracle_score: oracle_score(vibe),
        }
    }
}

/// Fixed-weight blend; weights sum to 1 so the result stays in `[-1, 1]`.
pub fn blend(lexicon: f64, classifier: f64) -> f64 {
    LEXICON_WEIGHT * lexicon + CLASSIFIER_WEIGHT * classifier
}

// Half away from zero on the scaled binary value. Python's round(x, 4) is
// correctly rounded half-to-even, so exact decimal ties can differ in the last digit.
pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Affine map `[-1, 1] -> [0, 100]`, truncated (never rounded up).
pub fn oracle_score(combined: f64) -> u8 {
    let scaled = ((combined + 1.0) / 2.0) * 100.0;
    scaled.floor().clamp(0.0, 100.0) as u8
}

/// First `max` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Owns both collaborators for the lifetime of the process.
pub struct ScoreAggregator {
    lexicon: Arc<dyn PolarityScorer>,
    classifier: DynClassifier,
    timeout: Duration,
}

impl ScoreAggregator {
    pub fn new(
        lexicon: Arc<dyn PolarityScorer>,
        classifier: DynClassifier,
        timeout: Duration,
    ) -> Self {
        Self {
            lexicon,
            classifier,
            timeout,
        }
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.provider_name()
    }

    pub fn lexicon_name(&self) -> &'static str {
        self.lexicon.name()
    }

    /// Score `text`. A classifier failure or timeout fails the whole reading.
    pub async fn analyze(&self, text: &str) -> Result<SentimentReading, AnalyzeError> {
        let lexicon = self.lexicon.compound(text);

        let head = truncate_chars(text, CLASSIFIER_MAX_CHARS);
        let classification = tokio::time::timeout(self.timeout, self.classifier.classify(head))
            .await
            .map_err(|_| AnalyzeError::Timeout(self.timeout))??;

        let reading = SentimentReading::from_signals(lexicon, classification.signed());
        debug!(
            lexicon = reading.lexicon_score,
            classifier = reading.classifier_score,
            vibe = reading.community_vibe_score,
            oracle = reading.oracle_score,
            "reading computed"
        );
        Ok(reading)
    }
}
