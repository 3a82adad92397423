//! Vision extraction client: one image in, one flat field map out.
//!
//! Failures here are contained per category. Whatever goes wrong with a
//! single image (overload, a non-JSON answer, a dead network), the client
//! reports `None` for that category and the rest of the request proceeds.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::Rng as _;
use regex::Regex;
use serde_json::Value;
use tokio::time;

use crate::{
    category::Category,
    gemini::{ImagePayload, ModelError, VisionModel},
    merge::FieldMap,
    prelude::*,
    prompts::prompt_for,
};

/// Default ceiling on model attempts per image.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Injectable delay, so retry behavior can be tested without real time.
#[async_trait]
pub trait Sleeper: fmt::Debug + Send + Sync + 'static {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        time::sleep(duration).await;
    }
}

/// Runs per-category extractions against a vision model, retrying overload
/// errors with exponential backoff.
#[derive(Debug)]
pub struct VisionExtractor {
    /// The model transport.
    model: Arc<dyn VisionModel>,

    /// Total attempt ceiling per image, including the first attempt.
    max_attempts: u32,

    /// How we wait between attempts.
    sleeper: Arc<dyn Sleeper>,
}

impl VisionExtractor {
    /// Create an extractor with the standard tokio sleeper.
    pub fn new(model: Arc<dyn VisionModel>, max_attempts: u32) -> Self {
        Self::with_sleeper(model, max_attempts, Arc::new(TokioSleeper))
    }

    /// Create an extractor with an explicit sleeper. Tests use this to run
    /// the backoff loop without real delays.
    pub fn with_sleeper(
        model: Arc<dyn VisionModel>,
        max_attempts: u32,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            model,
            // A ceiling of zero would mean never calling the model at all.
            max_attempts: max_attempts.max(1),
            sleeper,
        }
    }

    /// Extract fields for one category from one image.
    ///
    /// Returns `None` when the model stays overloaded past the attempt
    /// ceiling, fails outright, or answers with something that is not a JSON
    /// object. Extraction failures never become request failures.
    #[instrument(level = "debug", skip(self, image), fields(category = %category))]
    pub async fn extract(
        &self,
        category: Category,
        image: &ImagePayload,
    ) -> Option<FieldMap> {
        let prompt = prompt_for(category);
        let mut retries = 0;
        loop {
            match self.model.generate(prompt, image).await {
                Ok(text) => return parse_field_map(&text),
                Err(ModelError::Overloaded(err)) if retries < self.max_attempts - 1 => {
                    retries += 1;
                    let delay = backoff_delay(retries);
                    warn!(
                        attempt = retries,
                        max_attempts = self.max_attempts,
                        "Model overloaded, retrying in {:.1}s: {err}",
                        delay.as_secs_f64(),
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(ModelError::Overloaded(err)) => {
                    error!(
                        "Model still overloaded after {} attempts: {err:?}",
                        self.max_attempts
                    );
                    return None;
                }
                Err(ModelError::Other(err)) => {
                    error!("Model call failed: {err:?}");
                    return None;
                }
            }
        }
    }
}

/// Delay before re-attempt number `retries`: `2^retries` seconds plus up to
/// half a second of jitter, so callers backing off together spread out.
fn backoff_delay(retries: u32) -> Duration {
    let base_ms = 1000u64 << retries.min(16);
    let jitter_ms = rand::rng().random_range(0..500);
    Duration::from_millis(base_ms + jitter_ms)
}

/// Pull the first brace-delimited JSON object out of the model's free text.
///
/// The prompts ask for bare JSON, but models routinely wrap it in prose or
/// code fences, so we match from the first `{` to the last `}`.
fn parse_field_map(text: &str) -> Option<FieldMap> {
    let re = Regex::new(r"\{[\s\S]*\}").expect("built-in regex should be valid");
    let Some(found) = re.find(text) else {
        warn!(raw_text = %text, "No JSON object in model response");
        return None;
    };
    match serde_json::from_str::<Value>(found.as_str()) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            warn!(raw_text = %text, "Expected a JSON object from model, got: {other}");
            None
        }
        Err(err) => {
            warn!(raw_text = %text, "Could not parse JSON from model response: {err}");
            None
        }
    }
}
