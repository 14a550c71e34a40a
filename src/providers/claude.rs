//! Anthropic Messages API client used as the translation collaborator.

use std::cell::Cell;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock as _, DefaultClock};
use governor::state::NotKeyed;
use governor::{Quota, RateLimiter};
use log::debug;
use serde::Deserialize;

use crate::providers::http::{self, RetryPolicy};
use crate::providers::{ProviderError, Translator};
use crate::rate_limiter::Clock;

const PROVIDER: &str = "Claude";
const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;
const REQUESTS_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(50) {
    Some(value) => value,
    None => panic!("requests per minute must be non-zero"),
};
const REQUEST_BURST: NonZeroU32 = match NonZeroU32::new(2) {
    Some(value) => value,
    None => panic!("burst must be non-zero"),
};

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn decode_translation(body: &str) -> Result<String, ProviderError> {
    let response: MessagesResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::fatal(PROVIDER, format!("unexpected schema: {error}")))?;
    let text = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::fatal(PROVIDER, "response contained no text"));
    }
    Ok(trimmed.to_string())
}

fn translation_prompt(text: &str, target_language: &str) -> String {
    format!(
        "Translate the following text from English or Japanese to {target_language}.\n\n\
         IMPORTANT: Respond ONLY with the direct translation without commentary, explanation, or notes. \
         Do not include phrases like 'Here is the translation'. Keep line breaks and any markup or \
         formatting markers exactly where they are.\n\n\
         If the text is already in {target_language}, simply return it unchanged.\n\n\
         Here's the text to translate:\n{text}"
    )
}

/// Translation client with its own request pacing.
pub struct ClaudeTranslator<'a> {
    http_client: ureq::Agent,
    api_key: String,
    model: String,
    limiter: RateLimiter<NotKeyed, governor::state::InMemoryState, DefaultClock>,
    clock: &'a dyn Clock,
    retry: RetryPolicy,
    calls: Cell<u64>,
}

impl<'a> ClaudeTranslator<'a> {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, clock: &'a dyn Clock) -> Self {
        Self {
            http_client: http::build_agent(Duration::from_secs(60)),
            api_key: api_key.into(),
            model: model.into(),
            limiter: RateLimiter::direct(
                Quota::per_minute(REQUESTS_PER_MINUTE).allow_burst(REQUEST_BURST),
            ),
            clock,
            retry: RetryPolicy::default(),
            calls: Cell::new(0),
        }
    }

    fn wait_for_slot(&self) {
        while let Err(not_until) = self.limiter.check() {
            let wait = not_until.wait_time_from(self.limiter.clock().now());
            debug!("Claude: pacing translation request, waiting {wait:?}");
            self.clock.sleep(wait.max(Duration::from_millis(10)));
        }
    }
}

impl Translator for ClaudeTranslator<'_> {
    fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError> {
        let payload = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": translation_prompt(text, target_language),
            }],
        });
        let body = http::execute_with_backoff(PROVIDER, "translate", &self.retry, self.clock, || {
            self.wait_for_slot();
            self.calls.set(self.calls.get() + 1);
            http::read_body(
                self.http_client
                    .post(MESSAGES_URL)
                    .set("x-api-key", &self.api_key)
                    .set("anthropic-version", ANTHROPIC_VERSION)
                    .set("content-type", "application/json")
                    .send_json(payload.clone()),
            )
        })?;
        decode_translation(&body)
    }

    fn calls_made(&self) -> u64 {
        self.calls.get()
    }
}
