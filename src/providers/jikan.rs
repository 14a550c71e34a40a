//! Jikan (MyAnimeList mirror) search client.

use std::cell::Cell;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::providers::http::{self, RetryPolicy};
use crate::providers::{
    CandidateMatch, MatchConfidence, MetadataSearch, ProviderError, ProviderTrailer,
    SearchOutcome,
};
use crate::rate_limiter::{Clock, RateLimiter};
use crate::text::{clean_title_for_api, collapse_whitespace, normalize_text};

const PROVIDER: &str = "Jikan";
pub const JIKAN_BASE_URL: &str = "https://api.jikan.moe/v4";
const SEARCH_RESULT_LIMIT: &str = "5";
/// Minimum normalized Levenshtein similarity for a non-exact match.
pub const MIN_TITLE_SIMILARITY: f64 = 0.6;

#[derive(Debug, Clone, Deserialize)]
struct JikanSearchResponse {
    data: Vec<JikanAnime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JikanAnime {
    pub title: String,
    #[serde(default)]
    pub title_english: Option<String>,
    #[serde(default)]
    pub title_japanese: Option<String>,
    #[serde(default)]
    pub titles: Option<Vec<JikanTitle>>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub genres: Option<Vec<JikanNamed>>,
    #[serde(default)]
    pub themes: Option<Vec<JikanNamed>>,
    #[serde(default)]
    pub trailer: Option<JikanTrailer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JikanTitle {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JikanNamed {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JikanTrailer {
    #[serde(default)]
    pub youtube_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
}

/// Decoded search payload.
#[derive(Debug, Clone)]
pub enum JikanPayload {
    Success(Vec<JikanAnime>),
    NotFound,
    Malformed(String),
}

pub fn decode_search_payload(body: &str) -> JikanPayload {
    let parsed: Value = match serde_json::from_str(body.trim()) {
        Ok(parsed) => parsed,
        Err(error) => {
            let snippet: String = body.trim().chars().take(120).collect();
            return JikanPayload::Malformed(format!("invalid JSON ({error}); prefix={snippet}"));
        }
    };
    if parsed.get("data").is_none() {
        let message = parsed
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("response has no `data` field");
        return JikanPayload::Malformed(message.to_string());
    }
    match serde_json::from_value::<JikanSearchResponse>(parsed) {
        Ok(response) if response.data.is_empty() => JikanPayload::NotFound,
        Ok(response) => JikanPayload::Success(response.data),
        Err(error) => JikanPayload::Malformed(format!("unexpected schema: {error}")),
    }
}

impl JikanAnime {
    fn title_variants(&self) -> Vec<&str> {
        let mut variants = vec![self.title.as_str()];
        variants.extend(self.title_english.as_deref());
        variants.extend(self.title_japanese.as_deref());
        if let Some(titles) = &self.titles {
            variants.extend(titles.iter().map(|entry| entry.title.as_str()));
        }
        variants.retain(|variant| !variant.trim().is_empty());
        variants
    }

    fn is_exact_match(&self, target: &str) -> bool {
        let wanted = collapse_whitespace(target).to_lowercase();
        self.title_variants()
            .iter()
            .any(|variant| collapse_whitespace(variant).to_lowercase() == wanted)
    }

    fn best_similarity(&self, target: &str) -> f64 {
        let wanted = normalize_text(target);
        self.title_variants()
            .iter()
            .map(|variant| strsim::normalized_levenshtein(&wanted, &normalize_text(variant)))
            .fold(0.0, f64::max)
    }

    fn into_candidate(self, confidence: MatchConfidence) -> CandidateMatch {
        let trailer = self
            .trailer
            .map(|trailer| ProviderTrailer {
                youtube_id: non_empty(trailer.youtube_id),
                url: non_empty(trailer.url),
                embed_url: non_empty(trailer.embed_url),
            })
            .unwrap_or_default();
        CandidateMatch {
            external_title: self.title,
            score: self.score.filter(|score| *score > 0.0),
            genres: unique_names(self.genres.unwrap_or_default()),
            tags: unique_names(self.themes.unwrap_or_default()),
            trailer,
            confidence,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn unique_names(entries: Vec<JikanNamed>) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(entries.len());
    for name in entries.into_iter().filter_map(|entry| non_empty(entry.name)) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Picks the result that best matches `title`: an exact title wins, then the
/// most similar title above [`MIN_TITLE_SIMILARITY`], then the first result.
pub fn select_candidate(title: &str, results: Vec<JikanAnime>) -> Option<CandidateMatch> {
    if let Some(index) = results.iter().position(|anime| anime.is_exact_match(title)) {
        let anime = results.into_iter().nth(index)?;
        return Some(anime.into_candidate(MatchConfidence::Exact));
    }

    let best = results
        .iter()
        .enumerate()
        .map(|(index, anime)| (index, anime.best_similarity(title)))
        .filter(|(_, similarity)| *similarity >= MIN_TITLE_SIMILARITY)
        .fold(None, |best: Option<(usize, f64)>, current| match best {
            Some(existing) if existing.1 >= current.1 => Some(existing),
            _ => Some(current),
        });
    if let Some((index, similarity)) = best {
        let anime = results.into_iter().nth(index)?;
        return Some(anime.into_candidate(MatchConfidence::Similar(similarity)));
    }

    let anime = results.into_iter().next()?;
    Some(anime.into_candidate(MatchConfidence::LowConfidence))
}

/// Blocking Jikan client sharing the run-wide rate limiter.
pub struct JikanClient<'a> {
    http_client: ureq::Agent,
    base_url: String,
    limiter: &'a RateLimiter<'a>,
    clock: &'a dyn Clock,
    retry: RetryPolicy,
    calls: Cell<u64>,
}

impl<'a> JikanClient<'a> {
    pub fn new(limiter: &'a RateLimiter<'a>, clock: &'a dyn Clock) -> Self {
        Self {
            http_client: http::build_agent(Duration::from_secs(15)),
            base_url: JIKAN_BASE_URL.to_string(),
            limiter,
            clock,
            retry: RetryPolicy::default(),
            calls: Cell::new(0),
        }
    }

    fn search_url(&self, title: &str) -> String {
        let cleaned = clean_title_for_api(title);
        format!(
            "{}/anime?{}",
            self.base_url.trim_end_matches('/'),
            http::query_string(&[("q", cleaned.as_str()), ("limit", SEARCH_RESULT_LIMIT)])
        )
    }
}

impl MetadataSearch for JikanClient<'_> {
    fn search(&self, title: &str) -> Result<SearchOutcome, ProviderError> {
        let url = self.search_url(title);
        debug!("Jikan: searching '{title}' via {url}");
        let body = http::execute_with_backoff(PROVIDER, "search", &self.retry, self.clock, || {
            self.limiter.acquire();
            self.calls.set(self.calls.get() + 1);
            http::read_body(
                self.http_client
                    .get(&url)
                    .set("Accept", "application/json")
                    .call(),
            )
        })?;

        match decode_search_payload(&body) {
            JikanPayload::Success(results) => {
                let result_count = results.len();
                let Some(candidate) = select_candidate(title, results) else {
                    return Ok(SearchOutcome::NotFound);
                };
                match candidate.confidence {
                    MatchConfidence::Exact => {
                        info!("Jikan: exact match for '{title}'");
                    }
                    MatchConfidence::Similar(similarity) => info!(
                        "Jikan: matched '{title}' to '{}' (similarity {similarity:.2})",
                        candidate.external_title
                    ),
                    MatchConfidence::LowConfidence => warn!(
                        "Jikan: no close match for '{title}' among {result_count} result(s), using low-confidence first result '{}'",
                        candidate.external_title
                    ),
                }
                Ok(SearchOutcome::Found(candidate))
            }
            JikanPayload::NotFound => Ok(SearchOutcome::NotFound),
            JikanPayload::Malformed(message) => Err(ProviderError::fatal(PROVIDER, message)),
        }
    }

    fn calls_made(&self) -> u64 {
        self.calls.get()
    }
}
