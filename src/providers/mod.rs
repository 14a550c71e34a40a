//! External provider abstractions and concrete HTTP clients.

pub mod claude;
pub mod http;
pub mod jikan;
pub mod youtube;

use thiserror::Error;

/// How a candidate was picked out of the provider's result list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchConfidence {
    /// Case-insensitive exact title match.
    Exact,
    /// Best lexical similarity above the acceptance threshold.
    Similar(f64),
    /// Nothing matched well; the first result was taken.
    LowConfidence,
}

/// Trailer reference exactly as the metadata provider returned it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderTrailer {
    pub youtube_id: Option<String>,
    pub url: Option<String>,
    pub embed_url: Option<String>,
}

/// One search result selected for merging into a series record.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch {
    pub external_title: String,
    pub score: Option<f64>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub trailer: ProviderTrailer,
    pub confidence: MatchConfidence,
}

/// Result of a title search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(CandidateMatch),
    NotFound,
}

/// Provider failures. `NotFound` is not an error and lives in [`SearchOutcome`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed transiently after {attempts} attempt(s): {message}")]
    Transient {
        provider: &'static str,
        attempts: u32,
        message: String,
    },
    #[error("{provider} returned an unusable response: {message}")]
    Fatal {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn fatal(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Fatal {
            provider,
            message: message.into(),
        }
    }
}

/// Primary metadata search provider.
pub trait MetadataSearch {
    fn search(&self, title: &str) -> Result<SearchOutcome, ProviderError>;
    fn calls_made(&self) -> u64;
}

/// One video returned by the video-search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCandidate {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    pub view_count: u64,
}

/// Video-search provider used as the trailer fallback.
pub trait VideoSearch {
    fn search_videos(&self, query: &str) -> Result<Vec<VideoCandidate>, ProviderError>;
    fn calls_made(&self) -> u64;
}

/// Opaque text-to-text translation service.
pub trait Translator {
    fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError>;
    fn calls_made(&self) -> u64;
}
