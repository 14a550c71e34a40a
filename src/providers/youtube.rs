//! YouTube Data API v3 client used for trailer fallback searches.

use std::cell::Cell;
use std::collections::HashMap;
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::providers::http::{self, RetryPolicy};
use crate::providers::{ProviderError, VideoCandidate, VideoSearch};
use crate::rate_limiter::Clock;

const PROVIDER: &str = "YouTube";
const YOUTUBE_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const MAX_RESULTS: &str = "5";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId", default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    #[serde(default)]
    title: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    #[serde(default)]
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
struct VideoStatistics {
    #[serde(rename = "viewCount", default)]
    view_count: Option<String>,
}

fn html_unescape(value: &str) -> String {
    quick_xml::escape::unescape(value)
        .map(|unescaped| unescaped.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Search hits in provider order, without view counts yet.
fn decode_search_items(body: &str) -> Result<Vec<VideoCandidate>, ProviderError> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::fatal(PROVIDER, format!("search schema: {error}")))?;
    Ok(response
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id.filter(|id| !id.trim().is_empty())?;
            Some(VideoCandidate {
                video_id,
                title: html_unescape(&item.snippet.title),
                channel_title: html_unescape(&item.snippet.channel_title),
                view_count: 0,
            })
        })
        .collect())
}

fn decode_view_counts(body: &str) -> Result<HashMap<String, u64>, ProviderError> {
    let response: VideosResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::fatal(PROVIDER, format!("videos schema: {error}")))?;
    Ok(response
        .items
        .into_iter()
        .map(|item| {
            let views = item
                .statistics
                .and_then(|statistics| statistics.view_count)
                .and_then(|count| count.parse::<u64>().ok())
                .unwrap_or(0);
            (item.id, views)
        })
        .collect())
}

/// Blocking YouTube client. Only constructed when an API key is configured.
pub struct YouTubeClient<'a> {
    http_client: ureq::Agent,
    api_key: String,
    clock: &'a dyn Clock,
    retry: RetryPolicy,
    calls: Cell<u64>,
}

impl<'a> YouTubeClient<'a> {
    pub fn new(api_key: impl Into<String>, clock: &'a dyn Clock) -> Self {
        Self {
            http_client: http::build_agent(Duration::from_secs(10)),
            api_key: api_key.into(),
            clock,
            retry: RetryPolicy::default(),
            calls: Cell::new(0),
        }
    }

    fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, ProviderError> {
        let mut all_params = params.to_vec();
        all_params.push(("key", self.api_key.as_str()));
        let url = format!(
            "{YOUTUBE_API_BASE_URL}/{endpoint}?{}",
            http::query_string(&all_params)
        );
        http::execute_with_backoff(PROVIDER, endpoint, &self.retry, self.clock, || {
            self.calls.set(self.calls.get() + 1);
            http::read_body(
                self.http_client
                    .get(&url)
                    .set("Accept", "application/json")
                    .call(),
            )
        })
    }
}

impl VideoSearch for YouTubeClient<'_> {
    fn search_videos(&self, query: &str) -> Result<Vec<VideoCandidate>, ProviderError> {
        debug!("YouTube: searching '{query}'");
        let body = self.get(
            "search",
            &[
                ("part", "snippet"),
                ("maxResults", MAX_RESULTS),
                ("q", query),
                ("type", "video"),
                ("order", "viewCount"),
            ],
        )?;
        let mut candidates = decode_search_items(&body)?;
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let ids = candidates
            .iter()
            .map(|candidate| candidate.video_id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let body = self.get("videos", &[("part", "statistics"), ("id", ids.as_str())])?;
        let view_counts = decode_view_counts(&body)?;
        for candidate in &mut candidates {
            candidate.view_count = view_counts
                .get(&candidate.video_id)
                .copied()
                .unwrap_or(0);
        }
        Ok(candidates)
    }

    fn calls_made(&self) -> u64 {
        self.calls.get()
    }
}
