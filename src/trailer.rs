//! Trailer lookup: reuse the metadata provider's reference when it is usable,
//! otherwise fall back to a ranked video search.

use std::cmp::Reverse;
use std::sync::LazyLock;

use log::{debug, info, warn};
use regex::Regex;

use crate::providers::{ProviderTrailer, VideoCandidate, VideoSearch};
use crate::rate_limiter::RateLimiter;
use crate::text::normalize_text;

pub const PLUGIN_URI_PREFIX: &str = "plugin://plugin.video.youtube/play/?video_id=";
/// Candidates below this view count are never picked.
pub const MIN_TRAILER_VIEWS: u64 = 1_000;

const TRAILER_KEYWORDS: &[&str] = &["trailer", "pv", "teaser", "promo", "cm"];
const TRAILER_KEYWORDS_CJK: &[&str] = &["予告", "番宣"];

/// Channels whose uploads win a view-count tie.
const AUTHORITY_CHANNELS: &[&str] = &[
    "official",
    "crunchyroll",
    "funimation",
    "aniplex",
    "toho animation",
    "kadokawa",
    "bandai namco",
    "pony canyon",
    "avex pictures",
    "muse asia",
    "ani one",
    "netflix",
    "hidive",
    "sentai",
    "viz media",
    "mappa",
    "ufotable",
    "kyoto animation",
    "king amusement",
    "sony music",
];

static YOUTUBE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"));
static YOUTUBE_ID_IN_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube(?:-nocookie)?\.com/(?:embed/|watch\?(?:.*&)?v=|shorts/)|youtu\.be/|[?&]video_id=)([A-Za-z0-9_-]{11})",
    )
    .expect("valid regex")
});

pub fn plugin_uri(video_id: &str) -> String {
    format!("{PLUGIN_URI_PREFIX}{video_id}")
}

/// Video id out of a watch, embed, short or Kodi plugin URI.
pub fn youtube_id_from_uri(uri: &str) -> Option<String> {
    YOUTUBE_ID_IN_URI
        .captures(uri.trim())
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
}

/// First well-formed id among `youtube_id`, `embed_url` and `url`.
pub fn extract_youtube_id(trailer: &ProviderTrailer) -> Option<String> {
    let direct = trailer
        .youtube_id
        .as_deref()
        .map(str::trim)
        .filter(|id| YOUTUBE_ID.is_match(id))
        .map(str::to_string);
    direct
        .or_else(|| trailer.embed_url.as_deref().and_then(youtube_id_from_uri))
        .or_else(|| trailer.url.as_deref().and_then(youtube_id_from_uri))
}

fn is_trailer_tagged(title: &str) -> bool {
    if TRAILER_KEYWORDS_CJK
        .iter()
        .any(|keyword| title.contains(keyword))
    {
        return true;
    }
    let lowered = title.to_lowercase();
    lowered.split(|ch: char| !ch.is_ascii_alphanumeric()).any(|token| {
        TRAILER_KEYWORDS.iter().any(|keyword| {
            token
                .strip_prefix(keyword)
                .is_some_and(|rest| rest.chars().all(|ch| ch.is_ascii_digit()))
                || token.strip_suffix('s') == Some(*keyword)
        })
    })
}

fn channel_authority(channel_title: &str) -> u8 {
    let normalized = normalize_text(channel_title);
    u8::from(
        AUTHORITY_CHANNELS
            .iter()
            .any(|channel| normalized.contains(channel)),
    )
}

/// Trailer-tagged candidates at or above the view floor, best first.
pub fn rank_candidates(candidates: Vec<VideoCandidate>) -> Vec<VideoCandidate> {
    let mut eligible = candidates
        .into_iter()
        .filter(|candidate| candidate.view_count >= MIN_TRAILER_VIEWS)
        .filter(|candidate| is_trailer_tagged(&candidate.title))
        .collect::<Vec<_>>();
    eligible.sort_by_key(|candidate| {
        (
            Reverse(candidate.view_count),
            Reverse(channel_authority(&candidate.channel_title)),
        )
    });
    eligible
}

pub struct TrailerResolver<'a> {
    video_search: Option<&'a dyn VideoSearch>,
    limiter: &'a RateLimiter<'a>,
}

impl<'a> TrailerResolver<'a> {
    pub fn new(video_search: Option<&'a dyn VideoSearch>, limiter: &'a RateLimiter<'a>) -> Self {
        Self {
            video_search,
            limiter,
        }
    }

    pub fn search_enabled(&self) -> bool {
        self.video_search.is_some()
    }

    pub fn calls_made(&self) -> u64 {
        self.video_search.map_or(0, |search| search.calls_made())
    }

    /// Plugin URI for `title`, or `None` when nothing usable was found.
    /// Video search failures are logged and never escalate.
    pub fn resolve_trailer(&self, title: &str, existing: &ProviderTrailer) -> Option<String> {
        if let Some(video_id) = extract_youtube_id(existing) {
            debug!("Trailer[{title}]: using provider trailer {video_id}");
            return Some(plugin_uri(&video_id));
        }

        let Some(video_search) = self.video_search else {
            debug!("Trailer[{title}]: no provider trailer and video search is disabled");
            return None;
        };

        info!("Trailer[{title}]: no provider trailer, searching videos");
        self.limiter.acquire();
        let candidates = match video_search.search_videos(&format!("{title} official trailer anime")) {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!("Trailer[{title}]: video search failed: {error}");
                return None;
            }
        };

        let found = candidates.len();
        match rank_candidates(candidates).into_iter().next() {
            Some(best) => {
                info!(
                    "Trailer[{title}]: picked '{}' from {} ({} views)",
                    best.title, best.channel_title, best.view_count
                );
                Some(plugin_uri(&best.video_id))
            }
            None => {
                info!("Trailer[{title}]: none of {found} video(s) qualified");
                None
            }
        }
    }
}
