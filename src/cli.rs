use std::path::PathBuf;

use clap::Parser;

/// Enrich Kodi anime NFO files with ratings, genres, themes, trailers and translations.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "anime-nfo-updater", version)]
pub struct Cli {
    /// Root folder holding the series directories
    #[arg(long, env = "ANIME_FOLDER")]
    pub folder: Option<PathBuf>,

    /// TOML config file (defaults to <config dir>/anime-nfo-updater/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Anthropic API key used for translation
    #[arg(long, env = "CLAUDE_API_KEY", hide_env_values = true)]
    pub claude_api_key: Option<String>,

    /// YouTube Data API key used for trailer fallback searches
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub youtube_api_key: Option<String>,

    /// Model used for translation
    #[arg(long, env = "CLAUDE_MODEL")]
    pub claude_model: Option<String>,

    /// Language plots and titles are translated into
    #[arg(long, env = "TARGET_LANGUAGE")]
    pub target_language: Option<String>,

    /// Only translate descriptions, leave rating, genres and tags alone
    #[arg(long, env = "TRANSLATE_ONLY")]
    pub translate_only: bool,

    /// Only update metadata, never translate
    #[arg(long, env = "RATING_ONLY")]
    pub rating_only: bool,

    /// Skip translation of descriptions
    #[arg(long, env = "SKIP_TRANSLATE")]
    pub skip_translate: bool,

    /// Overwrite existing ratings, trailers and episode mpaa values
    #[arg(long, env = "FORCE_UPDATE")]
    pub force_update: bool,

    /// Copy the series mpaa rating to every episode file
    #[arg(long, env = "SYNC_MPAA")]
    pub sync_mpaa: bool,

    /// Remove the mpaa rating from every episode file
    #[arg(long, env = "REMOVE_MPAA")]
    pub remove_mpaa: bool,

    /// Translate episode titles and plots as well
    #[arg(long, env = "TRANSLATE_EPISODES")]
    pub translate_episodes: bool,

    /// Only process episode files, skip tvshow.nfo
    #[arg(long, env = "EPISODES_ONLY")]
    pub episodes_only: bool,

    /// Pause between series folders
    #[arg(long, env = "BATCH_MODE")]
    pub batch_mode: bool,

    /// Seconds to pause between folders in batch mode
    #[arg(long, env = "BATCH_DELAY", value_name = "SECONDS")]
    pub batch_delay: Option<f64>,

    /// Maximum number of series folders to process (0 = all)
    #[arg(long, env = "MAX_FOLDERS")]
    pub max_folders: Option<usize>,

    /// Number of series folders to skip first
    #[arg(long, env = "FOLDER_OFFSET")]
    pub folder_offset: Option<usize>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
