//! Run configuration: the optional TOML file model, layering with CLI and
//! environment values, and validation into a [`RunPolicy`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::cli::Cli;
use crate::credentials::{SecretStore, CLAUDE_ACCOUNT, YOUTUBE_ACCOUNT};
use crate::merge::MergePolicy;

pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-haiku-latest";
pub const DEFAULT_TARGET_LANGUAGE: &str = "French";
pub const DEFAULT_BATCH_DELAY_SECS: f64 = 1.0;
const CONFIG_DIR_NAME: &str = "anime-nfo-updater";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no folder given; use --folder or set ANIME_FOLDER")]
    MissingFolder,
    #[error("folder {} does not exist", .0.display())]
    FolderNotFound(PathBuf),
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("--sync-mpaa and --remove-mpaa cannot be used together")]
    ConflictingMpaaModes,
    #[error("{mode} needs a Claude API key; use --claude-api-key, CLAUDE_API_KEY or the system keyring")]
    MissingTranslationKey { mode: &'static str },
    #[error("batch delay must be a non-negative number of seconds, got {0}")]
    InvalidBatchDelay(f64),
    #[error("failed to read config file {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {}: {source}", path.display())]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub folder: Option<PathBuf>,
    pub claude_api_key: Option<String>,
    pub youtube_api_key: Option<String>,
    pub claude_model: Option<String>,
    pub target_language: Option<String>,
    pub translate_only: bool,
    pub rating_only: bool,
    pub skip_translate: bool,
    pub force_update: bool,
    pub sync_mpaa: bool,
    pub remove_mpaa: bool,
    pub translate_episodes: bool,
    pub episodes_only: bool,
    pub batch_mode: bool,
    pub batch_delay: Option<f64>,
    pub max_folders: Option<usize>,
    pub folder_offset: Option<usize>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Reads the config file. A missing file is only an error when the path was
/// given explicitly.
pub fn load_file_config(path: &Path, explicit: bool) -> Result<FileConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound && !explicit => {
            debug!("No config file at {}", path.display());
            return Ok(FileConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::ReadFile {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str::<FileConfig>(&content).map_err(|source| ConfigError::ParseFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Which pass runs over each unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    SyncMpaa,
    RemoveMpaa,
    Enrich,
}

/// Fully resolved policy the core runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPolicy {
    pub root: PathBuf,
    pub merge: MergePolicy,
    pub sync_mpaa: bool,
    pub remove_mpaa: bool,
    pub translate_episodes: bool,
    pub episodes_only: bool,
    pub batch_mode: bool,
    pub batch_delay: Duration,
    pub max_units: usize,
    pub unit_offset: usize,
    pub target_language: String,
}

impl RunPolicy {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            merge: MergePolicy::default(),
            sync_mpaa: false,
            remove_mpaa: false,
            translate_episodes: false,
            episodes_only: false,
            batch_mode: false,
            batch_delay: Duration::from_secs_f64(DEFAULT_BATCH_DELAY_SECS),
            max_units: 0,
            unit_offset: 0,
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
        }
    }

    pub fn mode(&self) -> RunMode {
        if self.sync_mpaa {
            RunMode::SyncMpaa
        } else if self.remove_mpaa {
            RunMode::RemoveMpaa
        } else {
            RunMode::Enrich
        }
    }

    /// No mode flag given at all. `batch_mode` counts as one.
    pub fn is_default_mode(&self) -> bool {
        !(self.batch_mode
            || self.merge.translate_only
            || self.merge.rating_only
            || self.merge.skip_translate
            || self.sync_mpaa
            || self.remove_mpaa
            || self.translate_episodes
            || self.episodes_only)
    }

    pub fn enrich_series(&self) -> bool {
        !self.episodes_only
    }

    pub fn process_episodes(&self) -> bool {
        self.translate_episodes || self.episodes_only || self.is_default_mode()
    }

    pub fn inherit_episode_mpaa(&self) -> bool {
        self.is_default_mode()
    }

    pub fn translate_episode_text(&self) -> bool {
        self.process_episodes() && self.merge.translation_in_scope()
    }

    /// Name of the explicitly requested mode that cannot run without a translator.
    fn explicit_translation_mode(&self) -> Option<&'static str> {
        if self.merge.translate_only {
            Some("--translate-only")
        } else if self.translate_episodes {
            Some("--translate-episodes")
        } else if self.episodes_only {
            Some("--episodes-only")
        } else {
            None
        }
    }
}

/// API keys and the model name. Kept apart from [`RunPolicy`] so the policy
/// can be logged freely.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub claude_api_key: Option<String>,
    pub youtube_api_key: Option<String>,
    pub claude_model: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("claude_api_key", &self.claude_api_key.as_ref().map(|_| "<set>"))
            .field("youtube_api_key", &self.youtube_api_key.as_ref().map(|_| "<set>"))
            .field("claude_model", &self.claude_model)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn secret_from_store(store: &dyn SecretStore, account: &str) -> Option<String> {
    match store.lookup(account) {
        Ok(secret) => secret,
        Err(err) => {
            warn!("{err}");
            None
        }
    }
}

/// Layers CLI/environment over the file config, fills missing keys from the
/// secret store and validates the result.
pub fn resolve(
    cli: &Cli,
    file: FileConfig,
    secrets: &dyn SecretStore,
) -> Result<(RunPolicy, Credentials), ConfigError> {
    let root = cli
        .folder
        .clone()
        .or(file.folder)
        .filter(|folder| !folder.as_os_str().is_empty())
        .ok_or(ConfigError::MissingFolder)?;
    if !root.exists() {
        return Err(ConfigError::FolderNotFound(root));
    }
    if !root.is_dir() {
        return Err(ConfigError::NotADirectory(root));
    }

    let batch_delay_secs = cli
        .batch_delay
        .or(file.batch_delay)
        .unwrap_or(DEFAULT_BATCH_DELAY_SECS);
    if !batch_delay_secs.is_finite() || batch_delay_secs < 0.0 {
        return Err(ConfigError::InvalidBatchDelay(batch_delay_secs));
    }

    let policy = RunPolicy {
        merge: MergePolicy {
            force_update: cli.force_update || file.force_update,
            rating_only: cli.rating_only || file.rating_only,
            translate_only: cli.translate_only || file.translate_only,
            skip_translate: cli.skip_translate || file.skip_translate,
        },
        sync_mpaa: cli.sync_mpaa || file.sync_mpaa,
        remove_mpaa: cli.remove_mpaa || file.remove_mpaa,
        translate_episodes: cli.translate_episodes || file.translate_episodes,
        episodes_only: cli.episodes_only || file.episodes_only,
        batch_mode: cli.batch_mode || file.batch_mode,
        batch_delay: Duration::from_secs_f64(batch_delay_secs),
        max_units: cli.max_folders.or(file.max_folders).unwrap_or(0),
        unit_offset: cli.folder_offset.or(file.folder_offset).unwrap_or(0),
        target_language: non_blank(cli.target_language.clone().or(file.target_language))
            .unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.to_string()),
        ..RunPolicy::new(root)
    };
    if policy.sync_mpaa && policy.remove_mpaa {
        return Err(ConfigError::ConflictingMpaaModes);
    }

    let mpaa_mode = policy.mode() != RunMode::Enrich;
    let translation_wanted = !mpaa_mode && policy.merge.translation_in_scope();
    let claude_api_key = non_blank(cli.claude_api_key.clone().or(file.claude_api_key))
        .or_else(|| translation_wanted.then(|| secret_from_store(secrets, CLAUDE_ACCOUNT)).flatten());
    let youtube_api_key = non_blank(cli.youtube_api_key.clone().or(file.youtube_api_key))
        .or_else(|| (!mpaa_mode).then(|| secret_from_store(secrets, YOUTUBE_ACCOUNT)).flatten());

    if translation_wanted && claude_api_key.is_none() {
        if let Some(mode) = policy.explicit_translation_mode() {
            return Err(ConfigError::MissingTranslationKey { mode });
        }
        warn!("No Claude API key configured, translation is disabled");
    }
    if !mpaa_mode && youtube_api_key.is_none() {
        debug!("No YouTube API key configured, trailer search fallback is disabled");
    }

    let credentials = Credentials {
        claude_api_key,
        youtube_api_key,
        claude_model: non_blank(cli.claude_model.clone().or(file.claude_model))
            .unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string()),
    };
    Ok((policy, credentials))
}
