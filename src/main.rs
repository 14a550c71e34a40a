mod cli;
mod config;
mod credentials;
mod discovery;
mod episodes;
mod merge;
mod mpaa;
mod nfo;
mod orchestrator;
mod providers;
mod rate_limiter;
mod stats;
mod text;
mod trailer;
mod translation;

use clap::Parser;
use log::{debug, error, info};

use cli::Cli;
use config::{default_config_path, load_file_config, resolve, FileConfig};
use credentials::KeyringStore;
use orchestrator::Orchestrator;
use providers::claude::ClaudeTranslator;
use providers::jikan::JikanClient;
use providers::youtube::YouTubeClient;
use providers::{Translator, VideoSearch};
use rate_limiter::{RateLimiter, SystemClock};
use trailer::TrailerResolver;
use translation::TranslationStep;

fn init_logging(verbose: bool) {
    let mut clog = colog::default_builder();
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    clog.filter(None, level);
    clog.init();
}

fn file_config(cli: &Cli) -> Result<FileConfig, config::ConfigError> {
    match (&cli.config, default_config_path()) {
        (Some(path), _) => load_file_config(path, true),
        (None, Some(path)) => load_file_config(&path, false),
        (None, None) => Ok(FileConfig::default()),
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let file = file_config(&cli)?;
    let (policy, credentials) = resolve(&cli, file, &KeyringStore)?;
    debug!("Resolved {policy:?} with {credentials:?}");

    let clock = SystemClock;
    let limiter = RateLimiter::jikan(&clock);
    let jikan = JikanClient::new(&limiter, &clock);
    let youtube = credentials
        .youtube_api_key
        .as_deref()
        .map(|key| YouTubeClient::new(key, &clock));
    let claude = credentials
        .claude_api_key
        .as_deref()
        .map(|key| ClaudeTranslator::new(key, credentials.claude_model.as_str(), &clock));

    let trailers = TrailerResolver::new(youtube.as_ref().map(|c| c as &dyn VideoSearch), &limiter);
    let translation = TranslationStep::new(
        claude.as_ref().map(|c| c as &dyn Translator),
        policy.target_language.as_str(),
    );
    info!(
        "Starting in {} ({:?} mode, translation {}, trailer search {})",
        policy.root.display(),
        policy.mode(),
        if translation.enabled() {
            format!("to {}", translation.target_language())
        } else {
            "off".to_string()
        },
        if trailers.search_enabled() { "on" } else { "off" },
    );

    let stats = Orchestrator::new(&policy, &jikan, &trailers, &translation, &clock).run();
    stats.log_summary();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("failed to load .env: {err}");
        }
    }
    let cli = Cli::parse();
    init_logging(cli.verbose);

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("panic: {panic_info}");
    }));

    run(cli).inspect_err(|err| error!("{err}"))
}
