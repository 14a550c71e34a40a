//! Walks the series units and drives each one through the pipeline.
//!
//! A unit moves `Loaded -> Enriched -> Saved`. Any error stops that unit only;
//! it is logged with its stage, counted, and the run moves on to the next unit.

use std::fmt;
use std::path::Path;

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::config::{RunMode, RunPolicy};
use crate::discovery::{collect_episode_files, collect_series_units, select_units};
use crate::episodes::EpisodeProcessor;
use crate::merge::{merge, FetchedMetadata};
use crate::mpaa;
use crate::nfo::{DocumentError, NfoDocument, SeriesRecord, SERIES_FILE_NAME, SERIES_ROOT};
use crate::providers::{MetadataSearch, ProviderError, SearchOutcome};
use crate::rate_limiter::Clock;
use crate::stats::RunStatistics;
use crate::trailer::TrailerResolver;
use crate::translation::TranslationStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStage {
    Loaded,
    Enriched,
    Saved,
}

impl fmt::Display for UnitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitStage::Loaded => "loaded",
            UnitStage::Enriched => "enriched",
            UnitStage::Saved => "saved",
        };
        f.write_str(name)
    }
}

/// Unit failure, tagged with the stage the unit was moving into.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("{source}")]
    Document {
        stage: UnitStage,
        #[source]
        source: DocumentError,
    },
    #[error("{source}")]
    Provider {
        stage: UnitStage,
        #[source]
        source: ProviderError,
    },
    #[error("unexpected root element <{root}> in series record")]
    UnexpectedRoot { stage: UnitStage, root: String },
}

impl UnitError {
    pub fn stage(&self) -> UnitStage {
        match self {
            UnitError::Document { stage, .. }
            | UnitError::Provider { stage, .. }
            | UnitError::UnexpectedRoot { stage, .. } => *stage,
        }
    }

    fn document(stage: UnitStage) -> impl FnOnce(DocumentError) -> Self {
        move |source| UnitError::Document { stage, source }
    }
}

/// How a unit that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Updated,
    Unchanged,
    Skipped(String),
}

pub struct Orchestrator<'a> {
    policy: &'a RunPolicy,
    search: &'a dyn MetadataSearch,
    trailers: &'a TrailerResolver<'a>,
    translation: &'a TranslationStep<'a>,
    clock: &'a dyn Clock,
    stats: RunStatistics,
}

fn unit_label(unit: &Path) -> String {
    unit.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| unit.display().to_string())
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        policy: &'a RunPolicy,
        search: &'a dyn MetadataSearch,
        trailers: &'a TrailerResolver<'a>,
        translation: &'a TranslationStep<'a>,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            policy,
            search,
            trailers,
            translation,
            clock,
            stats: RunStatistics::default(),
        }
    }

    /// Processes every selected unit and returns the run statistics.
    pub fn run(mut self) -> RunStatistics {
        let all_units = collect_series_units(&self.policy.root);
        self.stats.units_found = all_units.len();
        let selection = select_units(all_units, self.policy.unit_offset, self.policy.max_units);
        self.stats.units_skipped_by_offset = selection.skipped_by_offset;
        self.stats.units_skipped_by_limit = selection.skipped_by_limit;
        info!(
            "Found {} series folder(s) under {}, processing {}",
            self.stats.units_found,
            self.policy.root.display(),
            selection.units.len()
        );

        for (index, unit) in selection.units.iter().enumerate() {
            if index > 0 {
                self.pause_between_units();
            }
            self.process_unit(unit);
        }

        self.stats.metadata_api_calls = self.search.calls_made();
        self.stats.video_api_calls = self.trailers.calls_made();
        self.stats.translation_api_calls = self.translation.calls_made();
        self.stats
    }

    fn pause_between_units(&mut self) {
        if !self.policy.batch_mode || self.policy.batch_delay.is_zero() {
            return;
        }
        info!("Batch mode: waiting {:?} before next folder", self.policy.batch_delay);
        self.clock.sleep(self.policy.batch_delay);
        self.stats.record_batch_pause(self.policy.batch_delay);
    }

    fn process_unit(&mut self, unit: &Path) {
        let label = unit_label(unit);
        info!("Unit[{label}]: processing {}", unit.display());
        match self.run_unit(unit, &label) {
            Ok(UnitOutcome::Updated) => {
                self.stats.processed += 1;
                self.stats.updated += 1;
                info!("Unit[{label}]: done, updated");
            }
            Ok(UnitOutcome::Unchanged) => {
                self.stats.processed += 1;
                info!("Unit[{label}]: done, no changes needed");
            }
            Ok(UnitOutcome::Skipped(reason)) => {
                self.stats.skipped += 1;
                warn!("Unit[{label}]: skipped, {reason}");
            }
            Err(err) => {
                self.stats.failed += 1;
                error!(
                    "Unit[{label}]: failed at stage '{}' ({}): {err}",
                    err.stage(),
                    unit.display()
                );
            }
        }
    }

    fn run_unit(&mut self, unit: &Path, label: &str) -> Result<UnitOutcome, UnitError> {
        let series_path = unit.join(SERIES_FILE_NAME);
        let document =
            NfoDocument::load(&series_path).map_err(UnitError::document(UnitStage::Loaded))?;
        if document.root_name() != SERIES_ROOT {
            return Err(UnitError::UnexpectedRoot {
                stage: UnitStage::Loaded,
                root: document.root_name().to_string(),
            });
        }

        match self.policy.mode() {
            RunMode::SyncMpaa => Ok(self.sync_mpaa(unit, label, &document)),
            RunMode::RemoveMpaa => Ok(self.remove_mpaa(unit, label)),
            RunMode::Enrich => self.enrich(unit, label, document),
        }
    }

    fn sync_mpaa(&mut self, unit: &Path, label: &str, document: &NfoDocument) -> UnitOutcome {
        let Some(rating) = SeriesRecord::from_document(document).mpaa else {
            return UnitOutcome::Skipped("series record has no mpaa".to_string());
        };
        let episodes = collect_episode_files(unit);
        let report = mpaa::sync_down(label, &rating, &episodes, self.policy.merge.force_update);
        self.stats.record_mpaa_sync(&report);
        if report.written > 0 {
            UnitOutcome::Updated
        } else {
            UnitOutcome::Unchanged
        }
    }

    fn remove_mpaa(&mut self, unit: &Path, label: &str) -> UnitOutcome {
        let episodes = collect_episode_files(unit);
        let report = mpaa::remove_all(label, &episodes);
        self.stats.record_mpaa_removal(&report);
        if report.written > 0 {
            UnitOutcome::Updated
        } else {
            UnitOutcome::Unchanged
        }
    }

    fn enrich(
        &mut self,
        unit: &Path,
        label: &str,
        mut document: NfoDocument,
    ) -> Result<UnitOutcome, UnitError> {
        let existing = SeriesRecord::from_document(&document);
        let mut series_written = false;
        let mut untitled = false;

        if self.policy.enrich_series() {
            match existing.title.clone() {
                Some(title) => {
                    series_written = self.enrich_series(label, &title, &existing, &mut document)?;
                }
                None => {
                    warn!("Unit[{label}]: series record has no title, leaving {SERIES_FILE_NAME} alone");
                    untitled = true;
                }
            }
        }

        let mut episodes_written = false;
        if self.policy.process_episodes() {
            let episodes = collect_episode_files(unit);
            let inherited = if self.policy.inherit_episode_mpaa() {
                existing.mpaa.as_deref()
            } else {
                None
            };
            let processor =
                EpisodeProcessor::new(self.translation, self.policy.translate_episode_text());
            let updated_before = self.stats.episodes_updated;
            processor.process_all(label, &episodes, inherited, &mut self.stats);
            episodes_written = self.stats.episodes_updated > updated_before;
        }

        Ok(if series_written || episodes_written {
            UnitOutcome::Updated
        } else if untitled {
            UnitOutcome::Skipped("series record has no title".to_string())
        } else {
            UnitOutcome::Unchanged
        })
    }

    /// Search, merge, translate and save the series record. Returns whether
    /// the file was written.
    fn enrich_series(
        &mut self,
        label: &str,
        title: &str,
        existing: &SeriesRecord,
        document: &mut NfoDocument,
    ) -> Result<bool, UnitError> {
        info!("Unit[{label}]: found series '{title}'");

        let merge_policy = &self.policy.merge;
        let fetched = if !merge_policy.translate_only || merge_policy.trailer_in_scope(existing) {
            self.fetch(label, title, existing)?
        } else {
            debug!("Unit[{label}]: no fetched field in scope, skipping search");
            None
        };
        let outcome = merge(existing, fetched.as_ref(), &self.policy.merge);
        let mut record = outcome.record;
        let mut changed = outcome.changed;
        if self.policy.merge.translation_in_scope() {
            changed.extend(self.translation.translate_series(label, &mut record));
        }

        let written = record
            .write_to(document, changed.iter().copied())
            .map_err(UnitError::document(UnitStage::Enriched))?;
        let saved = document
            .save()
            .map_err(UnitError::document(UnitStage::Saved))?;
        for field in &changed {
            self.stats.record_field_change(*field);
        }
        if saved {
            info!("Unit[{label}]: wrote {written} field(s) to {SERIES_FILE_NAME}");
        }
        Ok(saved)
    }

    fn fetch(
        &self,
        label: &str,
        title: &str,
        existing: &SeriesRecord,
    ) -> Result<Option<FetchedMetadata>, UnitError> {
        let outcome = self
            .search
            .search(title)
            .map_err(|source| UnitError::Provider {
                stage: UnitStage::Enriched,
                source,
            })?;
        match outcome {
            SearchOutcome::Found(candidate) => {
                let trailer = if self.policy.merge.trailer_in_scope(existing) {
                    self.trailers.resolve_trailer(title, &candidate.trailer)
                } else {
                    None
                };
                Ok(Some(FetchedMetadata::from_candidate(&candidate, trailer)))
            }
            SearchOutcome::NotFound => {
                warn!("Unit[{label}]: no results for '{title}'");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CandidateMatch, MatchConfidence, ProviderTrailer};
    use crate::rate_limiter::{ManualClock, RateLimiter};
    use crate::translation::fakes::FakeTranslator;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    enum Scripted {
        Found(f64, &'static [&'static str]),
        NotFound,
        Transient,
    }

    #[derive(Default)]
    struct FakeSearch {
        responses: HashMap<&'static str, Scripted>,
        calls: Cell<u64>,
    }

    impl MetadataSearch for FakeSearch {
        fn search(&self, title: &str) -> Result<SearchOutcome, ProviderError> {
            self.calls.set(self.calls.get() + 1);
            match self.responses.get(title) {
                Some(Scripted::Found(score, genres)) => Ok(SearchOutcome::Found(CandidateMatch {
                    external_title: title.to_string(),
                    score: Some(*score),
                    genres: genres.iter().map(|genre| genre.to_string()).collect(),
                    tags: Vec::new(),
                    trailer: ProviderTrailer::default(),
                    confidence: MatchConfidence::Exact,
                })),
                Some(Scripted::Transient) => Err(ProviderError::Transient {
                    provider: "Fake",
                    attempts: 3,
                    message: "503".to_string(),
                }),
                Some(Scripted::NotFound) | None => Ok(SearchOutcome::NotFound),
            }
        }

        fn calls_made(&self) -> u64 {
            self.calls.get()
        }
    }

    fn write_unit(root: &Path, name: &str, series: &str) -> PathBuf {
        let unit = root.join(name);
        fs::create_dir_all(&unit).expect("create unit");
        fs::write(unit.join(SERIES_FILE_NAME), series).expect("write series");
        unit
    }

    fn series(title: &str, extra: &str) -> String {
        format!("<tvshow>\n  <title>{title}</title>{extra}\n</tvshow>\n")
    }

    fn episode(unit: &Path, name: &str, body: &str) -> PathBuf {
        let path = unit.join(name);
        fs::write(&path, format!("<episodedetails>\n  <title>Ep</title>{body}\n</episodedetails>\n"))
            .expect("write episode");
        path
    }

    struct Harness {
        clock: ManualClock,
        translator: FakeTranslator,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                clock: ManualClock::new(),
                translator: FakeTranslator::default(),
            }
        }

        fn run(&self, policy: &RunPolicy, search: &FakeSearch, translate: bool) -> RunStatistics {
            let limiter = RateLimiter::jikan(&self.clock);
            let trailers = TrailerResolver::new(None, &limiter);
            let translator: Option<&dyn crate::providers::Translator> =
                translate.then_some(&self.translator as &dyn crate::providers::Translator);
            let translation = TranslationStep::new(translator, policy.target_language.clone());
            Orchestrator::new(policy, search, &trailers, &translation, &self.clock).run()
        }
    }

    fn rating_only(root: &Path) -> RunPolicy {
        let mut policy = RunPolicy::new(root);
        policy.merge.rating_only = true;
        policy
    }

    #[test]
    fn test_unparsable_unit_fails_and_next_unit_still_runs() {
        let dir = TempDir::new().expect("temp dir");
        write_unit(dir.path(), "a-broken", "<tvshow><title>Broken</tvshow>");
        let good = write_unit(dir.path(), "b-good", &series("Frieren", ""));
        let search = FakeSearch {
            responses: HashMap::from([("Frieren", Scripted::Found(9.3, &["Adventure", "Drama"]))]),
            ..FakeSearch::default()
        };

        let stats = Harness::new().run(&rating_only(dir.path()), &search, false);

        assert_eq!(stats.units_found, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.updated, 1);
        let written = fs::read_to_string(good.join(SERIES_FILE_NAME)).expect("read");
        assert!(written.contains("<rating>9.3</rating>"));
        assert!(written.contains("<genre>Adventure</genre>\n  <genre>Drama</genre>"));
        assert_eq!(stats.ratings_updated, 1);
        assert_eq!(stats.genres_updated, 1);
        assert_eq!(stats.metadata_api_calls, 1);
    }

    #[test]
    fn test_unit_error_reports_stage() {
        let dir = TempDir::new().expect("temp dir");
        let unit = write_unit(dir.path(), "show", "<tvshow>");
        let harness = Harness::new();
        let policy = rating_only(dir.path());
        let search = FakeSearch::default();
        let limiter = RateLimiter::jikan(&harness.clock);
        let trailers = TrailerResolver::new(None, &limiter);
        let translation = TranslationStep::new(None, "French");
        let mut orchestrator =
            Orchestrator::new(&policy, &search, &trailers, &translation, &harness.clock);

        let err = orchestrator.run_unit(&unit, "show").expect_err("should fail");
        assert_eq!(err.stage(), UnitStage::Loaded);

        fs::write(unit.join(SERIES_FILE_NAME), "<movie></movie>").expect("rewrite");
        let err = orchestrator.run_unit(&unit, "show").expect_err("should fail");
        assert!(matches!(err, UnitError::UnexpectedRoot { .. }));
    }

    #[test]
    fn test_provider_failure_fails_unit_without_touching_file() {
        let dir = TempDir::new().expect("temp dir");
        let body = series("Flaky", "\n  <rating>0</rating>");
        let unit = write_unit(dir.path(), "flaky", &body);
        let search = FakeSearch {
            responses: HashMap::from([("Flaky", Scripted::Transient)]),
            ..FakeSearch::default()
        };

        let stats = Harness::new().run(&rating_only(dir.path()), &search, false);

        assert_eq!(stats.failed, 1);
        assert_eq!(fs::read_to_string(unit.join(SERIES_FILE_NAME)).expect("read"), body);
    }

    #[test]
    fn test_not_found_and_missing_title() {
        let dir = TempDir::new().expect("temp dir");
        let unknown = series("Unknown", "");
        let unit = write_unit(dir.path(), "a-unknown", &unknown);
        write_unit(dir.path(), "b-untitled", "<tvshow>\n  <plot>x</plot>\n</tvshow>\n");

        let stats = Harness::new().run(&rating_only(dir.path()), &FakeSearch::default(), false);

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.skipped, 1);
        assert_eq!(fs::read_to_string(unit.join(SERIES_FILE_NAME)).expect("read"), unknown);
    }

    #[test]
    fn test_existing_rating_kept_without_force() {
        let dir = TempDir::new().expect("temp dir");
        let unit = write_unit(dir.path(), "show", &series("Bebop", "\n  <rating>7.0</rating>"));
        let search = FakeSearch {
            responses: HashMap::from([("Bebop", Scripted::Found(9.0, &[]))]),
            ..FakeSearch::default()
        };

        let stats = Harness::new().run(&rating_only(dir.path()), &search, false);

        assert_eq!(stats.updated, 0);
        let written = fs::read_to_string(unit.join(SERIES_FILE_NAME)).expect("read");
        assert!(written.contains("<rating>7.0</rating>"));
    }

    #[test]
    fn test_batch_pacing_sleeps_between_units_only() {
        let dir = TempDir::new().expect("temp dir");
        for name in ["a", "b", "c"] {
            write_unit(dir.path(), name, &series(name, ""));
        }
        let mut policy = rating_only(dir.path());
        policy.batch_mode = true;
        policy.batch_delay = Duration::from_secs(2);
        let harness = Harness::new();

        let stats = harness.run(&policy, &FakeSearch::default(), false);

        assert_eq!(stats.batch_pauses, 2);
        assert_eq!(harness.clock.total_slept(), Duration::from_secs(4));
    }

    #[test]
    fn test_offset_and_limit_select_units_in_order() {
        let dir = TempDir::new().expect("temp dir");
        for name in ["d", "a", "c", "b"] {
            write_unit(dir.path(), name, &series(name, ""));
        }
        let mut policy = rating_only(dir.path());
        policy.unit_offset = 1;
        policy.max_units = 2;
        let search = FakeSearch::default();

        let stats = Harness::new().run(&policy, &search, false);

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.units_skipped_by_offset, 1);
        assert_eq!(stats.units_skipped_by_limit, 1);
        assert_eq!(search.calls_made(), 2);
    }

    #[test]
    fn test_sync_mpaa_mode_writes_then_is_idempotent() {
        let dir = TempDir::new().expect("temp dir");
        let unit = write_unit(dir.path(), "show", &series("Show", "\n  <mpaa>TV-14</mpaa>"));
        episode(&unit, "Show - S01E01.nfo", "");
        episode(&unit, "Show - S01E02.nfo", "");
        write_unit(dir.path(), "unrated", &series("Unrated", ""));
        let mut policy = RunPolicy::new(dir.path());
        policy.sync_mpaa = true;
        let search = FakeSearch::default();

        let first = Harness::new().run(&policy, &search, false);
        assert_eq!(first.episode_mpaa_written, 2);
        assert_eq!(first.updated, 1);
        assert_eq!(first.skipped, 1);

        let second = Harness::new().run(&policy, &search, false);
        assert_eq!(second.episode_mpaa_written, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(search.calls_made(), 0);
    }

    #[test]
    fn test_remove_mpaa_mode() {
        let dir = TempDir::new().expect("temp dir");
        let unit = write_unit(dir.path(), "show", &series("Show", "\n  <mpaa>TV-14</mpaa>"));
        let path = episode(&unit, "Show - S01E01.nfo", "\n  <mpaa>TV-14</mpaa>");
        let mut policy = RunPolicy::new(dir.path());
        policy.remove_mpaa = true;

        let stats = Harness::new().run(&policy, &FakeSearch::default(), false);

        assert_eq!(stats.episode_mpaa_removed, 1);
        assert!(!fs::read_to_string(path).expect("read").contains("mpaa"));
        let series_text = fs::read_to_string(unit.join(SERIES_FILE_NAME)).expect("read");
        assert!(series_text.contains("<mpaa>TV-14</mpaa>"));
    }

    #[test]
    fn test_default_mode_enriches_translates_and_inherits_mpaa() {
        let dir = TempDir::new().expect("temp dir");
        let unit = write_unit(
            dir.path(),
            "show",
            &series("Frieren", "\n  <plot>An elf mage travels.</plot>\n  <mpaa>TV-PG</mpaa>"),
        );
        let path = episode(&unit, "Frieren - S01E01.nfo", "\n  <plot>They depart.</plot>");
        let search = FakeSearch {
            responses: HashMap::from([("Frieren", Scripted::Found(9.3, &["Adventure"]))]),
            ..FakeSearch::default()
        };
        let policy = RunPolicy::new(dir.path());
        let harness = Harness::new();

        let stats = harness.run(&policy, &search, true);

        let series_text = fs::read_to_string(unit.join(SERIES_FILE_NAME)).expect("read");
        assert!(series_text.contains("<plot>[French] An elf mage travels.</plot>"));
        assert!(series_text.contains("<rating>9.3</rating>"));
        let episode_text = fs::read_to_string(path).expect("read");
        assert!(episode_text.contains("<mpaa>TV-PG</mpaa>"));
        assert!(episode_text.contains("<plot>[French] They depart.</plot>"));
        assert_eq!(stats.plots_translated, 1);
        assert_eq!(stats.episode_mpaa_written, 1);
        assert_eq!(stats.translation_api_calls, 3);
    }

    #[test]
    fn test_episodes_only_leaves_series_record_alone() {
        let dir = TempDir::new().expect("temp dir");
        let body = series("Frieren", "\n  <plot>An elf mage travels.</plot>");
        let unit = write_unit(dir.path(), "show", &body);
        let path = episode(&unit, "Frieren - S01E01.nfo", "\n  <plot>They depart.</plot>");
        let mut policy = RunPolicy::new(dir.path());
        policy.episodes_only = true;
        let search = FakeSearch::default();

        let stats = Harness::new().run(&policy, &search, true);

        assert_eq!(fs::read_to_string(unit.join(SERIES_FILE_NAME)).expect("read"), body);
        assert!(fs::read_to_string(path).expect("read").contains("[French] They depart."));
        assert_eq!(search.calls_made(), 0);
        assert_eq!(stats.updated, 1);
    }

    #[test]
    fn test_untitled_series_still_gets_episode_pass() {
        let dir = TempDir::new().expect("temp dir");
        let body = "<tvshow>\n  <mpaa>TV-14</mpaa>\n</tvshow>\n";
        let unit = write_unit(dir.path(), "untitled", body);
        let path = episode(&unit, "Show - S01E01.nfo", "\n  <plot>They depart.</plot>");
        let policy = RunPolicy::new(dir.path());
        let search = FakeSearch::default();

        let stats = Harness::new().run(&policy, &search, true);

        assert_eq!(fs::read_to_string(unit.join(SERIES_FILE_NAME)).expect("read"), body);
        let episode_text = fs::read_to_string(path).expect("read");
        assert!(episode_text.contains("<mpaa>TV-14</mpaa>"));
        assert!(episode_text.contains("<plot>[French] They depart.</plot>"));
        assert_eq!(search.calls_made(), 0);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.episode_mpaa_written, 1);
    }

    #[test]
    fn test_translate_only_searches_only_when_trailer_is_missing() {
        let dir = TempDir::new().expect("temp dir");
        let with_trailer = write_unit(
            dir.path(),
            "a-with-trailer",
            &series(
                "Bebop",
                "\n  <plot>Bounty hunters in space.</plot>\n  <trailer>plugin://plugin.video.youtube/play/?video_id=abcdefghijk</trailer>",
            ),
        );
        write_unit(dir.path(), "b-no-trailer", &series("Trigun", ""));
        let search = FakeSearch {
            responses: HashMap::from([("Bebop", Scripted::Found(8.8, &["Action"]))]),
            ..FakeSearch::default()
        };
        let mut policy = RunPolicy::new(dir.path());
        policy.merge.translate_only = true;

        let stats = Harness::new().run(&policy, &search, true);

        assert_eq!(search.calls_made(), 1);
        assert_eq!(stats.metadata_api_calls, 1);
        let written = fs::read_to_string(with_trailer.join(SERIES_FILE_NAME)).expect("read");
        assert!(written.contains("<plot>[French] Bounty hunters in space.</plot>"));
        assert!(!written.contains("<rating>"));
        assert!(!written.contains("<genre>"));
    }
}
