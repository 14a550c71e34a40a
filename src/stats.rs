//! Run-wide counters and the closing summary.

use std::time::Duration;

use log::info;

use crate::mpaa::PropagationReport;
use crate::nfo::SeriesField;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub units_found: usize,
    pub units_skipped_by_offset: usize,
    pub units_skipped_by_limit: usize,
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,

    pub ratings_updated: usize,
    pub genres_updated: usize,
    pub tags_updated: usize,
    pub trailers_updated: usize,
    pub plots_translated: usize,
    pub outlines_translated: usize,

    pub episodes_examined: usize,
    pub episodes_updated: usize,
    pub episodes_skipped: usize,
    pub episodes_failed: usize,
    pub episode_titles_translated: usize,
    pub episode_plots_translated: usize,
    pub episode_mpaa_written: usize,
    pub episode_mpaa_removed: usize,

    pub metadata_api_calls: u64,
    pub video_api_calls: u64,
    pub translation_api_calls: u64,

    pub batch_pauses: usize,
    pub batch_pause_total: Duration,
}

impl RunStatistics {
    pub fn record_field_change(&mut self, field: SeriesField) {
        let counter = match field {
            SeriesField::Rating => &mut self.ratings_updated,
            SeriesField::Genres => &mut self.genres_updated,
            SeriesField::Tags => &mut self.tags_updated,
            SeriesField::Trailer => &mut self.trailers_updated,
            SeriesField::Plot => &mut self.plots_translated,
            SeriesField::Outline => &mut self.outlines_translated,
        };
        *counter += 1;
    }

    pub fn record_mpaa_sync(&mut self, report: &PropagationReport) {
        self.absorb_episode_report(report);
        self.episode_mpaa_written += report.written;
    }

    pub fn record_mpaa_removal(&mut self, report: &PropagationReport) {
        self.absorb_episode_report(report);
        self.episode_mpaa_removed += report.written;
    }

    fn absorb_episode_report(&mut self, report: &PropagationReport) {
        self.episodes_examined += report.examined;
        self.episodes_updated += report.written;
        self.episodes_skipped += report.skipped;
        self.episodes_failed += report.failed;
    }

    pub fn record_batch_pause(&mut self, delay: Duration) {
        self.batch_pauses += 1;
        self.batch_pause_total += delay;
    }

    pub fn log_summary(&self) {
        info!("==================== Summary ====================");
        info!(
            "Folders: {} found, {} processed, {} updated, {} skipped, {} failed",
            self.units_found, self.processed, self.updated, self.skipped, self.failed
        );
        if self.units_skipped_by_offset > 0 || self.units_skipped_by_limit > 0 {
            info!(
                "Folders outside the selection: {} before offset, {} past limit",
                self.units_skipped_by_offset, self.units_skipped_by_limit
            );
        }
        info!(
            "Fields: {} ratings, {} genre sets, {} tag sets, {} trailers, {} plots, {} outlines",
            self.ratings_updated,
            self.genres_updated,
            self.tags_updated,
            self.trailers_updated,
            self.plots_translated,
            self.outlines_translated
        );
        if self.episodes_examined > 0 {
            info!(
                "Episodes: {} examined, {} updated, {} skipped, {} failed",
                self.episodes_examined,
                self.episodes_updated,
                self.episodes_skipped,
                self.episodes_failed
            );
            info!(
                "Episode changes: {} titles, {} plots translated, mpaa {} written / {} removed",
                self.episode_titles_translated,
                self.episode_plots_translated,
                self.episode_mpaa_written,
                self.episode_mpaa_removed
            );
        }
        info!(
            "API calls: {} Jikan, {} YouTube, {} Claude",
            self.metadata_api_calls, self.video_api_calls, self.translation_api_calls
        );
        if self.batch_pauses > 0 {
            info!(
                "Batch pauses: {} ({:.1}s total)",
                self.batch_pauses,
                self.batch_pause_total.as_secs_f64()
            );
        }
        info!("=================================================");
    }
}
