//! Per-episode pass: optional mpaa inheritance plus title/plot translation,
//! saved with a single write per file.

use std::path::Path;

use log::{debug, warn};

use crate::mpaa::should_write_mpaa;
use crate::nfo::{DocumentError, EpisodeRecord};
use crate::stats::RunStatistics;
use crate::translation::TranslationStep;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct EpisodeChanges {
    mpaa: bool,
    title: bool,
    plot: bool,
}

impl EpisodeChanges {
    fn any(&self) -> bool {
        self.mpaa || self.title || self.plot
    }
}

pub struct EpisodeProcessor<'a> {
    translation: &'a TranslationStep<'a>,
    translate: bool,
}

impl<'a> EpisodeProcessor<'a> {
    pub fn new(translation: &'a TranslationStep<'a>, translate: bool) -> Self {
        Self {
            translation,
            translate: translate && translation.enabled(),
        }
    }

    /// Processes every episode file; failures are logged and counted.
    /// `inherited_mpaa` is written to episodes that have none.
    pub fn process_all(
        &self,
        label: &str,
        episodes: &[impl AsRef<Path>],
        inherited_mpaa: Option<&str>,
        stats: &mut RunStatistics,
    ) {
        for path in episodes {
            let path = path.as_ref();
            stats.episodes_examined += 1;
            match self.process_one(label, path, inherited_mpaa) {
                Ok(None) => stats.episodes_skipped += 1,
                Ok(Some(changes)) => {
                    if changes.any() {
                        stats.episodes_updated += 1;
                    }
                    stats.episode_mpaa_written += usize::from(changes.mpaa);
                    stats.episode_titles_translated += usize::from(changes.title);
                    stats.episode_plots_translated += usize::from(changes.plot);
                }
                Err(error) => {
                    warn!("Unit[{label}]: episode {} failed: {error}", path.display());
                    stats.episodes_failed += 1;
                }
            }
        }
    }

    fn process_one(
        &self,
        label: &str,
        path: &Path,
        inherited_mpaa: Option<&str>,
    ) -> Result<Option<EpisodeChanges>, DocumentError> {
        let Some(mut episode) = EpisodeRecord::load(path)? else {
            return Ok(None);
        };
        let mut changes = EpisodeChanges::default();

        if let Some(rating) = inherited_mpaa {
            if should_write_mpaa(episode.mpaa().as_deref(), rating, false) {
                changes.mpaa = episode.set_mpaa(rating)?;
            }
        }

        if self.translate {
            let what = format!("episode {} title", episode.file_name());
            if let Some(title) = episode.title() {
                if let Some(translated) = self.translation.translate_text(label, &what, &title) {
                    changes.title = episode.set_title(&translated)?;
                }
            }
            let what = format!("episode {} plot", episode.file_name());
            if let Some(plot) = episode.plot() {
                if let Some(translated) = self.translation.translate_text(label, &what, &plot) {
                    changes.plot = episode.set_plot(&translated)?;
                }
            }
        }

        if episode.save()? {
            debug!("Unit[{label}]: updated episode {}", path.display());
        }
        Ok(Some(changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::fakes::FakeTranslator;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).expect("write fixture");
        path
    }

    #[test]
    fn test_inherits_mpaa_and_translates_in_one_write() {
        let dir = TempDir::new().expect("temp dir");
        let path = write(
            dir.path(),
            "Show - S01E01.nfo",
            "<episodedetails>\n  <title>The Journey</title>\n  <plot>They leave.</plot>\n</episodedetails>\n",
        );
        let translator = FakeTranslator::default();
        let step = TranslationStep::new(Some(&translator), "French");
        let processor = EpisodeProcessor::new(&step, true);
        let mut stats = RunStatistics::default();

        processor.process_all("Show", &[path.clone()], Some("TV-14"), &mut stats);

        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains("<title>[French] The Journey</title>"));
        assert!(text.contains("<plot>[French] They leave.</plot>"));
        assert!(text.contains("<mpaa>TV-14</mpaa>"));
        assert_eq!(stats.episodes_updated, 1);
        assert_eq!(stats.episode_mpaa_written, 1);
        assert_eq!(stats.episode_titles_translated, 1);
        assert_eq!(stats.episode_plots_translated, 1);
    }

    #[test]
    fn test_existing_mpaa_is_not_overridden_and_unchanged_file_is_not_written() {
        let dir = TempDir::new().expect("temp dir");
        let body = "<episodedetails>\n  <title>X</title>\n  <mpaa>TV-MA</mpaa>\n</episodedetails>\n";
        let path = write(dir.path(), "Show - S01E01.nfo", body);
        let step = TranslationStep::new(None, "French");
        let processor = EpisodeProcessor::new(&step, true);
        let mut stats = RunStatistics::default();

        processor.process_all("Show", &[path.clone()], Some("TV-14"), &mut stats);

        assert_eq!(fs::read_to_string(&path).expect("read"), body);
        assert_eq!(stats.episodes_examined, 1);
        assert_eq!(stats.episodes_updated, 0);
    }

    #[test]
    fn test_bad_episodes_are_counted_and_skipped() {
        let dir = TempDir::new().expect("temp dir");
        let broken = write(dir.path(), "Show - S01E01.nfo", "<episodedetails>");
        let foreign = write(dir.path(), "Show - S01E02.nfo", "<tvshow></tvshow>");
        let step = TranslationStep::new(None, "French");
        let processor = EpisodeProcessor::new(&step, false);
        let mut stats = RunStatistics::default();

        processor.process_all("Show", &[broken, foreign], Some("TV-14"), &mut stats);

        assert_eq!(stats.episodes_examined, 2);
        assert_eq!(stats.episodes_failed, 1);
        assert_eq!(stats.episodes_skipped, 1);
    }
}
