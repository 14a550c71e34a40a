//! Copies the series classification down to episode records, or strips it.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::nfo::{DocumentError, EpisodeRecord};

/// Whether an episode with `current` should receive `series_rating`.
pub fn should_write_mpaa(current: Option<&str>, series_rating: &str, force: bool) -> bool {
    match current {
        None => true,
        Some(current) => force && current != series_rating,
    }
}

/// Per-call tallies. A file counts as `written` only when it was saved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationReport {
    pub examined: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PropagationReport {
    fn absorb(&mut self, result: Result<EpisodeOutcome, DocumentError>, label: &str) {
        self.examined += 1;
        match result {
            Ok(EpisodeOutcome::Written) => self.written += 1,
            Ok(EpisodeOutcome::Unchanged) => {}
            Ok(EpisodeOutcome::Skipped) => self.skipped += 1,
            Err(error) => {
                warn!("Unit[{label}]: episode update failed: {error}");
                self.failed += 1;
            }
        }
    }
}

enum EpisodeOutcome {
    Written,
    Unchanged,
    Skipped,
}

fn update_episode<F>(path: &Path, edit: F) -> Result<EpisodeOutcome, DocumentError>
where
    F: FnOnce(&mut EpisodeRecord) -> Result<bool, DocumentError>,
{
    let Some(mut episode) = EpisodeRecord::load(path)? else {
        return Ok(EpisodeOutcome::Skipped);
    };
    if !edit(&mut episode)? {
        return Ok(EpisodeOutcome::Unchanged);
    }
    if episode.save()? {
        Ok(EpisodeOutcome::Written)
    } else {
        Ok(EpisodeOutcome::Unchanged)
    }
}

pub fn sync_down(
    label: &str,
    series_rating: &str,
    episodes: &[PathBuf],
    force: bool,
) -> PropagationReport {
    let mut report = PropagationReport::default();
    for path in episodes {
        let result = update_episode(path, |episode| {
            let current = episode.mpaa();
            if !should_write_mpaa(current.as_deref(), series_rating, force) {
                return Ok(false);
            }
            episode.set_mpaa(series_rating)
        });
        if matches!(result, Ok(EpisodeOutcome::Written)) {
            debug!("Unit[{label}]: set mpaa '{series_rating}' on {}", path.display());
        }
        report.absorb(result, label);
    }
    info!(
        "Unit[{label}]: mpaa '{series_rating}' written to {} of {} episode(s)",
        report.written, report.examined
    );
    report
}

pub fn remove_all(label: &str, episodes: &[PathBuf]) -> PropagationReport {
    let mut report = PropagationReport::default();
    for path in episodes {
        let result = update_episode(path, EpisodeRecord::remove_mpaa);
        if matches!(result, Ok(EpisodeOutcome::Written)) {
            debug!("Unit[{label}]: removed mpaa from {}", path.display());
        }
        report.absorb(result, label);
    }
    info!(
        "Unit[{label}]: mpaa removed from {} of {} episode(s)",
        report.written, report.examined
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn episode(dir: &Path, name: &str, mpaa: Option<&str>) -> PathBuf {
        let path = dir.join(name);
        let mpaa = mpaa
            .map(|value| format!("\n  <mpaa>{value}</mpaa>"))
            .unwrap_or_default();
        fs::write(
            &path,
            format!("<episodedetails>\n  <title>{name}</title>{mpaa}\n</episodedetails>\n"),
        )
        .expect("write fixture");
        path
    }

    #[test]
    fn test_should_write_mpaa() {
        assert!(should_write_mpaa(None, "TV-14", false));
        assert!(!should_write_mpaa(Some("TV-14"), "TV-14", false));
        assert!(!should_write_mpaa(Some("TV-14"), "TV-14", true));
        assert!(!should_write_mpaa(Some("TV-MA"), "TV-14", false));
        assert!(should_write_mpaa(Some("TV-MA"), "TV-14", true));
    }

    #[test]
    fn test_sync_down_writes_missing_then_nothing_on_rerun() {
        let dir = TempDir::new().expect("temp dir");
        let episodes = vec![
            episode(dir.path(), "Show - S01E01.nfo", None),
            episode(dir.path(), "Show - S01E02.nfo", None),
        ];

        let first = sync_down("Show", "TV-14", &episodes, false);
        assert_eq!(first.written, 2);
        for path in &episodes {
            let text = fs::read_to_string(path).expect("read");
            assert!(text.contains("<mpaa>TV-14</mpaa>"));
        }

        let second = sync_down("Show", "TV-14", &episodes, false);
        assert_eq!(second.written, 0);
        assert_eq!(second.examined, 2);
    }

    #[test]
    fn test_sync_down_only_overrides_with_force() {
        let dir = TempDir::new().expect("temp dir");
        let episodes = vec![episode(dir.path(), "Show - S01E01.nfo", Some("TV-MA"))];
        assert_eq!(sync_down("Show", "TV-14", &episodes, false).written, 0);
        assert_eq!(sync_down("Show", "TV-14", &episodes, true).written, 1);
        let text = fs::read_to_string(&episodes[0]).expect("read");
        assert!(text.contains("<mpaa>TV-14</mpaa>"));
        assert!(!text.contains("TV-MA"));
    }

    #[test]
    fn test_remove_all_is_idempotent() {
        let dir = TempDir::new().expect("temp dir");
        let episodes = vec![
            episode(dir.path(), "Show - S01E01.nfo", Some("TV-14")),
            episode(dir.path(), "Show - S01E02.nfo", None),
        ];
        let first = remove_all("Show", &episodes);
        assert_eq!(first.written, 1);
        let before = fs::read_to_string(&episodes[0]).expect("read");
        assert!(!before.contains("mpaa"));

        let second = remove_all("Show", &episodes);
        assert_eq!(second.written, 0);
        assert_eq!(fs::read_to_string(&episodes[0]).expect("read"), before);
    }

    #[test]
    fn test_failures_and_foreign_roots_do_not_stop_the_pass() {
        let dir = TempDir::new().expect("temp dir");
        let broken = dir.path().join("Show - S01E01.nfo");
        fs::write(&broken, "<episodedetails><title>").expect("write fixture");
        let foreign = dir.path().join("Show - S01E02.nfo");
        fs::write(&foreign, "<movie></movie>").expect("write fixture");
        let good = episode(dir.path(), "Show - S01E03.nfo", None);

        let report = sync_down("Show", "TV-14", &[broken, foreign, good], false);
        assert_eq!(report.examined, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.written, 1);
    }
}
