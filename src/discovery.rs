use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::nfo::SERIES_FILE_NAME;

static EPISODE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)S(\d+)E(\d+)").expect("valid regex"));

pub fn is_series_unit(directory: &Path) -> bool {
    directory.join(SERIES_FILE_NAME).is_file()
}

/// `S01E02`-style token of an episode file name, uppercased.
pub fn episode_token(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    EPISODE_TOKEN
        .find(file_name)
        .map(|token| token.as_str().to_ascii_uppercase())
}

pub fn is_episode_file(path: &Path) -> bool {
    let is_nfo = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("nfo"));
    let is_series_file = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.eq_ignore_ascii_case(SERIES_FILE_NAME));
    is_nfo && !is_series_file && episode_token(path).is_some()
}

/// Depth-first walk calling `visit` for every readable entry. Returning
/// `false` from `descend` keeps the walker out of that directory.
fn walk<D, V>(root: &Path, mut descend: D, mut visit: V)
where
    D: FnMut(&Path) -> bool,
    V: FnMut(&Path, bool),
{
    let mut pending_directories = vec![root.to_path_buf()];

    while let Some(directory) = pending_directories.pop() {
        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Failed to read directory {}: {}", directory.display(), err);
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(
                        "Failed to read a directory entry in {}: {}",
                        directory.display(),
                        err
                    );
                    continue;
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    debug!("Failed to inspect {}: {}", path.display(), err);
                    continue;
                }
            };

            if file_type.is_dir() {
                visit(&path, true);
                if descend(&path) {
                    pending_directories.push(path);
                }
                continue;
            }

            if file_type.is_file() {
                visit(&path, false);
            }
        }
    }
}

/// Every directory at or below `root` holding a series record, in lexicographic order.
pub fn collect_series_units(root: &Path) -> Vec<PathBuf> {
    let mut units = Vec::new();
    if is_series_unit(root) {
        units.push(root.to_path_buf());
    }
    walk(
        root,
        |_| true,
        |path, is_dir| {
            if is_dir && is_series_unit(path) {
                units.push(path.to_path_buf());
            }
        },
    );
    units.sort_unstable();
    units
}

/// Episode records below `unit`, sorted. Nested series units are left to
/// their own pass.
pub fn collect_episode_files(unit: &Path) -> Vec<PathBuf> {
    let mut episodes = Vec::new();
    walk(
        unit,
        |directory| !is_series_unit(directory),
        |path, is_dir| {
            if !is_dir && is_episode_file(path) {
                episodes.push(path.to_path_buf());
            }
        },
    );
    episodes.sort_unstable();
    episodes
}

/// Units left after applying offset and limit, plus how many each rule dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitSelection {
    pub units: Vec<PathBuf>,
    pub skipped_by_offset: usize,
    pub skipped_by_limit: usize,
}

/// `max_units == 0` means no limit.
pub fn select_units(all_units: Vec<PathBuf>, offset: usize, max_units: usize) -> UnitSelection {
    let total = all_units.len();
    let start = offset.min(total);
    let end = if max_units > 0 {
        start.saturating_add(max_units).min(total)
    } else {
        total
    };
    UnitSelection {
        units: all_units
            .into_iter()
            .skip(start)
            .take(end - start)
            .collect(),
        skipped_by_offset: start,
        skipped_by_limit: total - end,
    }
}
