//! Episode records (`episodedetails` root).

use std::path::Path;

use log::warn;

use crate::nfo::document::{DocumentError, NfoDocument};
use crate::nfo::EPISODE_ROOT;

#[derive(Debug)]
pub struct EpisodeRecord {
    document: NfoDocument,
}

impl EpisodeRecord {
    /// Loads an episode file. A file whose root is not `episodedetails` is
    /// skipped with a warning (`Ok(None)`).
    pub fn load(path: &Path) -> Result<Option<Self>, DocumentError> {
        Self::from_document(NfoDocument::load(path)?)
    }

    pub fn from_document(document: NfoDocument) -> Result<Option<Self>, DocumentError> {
        if document.root_name() != EPISODE_ROOT {
            warn!(
                "Episode: {} has root <{}>, expected <{EPISODE_ROOT}>, skipping",
                document.path().display(),
                document.root_name()
            );
            return Ok(None);
        }
        Ok(Some(Self { document }))
    }

    pub fn path(&self) -> &Path {
        self.document.path()
    }

    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn mpaa(&self) -> Option<String> {
        self.document.get_text("mpaa").filter(|value| !value.is_empty())
    }

    pub fn title(&self) -> Option<String> {
        self.document.get_text("title").filter(|value| !value.is_empty())
    }

    pub fn plot(&self) -> Option<String> {
        self.document.get_text("plot").filter(|value| !value.is_empty())
    }

    pub fn set_mpaa(&mut self, rating: &str) -> Result<bool, DocumentError> {
        self.document.set_text("mpaa", rating)
    }

    pub fn remove_mpaa(&mut self) -> Result<bool, DocumentError> {
        self.document.remove("mpaa")
    }

    pub fn set_title(&mut self, title: &str) -> Result<bool, DocumentError> {
        self.document.set_text("title", title)
    }

    pub fn set_plot(&mut self, plot: &str) -> Result<bool, DocumentError> {
        self.document.set_text("plot", plot)
    }

    /// Persists pending edits. Returns whether the file was written.
    pub fn save(&mut self) -> Result<bool, DocumentError> {
        self.document.save()
    }
}
