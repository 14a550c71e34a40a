//! Decides which fetched values land in a series record.

use std::collections::BTreeSet;

use crate::nfo::series::dedupe_preserving_order;
use crate::nfo::{SeriesField, SeriesRecord};
use crate::providers::CandidateMatch;

/// Scope flags that govern overwrites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergePolicy {
    pub force_update: bool,
    pub rating_only: bool,
    pub translate_only: bool,
    pub skip_translate: bool,
}

impl MergePolicy {
    /// Whether plot and outline may go through the translator afterwards.
    pub fn translation_in_scope(&self) -> bool {
        !self.skip_translate && !self.rating_only
    }

    /// Whether the trailer field would be written if a value were available.
    pub fn trailer_in_scope(&self, existing: &SeriesRecord) -> bool {
        existing.trailer.is_none() || self.force_update
    }
}

/// Values fetched for one series, already reduced to record shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedMetadata {
    pub rating: Option<f64>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub trailer: Option<String>,
}

impl FetchedMetadata {
    /// `trailer` is the resolved plugin URI, not the provider's raw reference.
    pub fn from_candidate(candidate: &CandidateMatch, trailer: Option<String>) -> Self {
        Self {
            rating: candidate.score.filter(|score| *score > 0.0),
            genres: candidate.genres.clone(),
            tags: candidate.tags.clone(),
            trailer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub record: SeriesRecord,
    pub changed: BTreeSet<SeriesField>,
}

#[cfg(test)]
impl MergeOutcome {
    pub fn is_changed(&self, field: SeriesField) -> bool {
        self.changed.contains(&field)
    }
}

/// Total and side-effect free. `fetched` is `None` when the search found nothing.
pub fn merge(
    existing: &SeriesRecord,
    fetched: Option<&FetchedMetadata>,
    policy: &MergePolicy,
) -> MergeOutcome {
    let mut record = existing.clone();
    let mut changed = BTreeSet::new();

    let Some(fetched) = fetched else {
        return MergeOutcome { record, changed };
    };

    if !policy.translate_only {
        if let Some(rating) = fetched.rating {
            let writable = existing.rating.is_none() || policy.force_update;
            if writable && existing.rating != Some(rating) {
                record.rating = Some(rating);
                changed.insert(SeriesField::Rating);
            }
        }

        let genres = dedupe_preserving_order(fetched.genres.iter().cloned());
        if !genres.is_empty() && genres != existing.genres {
            record.genres = genres;
            changed.insert(SeriesField::Genres);
        }

        let tags = dedupe_preserving_order(fetched.tags.iter().cloned());
        if !tags.is_empty() && tags != existing.tags {
            record.tags = tags;
            changed.insert(SeriesField::Tags);
        }
    }

    if let Some(trailer) = fetched.trailer.as_ref() {
        if policy.trailer_in_scope(existing) && existing.trailer.as_ref() != Some(trailer) {
            record.trailer = Some(trailer.clone());
            changed.insert(SeriesField::Trailer);
        }
    }

    MergeOutcome { record, changed }
}
