//! Typed view of a `tvshow.nfo` record.

use crate::nfo::document::{DocumentError, NfoDocument};

/// Fields of a series record the updater is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeriesField {
    Rating,
    Genres,
    Tags,
    Trailer,
    Plot,
    Outline,
}

impl SeriesField {
    #[cfg(test)]
    pub const ALL: [SeriesField; 6] = [
        SeriesField::Rating,
        SeriesField::Genres,
        SeriesField::Tags,
        SeriesField::Trailer,
        SeriesField::Plot,
        SeriesField::Outline,
    ];

    pub fn element_name(self) -> &'static str {
        match self {
            SeriesField::Rating => "rating",
            SeriesField::Genres => "genre",
            SeriesField::Tags => "tag",
            SeriesField::Trailer => "trailer",
            SeriesField::Plot => "plot",
            SeriesField::Outline => "outline",
        }
    }
}

/// Parses a stored rating. Non-numeric and non-positive values count as absent.
pub fn parse_rating(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|rating| rating.is_finite() && *rating > 0.0)
}

/// `8.75` stays `8.75`, whole numbers keep one decimal (`7` -> `7.0`).
pub fn format_rating(rating: f64) -> String {
    if rating.fract() == 0.0 {
        format!("{rating:.1}")
    } else {
        rating.to_string()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

pub(crate) fn dedupe_preserving_order(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && seen.insert(value.to_lowercase()))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesRecord {
    pub title: Option<String>,
    pub rating: Option<f64>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub trailer: Option<String>,
    pub plot: Option<String>,
    pub outline: Option<String>,
    pub mpaa: Option<String>,
}

impl SeriesRecord {
    pub fn from_document(document: &NfoDocument) -> Self {
        Self {
            title: non_empty(document.get_text("title")),
            rating: document
                .get_text("rating")
                .as_deref()
                .and_then(parse_rating),
            genres: dedupe_preserving_order(document.get_all("genre")),
            tags: dedupe_preserving_order(document.get_all("tag")),
            trailer: non_empty(document.get_text("trailer")),
            plot: non_empty(document.get_text("plot")),
            outline: non_empty(document.get_text("outline")),
            mpaa: non_empty(document.get_text("mpaa")),
        }
    }

    /// Copies `fields` from this record into `document`. Absent values are
    /// left alone rather than deleted. Returns how many fields changed the text.
    pub fn write_to(
        &self,
        document: &mut NfoDocument,
        fields: impl IntoIterator<Item = SeriesField>,
    ) -> Result<usize, DocumentError> {
        let mut written = 0;
        for field in fields {
            let name = field.element_name();
            let changed = match field {
                SeriesField::Genres => document.replace_all(name, &self.genres)?,
                SeriesField::Tags => document.replace_all(name, &self.tags)?,
                SeriesField::Rating => match self.rating {
                    Some(rating) => document.set_text(name, &format_rating(rating))?,
                    None => false,
                },
                SeriesField::Trailer => set_optional(document, name, self.trailer.as_deref())?,
                SeriesField::Plot => set_optional(document, name, self.plot.as_deref())?,
                SeriesField::Outline => set_optional(document, name, self.outline.as_deref())?,
            };
            if changed {
                written += 1;
            }
        }
        Ok(written)
    }
}

fn set_optional(
    document: &mut NfoDocument,
    name: &str,
    value: Option<&str>,
) -> Result<bool, DocumentError> {
    match value {
        Some(value) => document.set_text(name, value),
        None => Ok(false),
    }
}
