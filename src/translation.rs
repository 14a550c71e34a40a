//! Routes descriptive text through the optional translator.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::nfo::{SeriesField, SeriesRecord};
use crate::providers::Translator;
use crate::text::appears_to_be_language;

pub struct TranslationStep<'a> {
    translator: Option<&'a dyn Translator>,
    target_language: String,
}

impl<'a> TranslationStep<'a> {
    pub fn new(translator: Option<&'a dyn Translator>, target_language: impl Into<String>) -> Self {
        Self {
            translator,
            target_language: target_language.into(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.translator.is_some()
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn calls_made(&self) -> u64 {
        self.translator.map_or(0, |translator| translator.calls_made())
    }

    /// Translated `text`, or `None` when translation is off, the text already
    /// reads as the target language, the result is identical, or the call failed.
    pub fn translate_text(&self, label: &str, what: &str, text: &str) -> Option<String> {
        let translator = self.translator?;
        let source = text.trim();
        if source.is_empty() {
            return None;
        }
        if appears_to_be_language(source, &self.target_language) {
            debug!(
                "Unit[{label}]: {what} already looks like {}, skipping",
                self.target_language
            );
            return None;
        }
        match translator.translate(source, &self.target_language) {
            Ok(translated) if !translated.is_empty() && translated != source => {
                info!("Unit[{label}]: translated {what} to {}", self.target_language);
                Some(translated)
            }
            Ok(_) => None,
            Err(error) => {
                warn!("Unit[{label}]: {what} translation failed, keeping original: {error}");
                None
            }
        }
    }

    /// Translates plot and outline in place. An outline equal to the plot
    /// reuses the plot's translation.
    pub fn translate_series(&self, label: &str, record: &mut SeriesRecord) -> BTreeSet<SeriesField> {
        let mut changed = BTreeSet::new();
        if !self.enabled() {
            return changed;
        }
        if record.plot.is_none() && record.outline.is_none() {
            debug!("Unit[{label}]: no plot or outline to translate");
            return changed;
        }

        let original_plot = record.plot.clone();
        if let Some(plot) = original_plot.as_deref() {
            if let Some(translated) = self.translate_text(label, "plot", plot) {
                record.plot = Some(translated);
                changed.insert(SeriesField::Plot);
            }
        }

        if let Some(outline) = record.outline.clone() {
            let translated = if original_plot.as_deref() == Some(outline.as_str()) {
                changed
                    .contains(&SeriesField::Plot)
                    .then(|| record.plot.clone())
                    .flatten()
            } else {
                self.translate_text(label, "outline", &outline)
            };
            if let Some(translated) = translated {
                record.outline = Some(translated);
                changed.insert(SeriesField::Outline);
            }
        }
        changed
    }
}
