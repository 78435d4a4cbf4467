//! Title text construction and tokenization.
//!
//! The title template is part of the embedding contract: changing the field
//! order, separators or cast truncation changes every title vector. Bump
//! `TEMPLATE_VERSION` whenever it changes so old snapshots are refused.

use sha2::{Digest, Sha256};

use crate::catalog::TitleRecord;

/// Version of the title text template
pub const TEMPLATE_VERSION: u32 = 2;

/// Format a title record into the text that gets embedded.
///
/// # Format
///
/// ```text
/// Title. Synopsis. Genres: drama, romance. Year: 2019. Keywords: grief. Cast: A, B, C, D, E. Network: HBO
/// ```
///
/// Empty fields are omitted and cast is cut to the first `leading_cast` names.
pub fn format_title_text(record: &TitleRecord, leading_cast: usize) -> String {
    let mut parts = Vec::new();

    let title = record.title.trim();
    if !title.is_empty() {
        parts.push(title.to_string());
    }

    let synopsis = record.synopsis.trim();
    if !synopsis.is_empty() {
        parts.push(synopsis.trim_end_matches('.').to_string());
    }

    if let Some(genres) = join_list(&record.genres, usize::MAX) {
        parts.push(format!("Genres: {genres}"));
    }

    if let Some(year) = record.release_year {
        parts.push(format!("Year: {year}"));
    }

    if let Some(keywords) = join_list(&record.keywords, usize::MAX) {
        parts.push(format!("Keywords: {keywords}"));
    }

    if let Some(cast) = join_list(&record.cast, leading_cast) {
        parts.push(format!("Cast: {cast}"));
    }

    if let Some(networks) = join_list(&record.networks, usize::MAX) {
        parts.push(format!("Network: {networks}"));
    }

    parts.join(". ")
}

/// Text used to derive a title's emotion affinity when none was supplied
pub fn affinity_text(record: &TitleRecord) -> String {
    let mut text = record.synopsis.trim().to_string();
    for field in [&record.genres, &record.keywords] {
        for item in field.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            text.push(' ');
            text.push_str(item);
        }
    }
    text
}

fn join_list(items: &[String], limit: usize) -> Option<String> {
    let kept: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .take(limit)
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(", "))
    }
}

/// Identify the template, cast truncation, model and dimensionality together.
pub fn template_fingerprint(model_id: &str, dimensions: usize, leading_cast: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "template-v{TEMPLATE_VERSION}|cast={leading_cast}|model={model_id}|dims={dimensions}"
    ));
    hex::encode(&hasher.finalize()[..16])
}

/// Lowercase word tokens; apostrophes stay inside words ("don't").
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .map(|t| {
            t.trim_matches(|c| c == '\'' || c == '\u{2019}')
                .replace('\u{2019}', "'")
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}
