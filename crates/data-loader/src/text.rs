//! Text cleaning for the content corpus.
//!
//! Overview text is lowercased, stripped of diacritics (NFD decomposition
//! with combining marks dropped), split on non-alphanumeric characters and
//! filtered against a stop-term list. Genres are appended as `genre_<slug>`
//! pseudo-terms so they can never collide with words from the overview.

use crate::types::Item;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

const STOP_TERMS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "an", "and", "any", "are", "as", "at", "be",
    "been", "before", "being", "between", "both", "but", "by", "can", "could", "did", "do",
    "does", "during", "each", "for", "from", "had", "has", "have", "he", "her", "here", "hers",
    "him", "his", "how", "if", "in", "into", "is", "it", "its", "just", "more", "most", "no",
    "nor", "not", "of", "off", "on", "once", "only", "or", "other", "our", "out", "over", "own",
    "same", "she", "so", "some", "such", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "under", "until", "up", "very",
    "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will",
    "with", "would", "you", "your",
];

/// Prefix for genre pseudo-terms
pub const GENRE_PREFIX: &str = "genre_";

/// Shortest term kept, in characters
const MIN_TERM_LEN: usize = 2;

/// Turns item metadata into cleaned term lists.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    stop_terms: HashSet<String>,
}

impl TextCleaner {
    /// Cleaner with the built-in English stop-term list
    pub fn new() -> Self {
        Self {
            stop_terms: STOP_TERMS.iter().map(|t| fold_text(t)).collect(),
        }
    }

    /// Tokenize free text into cleaned terms
    pub fn clean(&self, text: &str) -> Vec<String> {
        fold_text(text)
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() >= MIN_TERM_LEN)
            .filter(|t| !self.stop_terms.contains(*t))
            .map(str::to_string)
            .collect()
    }

    /// Cleaned overview terms followed by one pseudo-term per genre
    pub fn item_terms(&self, item: &Item) -> Vec<String> {
        let mut terms = self.clean(&item.overview);
        terms.extend(item.genres.iter().filter_map(|g| genre_term(g)));
        terms
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase and strip diacritics
pub fn fold_text(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// `"Sci-Fi"` -> `Some("genre_sci_fi")`; blank genres yield `None`
pub fn genre_term(genre: &str) -> Option<String> {
    let slug = fold_text(genre)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if slug.is_empty() {
        None
    } else {
        Some(format!("{}{}", GENRE_PREFIX, slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemType;

    #[test]
    fn test_fold_text_strips_diacritics() {
        assert_eq!(fold_text("Amélie à Montréal"), "amelie a montreal");
        assert_eq!(fold_text("ŞEHİR"), "sehir");
    }

    #[test]
    fn test_clean_removes_stop_terms() {
        let cleaner = TextCleaner::new();
        let terms = cleaner.clean("The hunt for a lost Crew, in space!");
        assert_eq!(terms, vec!["hunt", "lost", "crew", "space"]);
    }

    #[test]
    fn test_genre_term() {
        assert_eq!(genre_term("Sci-Fi"), Some("genre_sci_fi".to_string()));
        assert_eq!(genre_term("Children's"), Some("genre_children_s".to_string()));
        assert_eq!(genre_term("  "), None);
    }

    #[test]
    fn test_item_terms_appends_genres() {
        let item = Item {
            id: 1,
            title: "Alien".to_string(),
            item_type: ItemType::Movie,
            genres: vec!["Horror".to_string(), "Sci-Fi".to_string()],
            overview: "Crew meets alien".to_string(),
            popularity: 3.0,
        };
        let terms = TextCleaner::new().item_terms(&item);
        assert_eq!(terms, vec!["crew", "meets", "alien", "genre_horror", "genre_sci_fi"]);
    }
}
