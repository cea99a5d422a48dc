//! Parser for catalog data files.
//!
//! Both files use `::` as the field separator:
//! - items.dat: itemId::title::type::genres::popularity::overview
//! - ratings.dat: userId::itemId::rating::timestamp
//!
//! Genres are pipe-separated and may be empty. The overview is the rest of
//! the line, so it may itself contain `::`. A malformed line is rejected with
//! its file and line number; parsing carries on with the next line.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use std::fs;
use std::path::Path;

const SEPARATOR: &str = "::";
const ITEM_FIELDS: usize = 6;
const RATING_FIELDS: usize = 4;

/// Records parsed from one file plus the lines that were rejected
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub rejected: Vec<DataLoadError>,
}

fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(DataLoadError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse every non-empty line of `content` with `parse_line`
fn parse_lines<T>(
    content: &str,
    file: &str,
    parse_line: impl Fn(&str, usize) -> std::result::Result<T, String>,
) -> Parsed<T> {
    let mut records = Vec::new();
    let mut rejected = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() || line_trimmed.starts_with('#') {
            continue;
        }
        match parse_line(line_trimmed, line_no) {
            Ok(record) => records.push(record),
            Err(reason) => rejected.push(DataLoadError::ParseError {
                file: file.to_string(),
                line: line_no,
                reason,
            }),
        }
    }

    Parsed { records, rejected }
}

fn split_fields(line: &str, expected: usize, line_no: usize) -> std::result::Result<Vec<&str>, String> {
    let parts: Vec<&str> = line.splitn(expected, SEPARATOR).collect();
    if parts.len() < expected {
        return Err(DataLoadError::FieldCountMismatch {
            expected,
            found: parts.len(),
            line: line_no,
        }
        .to_string());
    }
    Ok(parts)
}

fn parse_field<T: std::str::FromStr>(raw: &str, field: &str) -> std::result::Result<T, String>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("Invalid {}: {}", field, e))
}

/// Parse a single items.dat line
pub fn parse_item_line(line: &str, line_no: usize) -> std::result::Result<Item, String> {
    let parts = split_fields(line, ITEM_FIELDS, line_no)?;

    let id: ItemId = parse_field(parts[0], "itemId")?;
    let title = parts[1].trim();
    if title.is_empty() {
        return Err("Missing title".to_string());
    }
    let item_type: ItemType = parse_field(parts[2], "type")?;
    let popularity: f64 = parse_field(parts[4], "popularity")?;

    Ok(Item {
        id,
        title: title.to_string(),
        item_type,
        genres: parse_genres(parts[3]),
        overview: parts[5].trim().to_string(),
        popularity,
    })
}

/// Parse a single ratings.dat line
pub fn parse_rating_line(line: &str, line_no: usize) -> std::result::Result<Rating, String> {
    let parts = split_fields(line, RATING_FIELDS, line_no)?;
    if parts[3].contains(SEPARATOR) {
        return Err("Too many fields".to_string());
    }

    Ok(Rating {
        user_id: parse_field(parts[0], "userId")?,
        item_id: parse_field(parts[1], "itemId")?,
        value: parse_field(parts[2], "rating")?,
        timestamp: parse_field(parts[3], "timestamp")?,
    })
}

/// Parse the items.dat file
pub fn parse_items(path: &Path) -> Result<Parsed<Item>> {
    let content = read_file(path)?;
    Ok(parse_lines(&content, &file_name(path), parse_item_line))
}

/// Parse the ratings.dat file
pub fn parse_ratings(path: &Path) -> Result<Parsed<Rating>> {
    let content = read_file(path)?;
    Ok(parse_lines(&content, &file_name(path), parse_rating_line))
}

/// Split pipe-separated genres, dropping blanks
///
/// Example: "Action|Sci-Fi" -> vec!["Action", "Sci-Fi"]
fn parse_genres(s: &str) -> Vec<String> {
    s.split('|')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}
