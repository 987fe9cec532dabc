//! Input Scanner
//!
//! Flags task input that references sensitive operational concepts before it
//! is turned into a prompt for a code-mutating task.
//!
//! The scanner is advisory. Keyword lists are trivially evaded (synonyms,
//! other languages), so a match never blocks execution; it only produces a
//! log line and a banner on the eventually-posted response.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Keyword table compiled into the binary
pub const DEFAULT_KEYWORDS: &str = include_str!("../../resources/sensitive_keywords.txt");

/// Errors raised while parsing a keyword table
#[derive(Debug, thiserror::Error)]
pub enum KeywordTableError {
    #[error("line {line}: keyword '{keyword}' appears before any [category] header")]
    KeywordOutsideCategory { line: usize, keyword: String },

    #[error("line {line}: empty category header")]
    EmptyCategory { line: usize },

    #[error("failed to read keyword table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result of scanning one input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanVerdict {
    pub flagged: bool,
    pub matched_categories: BTreeSet<String>,
}

impl ScanVerdict {
    fn from_categories(matched_categories: BTreeSet<String>) -> Self {
        Self {
            flagged: !matched_categories.is_empty(),
            matched_categories,
        }
    }

    /// Advisory banner appended to an allowed response, if flagged
    pub fn banner(&self) -> Option<String> {
        if !self.flagged {
            return None;
        }
        let categories: Vec<&str> = self.matched_categories.iter().map(String::as_str).collect();
        Some(format!(
            "SECURITY NOTICE: the task input references sensitive topics ({}). \
             Review the proposed changes carefully before merging.",
            categories.join(", ")
        ))
    }
}

/// Categorized, lowercased keywords
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordTable {
    categories: BTreeMap<String, Vec<String>>,
}

impl KeywordTable {
    /// Parse the `[category]` / one-keyword-per-line format
    pub fn parse(source: &str) -> Result<Self, KeywordTableError> {
        let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for (index, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = header.trim().to_lowercase();
                if name.is_empty() {
                    return Err(KeywordTableError::EmptyCategory { line: index + 1 });
                }
                categories.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }

            match &current {
                Some(category) => {
                    let keywords = categories.entry(category.clone()).or_default();
                    let keyword = line.to_lowercase();
                    if !keywords.contains(&keyword) {
                        keywords.push(keyword);
                    }
                }
                None => {
                    return Err(KeywordTableError::KeywordOutsideCategory {
                        line: index + 1,
                        keyword: line.to_string(),
                    })
                }
            }
        }

        Ok(Self { categories })
    }

    /// Load a table from disk
    pub fn load(path: &Path) -> Result<Self, KeywordTableError> {
        let source = fs::read_to_string(path).map_err(|source| KeywordTableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&source)
    }

    /// The table compiled into the binary
    pub fn builtin() -> Result<Self, KeywordTableError> {
        Self::parse(DEFAULT_KEYWORDS)
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn keywords(&self, category: &str) -> &[String] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(Vec::is_empty)
    }
}

/// Stateless scanner over a shared keyword table
#[derive(Debug, Clone)]
pub struct InputScanner {
    table: KeywordTable,
}

impl InputScanner {
    pub fn new(table: KeywordTable) -> Self {
        Self { table }
    }

    /// Case-insensitive substring scan of `text`
    pub fn scan(&self, text: &str) -> ScanVerdict {
        let haystack = text.to_lowercase();
        let matched = self
            .table
            .categories
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k.as_str())))
            .map(|(category, _)| category.clone())
            .collect();
        ScanVerdict::from_categories(matched)
    }
}
