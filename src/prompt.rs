//! Prompt Templates
//!
//! Task prompts are built from templates with `{key}` placeholders. Rendering
//! is a single left-to-right pass: substituted values are inserted literally
//! and never re-scanned, so tracker content containing braces cannot inject
//! further placeholders. `{{` and `}}` produce literal braces.

use std::collections::HashMap;

/// Errors raised while rendering a template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{0}}}' at byte {1}")]
    UnknownPlaceholder(String, usize),

    #[error("unclosed placeholder starting at byte {0}")]
    Unclosed(usize),

    #[error("unmatched '}}' at byte {0}")]
    UnmatchedClose(usize),

    #[error("invalid placeholder name '{0}'")]
    InvalidName(String),
}

/// A prompt template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Result<Vec<&str>, TemplateError> {
        let mut names: Vec<&str> = Vec::new();
        self.walk(|segment| {
            if let Segment::Placeholder(name, _) = segment {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            Ok(())
        })?;
        Ok(names)
    }

    /// Render with `vars`
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use taskguard::prompt::PromptTemplate;
    ///
    /// let template = PromptTemplate::new("Fix {key}: {title}");
    /// let vars = HashMap::from([
    ///     ("key".to_string(), "PROJ-1".to_string()),
    ///     ("title".to_string(), "crash in {parser}".to_string()),
    /// ]);
    /// assert_eq!(template.render(&vars).unwrap(), "Fix PROJ-1: crash in {parser}");
    /// ```
    pub fn render(&self, vars: &HashMap<String, String>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        self.walk(|segment| {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name, at) => match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => return Err(TemplateError::UnknownPlaceholder(name.to_string(), at)),
                },
            }
            Ok(())
        })?;
        Ok(out)
    }

    fn walk<'a, F>(&'a self, mut visit: F) -> Result<(), TemplateError>
    where
        F: FnMut(Segment<'a>) -> Result<(), TemplateError>,
    {
        let src = self.source.as_str();
        let bytes = src.as_bytes();
        let mut literal_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'{' if bytes.get(i + 1) == Some(&b'{') => {
                    visit(Segment::Literal(&src[literal_start..=i]))?;
                    i += 2;
                    literal_start = i;
                }
                b'}' if bytes.get(i + 1) == Some(&b'}') => {
                    visit(Segment::Literal(&src[literal_start..=i]))?;
                    i += 2;
                    literal_start = i;
                }
                b'{' => {
                    visit(Segment::Literal(&src[literal_start..i]))?;
                    let close = src[i + 1..]
                        .find('}')
                        .map(|offset| i + 1 + offset)
                        .ok_or(TemplateError::Unclosed(i))?;
                    let name = &src[i + 1..close];
                    if !is_valid_name(name) {
                        return Err(TemplateError::InvalidName(name.to_string()));
                    }
                    visit(Segment::Placeholder(name, i))?;
                    i = close + 1;
                    literal_start = i;
                }
                b'}' => return Err(TemplateError::UnmatchedClose(i)),
                _ => i += 1,
            }
        }

        visit(Segment::Literal(&src[literal_start..]))
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str, usize),
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse `key=value` pairs as given on the command line
pub fn parse_vars<S: AsRef<str>>(pairs: &[S]) -> Result<HashMap<String, String>, String> {
    pairs
        .iter()
        .map(|pair| {
            let pair = pair.as_ref();
            pair.split_once('=')
                .filter(|(key, _)| is_valid_name(key))
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| format!("expected key=value, got '{}'", pair))
        })
        .collect()
}
