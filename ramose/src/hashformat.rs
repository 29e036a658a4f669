//! The Hash-Format Reader (see `https://github.com/opencitations/hf`).
//!
//! Parses a UTF-8 text document into an ordered list of [`HashRecord`]s.
//! Grammar, line-oriented: a line matching `^#(\S+) (.+)$` opens (or
//! continues) a field named by the first group; any other line is appended
//! verbatim, including its leading newline, to the most recently opened
//! field of the current record. The first field name seen in the file is
//! the *separator key*: every later occurrence of it starts a new record,
//! emitting the current one first.
//!

use crate::Error;
use regex::Regex;
use std::fs;
use std::path::Path;

/// An ordered mapping from field name to field value, preserving both
/// record order and field order within a record.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HashRecord {
    fields: Vec<(String, String)>,
}

impl HashRecord {
    fn new() -> Self {
        Self { fields: Vec::new() }
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn push_field(&mut self, name: &str) {
        self.fields.push((name.to_string(), String::new()));
    }

    fn append_to_last(&mut self, text: &str) {
        if let Some((_, value)) = self.fields.last_mut() {
            value.push_str(text);
        }
    }

    fn rstrip_all(&mut self) {
        for (_, value) in self.fields.iter_mut() {
            let trimmed_len = value.trim_end().len();
            value.truncate(trimmed_len);
        }
    }

    /// The value of the first field named `name`, if any.
    ///
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All fields in declaration order, as `(name, value)` pairs.
    ///
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

/// Parse a Hash-Format document at `path` into an ordered list of
/// [`HashRecord`]s.
///
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<HashRecord>, Error> {
    let text = map_error!(Config, fs::read_to_string(path.as_ref()))?;
    Ok(parse(&text))
}

/// Parse a Hash-Format document already read into memory.
///
pub fn parse(text: &str) -> Vec<HashRecord> {
    let field_re = field_re();
    let mut result = Vec::new();
    let mut first_field_name: Option<String> = None;
    let mut current: Option<HashRecord> = None;

    for line in split_lines_keep_terminator(text) {
        let had_newline = line.ends_with('\n');
        let body = if had_newline { &line[..line.len() - 1] } else { &line[..] };

        if let Some(caps) = field_re.captures(body) {
            let name = caps.get(1).unwrap().as_str().to_string();
            let mut content = caps.get(2).unwrap().as_str().to_string();
            if had_newline {
                content.push('\n');
            }
            if first_field_name.is_none() {
                first_field_name = Some(name.clone());
            }
            if first_field_name.as_deref() == Some(name.as_str()) {
                if let Some(rec) = current.take() {
                    if !rec.is_empty() {
                        result.push(rec);
                    }
                }
                current = Some(HashRecord::new());
            }
            if let Some(rec) = current.as_mut() {
                rec.push_field(&name);
                rec.append_to_last(&content);
            }
        } else if let Some(rec) = current.as_mut() {
            if !rec.is_empty() {
                rec.append_to_last(&line);
            }
        }
    }
    if let Some(mut rec) = current.take() {
        if !rec.is_empty() {
            result.push(rec);
        }
    }

    for rec in result.iter_mut() {
        rec.rstrip_all();
    }
    result
}

fn field_re() -> Regex {
    Regex::new(r"^#(\S+) (.+)$").unwrap()
}

/// Split `text` into lines, each still carrying its trailing `\n` (if any),
/// so continuation content reproduces the original document's newlines
/// exactly, per the original implementation's line-at-a-time scan.
///
fn split_lines_keep_terminator(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut cur = String::new();
    for ch in text.chars() {
        cur.push(ch);
        if ch == '\n' {
            lines.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_and_preserves_order() {
        let doc = "#url /a\n#method get\nprose line\nmore prose\n#url /b\n#method post\n";
        let records = parse(doc);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("url"), Some("/a"));
        assert_eq!(
            records[0].get("method"),
            Some("get\nprose line\nmore prose"),
        );
        assert_eq!(records[1].get("url"), Some("/b"));
        assert_eq!(records[1].get("method"), Some("post"));
        assert_eq!(
            records[0].fields().iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            vec!["url", "method"],
        );
    }

    #[test]
    fn malformed_header_lines_are_continuations() {
        let doc = "#url /a\nnot a field: no leading hash\n#url /b\n";
        let records = parse(doc);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].get("url"),
            Some("/a\nnot a field: no leading hash"),
        );
    }

    #[test]
    fn eof_emits_last_record() {
        let doc = "#url /only\n#method get";
        let records = parse(doc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("method"), Some("get"));
    }

    #[test]
    fn empty_document_yields_no_records() {
        assert_eq!(parse("").len(), 0);
        assert_eq!(parse("just some prose\nwith no fields\n").len(), 0);
    }
}
