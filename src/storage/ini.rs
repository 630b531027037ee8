// SPDX-FileCopyrightText: 2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! A minimal INI document model for AWS shared credentials files.
//!
//! Sections that are never touched render back exactly as they were read,
//! byte for byte. Only a section passed to [`Document::upsert`] is
//! re-rendered.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum ParseError {
    #[error("line {line}: section header is missing its closing bracket")]
    UnclosedHeader { line: usize },
    #[error("line {line}: unexpected text after section header")]
    TrailingText { line: usize },
    #[error("line {line}: section name is empty")]
    EmptySectionName { line: usize },
    #[error("line {line}: key is empty")]
    EmptyKey { line: usize },
    #[error("line {line}: expected a key and value separated by '=' or ':'")]
    MissingDelimiter { line: usize },
}

#[derive(Debug)]
enum Line {
    Entry {
        key: String,
        value: String,
        /// The original text of the entry and any continuation lines.
        raw: String,
        continuation: String,
    },
    Other(String),
}

#[derive(Debug)]
struct Section {
    name: String,
    header: String,
    body: Vec<Line>,
    modified: bool,
    appended: bool,
}

impl Section {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            header: format!("[{name}]\n"),
            body: vec![],
            modified: true,
            appended: true,
        }
    }

    fn render(&self, out: &mut String) {
        if !self.modified {
            out.push_str(&self.header);
            for line in &self.body {
                match *line {
                    Line::Entry { ref raw, .. } | Line::Other(ref raw) => out.push_str(raw),
                }
            }
            return;
        }

        let width = self
            .body
            .iter()
            .filter_map(|line| match *line {
                Line::Entry { ref key, .. } => Some(key.len()),
                Line::Other(_) => None,
            })
            .max()
            .unwrap_or_default();

        push_line(out, &self.header);
        for line in &self.body {
            match *line {
                Line::Entry {
                    ref key,
                    ref value,
                    ref continuation,
                    ..
                } => {
                    if value.is_empty() {
                        push_line(out, &format!("{key:<width$} =\n"));
                    } else {
                        push_line(out, &format!("{key:<width$} = {value}\n"));
                    }
                    out.push_str(continuation);
                }
                Line::Other(ref raw) => push_line(out, raw),
            }
        }
    }
}

fn push_line(out: &mut String, line: &str) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(line);
}

/// A parsed INI file.
#[derive(Debug, Default)]
pub(crate) struct Document {
    preamble: String,
    sections: Vec<Section>,
}

impl Document {
    pub(crate) fn parse(text: &str) -> Result<Self, ParseError> {
        let mut doc = Self::default();

        for (index, raw) in text.split_inclusive('\n').enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                doc.push_other(raw);
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix('[') {
                let Some((name, trailer)) = rest.split_once(']') else {
                    return Err(ParseError::UnclosedHeader { line });
                };
                let trailer = trailer.trim_start();
                if !(trailer.is_empty() || trailer.starts_with('#') || trailer.starts_with(';')) {
                    return Err(ParseError::TrailingText { line });
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(ParseError::EmptySectionName { line });
                }
                doc.sections.push(Section {
                    name: name.to_owned(),
                    header: raw.to_owned(),
                    body: vec![],
                    modified: false,
                    appended: false,
                });
                continue;
            }

            // Indented lines continue the previous entry's value.
            if raw.starts_with(char::is_whitespace) {
                if let Some(&mut Line::Entry {
                    raw: ref mut entry_raw,
                    ref mut continuation,
                    ..
                }) = doc.last_line_mut()
                {
                    entry_raw.push_str(raw);
                    continuation.push_str(raw);
                    continue;
                }
            }

            let Some((key, value)) = trimmed.split_once(|c| c == '=' || c == ':') else {
                return Err(ParseError::MissingDelimiter { line });
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ParseError::EmptyKey { line });
            }
            match doc.sections.last_mut() {
                Some(section) => section.body.push(Line::Entry {
                    key: key.to_owned(),
                    value: value.trim().to_owned(),
                    raw: raw.to_owned(),
                    continuation: String::new(),
                }),
                None => doc.preamble.push_str(raw),
            }
        }

        Ok(doc)
    }

    fn push_other(&mut self, raw: &str) {
        match self.sections.last_mut() {
            Some(section) => section.body.push(Line::Other(raw.to_owned())),
            None => self.preamble.push_str(raw),
        }
    }

    fn last_line_mut(&mut self) -> Option<&mut Line> {
        self.sections.last_mut()?.body.last_mut()
    }

    #[cfg(test)]
    pub(crate) fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|section| section.name.as_str())
    }

    /// Sets `entries` at the top of the named section, in the order given,
    /// creating the section at the end of the document if it does not exist.
    /// Other keys already in the section are kept after them.
    pub(crate) fn upsert(&mut self, name: &str, entries: &[(&str, &str)]) {
        let index = match self.sections.iter().position(|section| section.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        let Some(section) = self.sections.get_mut(index) else {
            return;
        };

        let mut body = entries
            .iter()
            .map(|&(key, value)| Line::Entry {
                key: key.to_owned(),
                value: value.to_owned(),
                raw: String::new(),
                continuation: String::new(),
            })
            .collect::<Vec<_>>();
        body.extend(section.body.drain(..).filter(|line| match *line {
            Line::Entry { ref key, .. } => !entries.iter().any(|&(name, _)| name == key.as_str()),
            Line::Other(_) => true,
        }));
        section.body = body;
        section.modified = true;
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = self.preamble.clone();
        for section in &self.sections {
            if section.appended && !out.is_empty() {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                if !out.ends_with("\n\n") {
                    out.push('\n');
                }
            }
            section.render(&mut out);
        }
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREDENTIALS: [(&str, &str); 3] = [
        ("aws_secret_access_key", "abcdefgh"),
        ("aws_access_key_id", "1234567890"),
        ("aws_session_token", "ijklmnop"),
    ];

    #[test]
    fn untouched_document_round_trips() -> Result<(), ParseError> {
        let text = "# managed elsewhere\r\n[one]\r\nkey=value\r\n  ; note\r\n\r\n[ two ]\nother : thing\ns3 =\n  max_concurrent_requests = 20\n[three]";
        let doc = Document::parse(text)?;
        assert_eq!(doc.to_string(), text);
        assert_eq!(doc.section_names().collect::<Vec<_>>(), ["one", "two", "three"]);
        Ok(())
    }

    #[test]
    fn appends_aligned_section() -> Result<(), ParseError> {
        let mut doc = Document::parse("")?;
        doc.upsert("default", &CREDENTIALS);
        assert_eq!(
            doc.to_string(),
            "[default]\n\
             aws_secret_access_key = abcdefgh\n\
             aws_access_key_id     = 1234567890\n\
             aws_session_token     = ijklmnop\n"
        );

        let mut doc = Document::parse("[other]\nkey = value")?;
        doc.upsert("default", &CREDENTIALS[..1]);
        assert_eq!(
            doc.to_string(),
            "[other]\nkey = value\n\n[default]\naws_secret_access_key = abcdefgh\n"
        );
        Ok(())
    }

    #[test]
    fn rewrites_existing_section_in_place() -> Result<(), ParseError> {
        let mut doc = Document::parse(
            "[first]\na = b\n\n\
             [default]\n\
             region = us-east-1\n\
             aws_access_key_id = old\n\
             output_format_preference = json\n\
             \n\
             [last]\nc = d\n",
        )?;
        doc.upsert("default", &CREDENTIALS);
        assert_eq!(
            doc.to_string(),
            "[first]\na = b\n\n\
             [default]\n\
             aws_secret_access_key    = abcdefgh\n\
             aws_access_key_id        = 1234567890\n\
             aws_session_token        = ijklmnop\n\
             region                   = us-east-1\n\
             output_format_preference = json\n\
             \n\
             [last]\nc = d\n"
        );
        Ok(())
    }

    #[test]
    fn keeps_continuation_lines_of_extra_keys() -> Result<(), ParseError> {
        let mut doc = Document::parse("[default]\ns3 =\n  addressing_style = path\n")?;
        doc.upsert("default", &CREDENTIALS[2..]);
        assert_eq!(
            doc.to_string(),
            "[default]\naws_session_token = ijklmnop\ns3                =\n  addressing_style = path\n"
        );
        Ok(())
    }

    #[test]
    fn accepts_comment_after_header() -> Result<(), ParseError> {
        let text = "[work] # managed by sso\naws_access_key_id = A\n[home];mine\nregion = eu-west-1\n";
        let mut doc = Document::parse(text)?;
        assert_eq!(doc.section_names().collect::<Vec<_>>(), ["work", "home"]);
        assert_eq!(doc.to_string(), text);

        doc.upsert("work", &CREDENTIALS[1..2]);
        assert_eq!(
            doc.to_string(),
            "[work] # managed by sso\naws_access_key_id = 1234567890\n[home];mine\nregion = eu-west-1\n"
        );
        Ok(())
    }

    #[test]
    fn reports_line_numbers() {
        assert_eq!(
            Document::parse("[ok]\na = b\n[broken\n").err(),
            Some(ParseError::UnclosedHeader { line: 3 })
        );
        assert_eq!(
            Document::parse("[ok] trailing\n").err(),
            Some(ParseError::TrailingText { line: 1 })
        );
        assert_eq!(
            Document::parse("[ ]\n").err(),
            Some(ParseError::EmptySectionName { line: 1 })
        );
        assert_eq!(
            Document::parse("[ok]\n= value\n").err(),
            Some(ParseError::EmptyKey { line: 2 })
        );
        assert_eq!(
            Document::parse("[ok]\n\njust some words\n").err(),
            Some(ParseError::MissingDelimiter { line: 3 })
        );
    }
}
