//! Hand-rolled INI model used to merge config files
//!
//! The document keeps every line it does not understand (comments, blanks,
//! stray text) so that a merged file still reads like the one the fix
//! shipped with.

use std::fs;
use std::path::Path;

use crate::error::{QuickFixError, Result};
use crate::logging::Logger;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, PartialEq, Eq)]
enum IniLine {
    /// `lead` is the raw text up to where the value starts (`Key = `)
    Entry { key: String, lead: String, value: String },
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    /// `None` for keys that appear before the first header
    name: Option<String>,
    header: Option<String>,
    lines: Vec<IniLine>,
}

impl IniSection {
    fn leading() -> Self {
        Self {
            name: None,
            header: None,
            lines: Vec::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn find_entry_mut(&mut self, wanted: &str) -> Option<&mut IniLine> {
        self.lines
            .iter_mut()
            .rev()
            .find(|line| matches!(line, IniLine::Entry { key, .. } if key.eq_ignore_ascii_case(wanted)))
    }

    /// Index just past the last non-blank line
    fn append_position(&self) -> usize {
        let trailing_blanks = self
            .lines
            .iter()
            .rev()
            .take_while(|line| matches!(line, IniLine::Other(text) if text.trim().is_empty()))
            .count();
        self.lines.len() - trailing_blanks
    }

    fn ends_with_blank(&self) -> bool {
        match self.lines.last() {
            Some(IniLine::Other(text)) => text.trim().is_empty(),
            Some(IniLine::Entry { .. }) => false,
            None => self.header.is_none(),
        }
    }

    /// Key/value pairs in file order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            IniLine::Entry { key, value, .. } => Some((key.as_str(), value.as_str())),
            IniLine::Other(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<IniSection>,
    crlf: bool,
    had_bom: bool,
}

impl IniDocument {
    /// Parse INI text. Malformed section headers (an opening `[` with no
    /// closing `]`) are skipped together with their body; each one produces a
    /// warning in the returned list.
    pub fn parse(text: &str) -> (Self, Vec<String>) {
        let (text, had_bom) = match text.strip_prefix('\u{feff}') {
            Some(rest) => (rest, true),
            None => (text, false),
        };

        let mut warnings = Vec::new();
        let mut sections = vec![IniSection::leading()];
        let mut skipping = false;

        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();

            if trimmed.starts_with('[') {
                match trimmed.find(']') {
                    Some(end) => {
                        skipping = false;
                        sections.push(IniSection {
                            name: Some(trimmed[1..end].trim().to_string()),
                            header: Some(line.to_string()),
                            lines: Vec::new(),
                        });
                    }
                    None => {
                        skipping = true;
                        warnings.push(format!(
                            "Skipping malformed section header on line {}: {}",
                            idx + 1,
                            trimmed
                        ));
                    }
                }
                continue;
            }

            if skipping {
                continue;
            }

            let parsed = parse_line(line);
            if let Some(section) = sections.last_mut() {
                section.lines.push(parsed);
            }
        }

        let crlf = text.contains("\r\n");
        (
            Self {
                sections,
                crlf,
                had_bom,
            },
            warnings,
        )
    }

    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name() == Some(name))
    }

    /// Value of `key` in `section` (last occurrence wins)
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?
            .entries()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .last()
            .map(|(_, v)| v)
    }

    /// Layer `user` over `self`: every user key replaces or extends the
    /// matching section, and user sections missing here are appended.
    pub fn overlay(&mut self, user: &IniDocument) {
        for user_section in &user.sections {
            let existing = self
                .sections
                .iter_mut()
                .find(|s| s.name == user_section.name);

            match existing {
                Some(section) => {
                    for line in &user_section.lines {
                        let IniLine::Entry { key, lead, value } = line else {
                            continue;
                        };
                        if let Some(IniLine::Entry { value: current, .. }) = section.find_entry_mut(key) {
                            *current = value.clone();
                            continue;
                        }
                        let at = section.append_position();
                        section.lines.insert(
                            at,
                            IniLine::Entry {
                                key: key.clone(),
                                lead: lead.clone(),
                                value: value.clone(),
                            },
                        );
                    }
                }
                None => {
                    if let Some(last) = self.sections.last_mut() {
                        if !last.ends_with_blank() {
                            last.lines.push(IniLine::Other(String::new()));
                        }
                    }
                    self.sections.push(user_section.clone());
                }
            }
        }
    }

    pub fn render(&self) -> String {
        let newline = if self.crlf { "\r\n" } else { "\n" };
        let mut out = String::new();
        if self.had_bom {
            out.push('\u{feff}');
        }

        for section in &self.sections {
            if let Some(ref header) = section.header {
                out.push_str(header);
                out.push_str(newline);
            }
            for line in &section.lines {
                match line {
                    IniLine::Entry { lead, value, .. } => {
                        out.push_str(lead);
                        out.push_str(value);
                    }
                    IniLine::Other(text) => out.push_str(text),
                }
                out.push_str(newline);
            }
        }
        out
    }
}

fn parse_line(line: &str) -> IniLine {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
        return IniLine::Other(line.to_string());
    }

    let Some(eq) = line.find('=') else {
        return IniLine::Other(line.to_string());
    };

    let key = line[..eq].trim();
    if key.is_empty() {
        return IniLine::Other(line.to_string());
    }

    let rest = &line[eq + 1..];
    let value_start = eq + 1 + (rest.len() - rest.trim_start().len());
    IniLine::Entry {
        key: key.to_string(),
        lead: line[..value_start].to_string(),
        value: line[value_start..].trim_end().to_string(),
    }
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    let had_bom = bytes.starts_with(UTF8_BOM);
    let body = if had_bom { &bytes[3..] } else { &bytes[..] };

    let text = String::from_utf8(body.to_vec()).map_err(|e| QuickFixError::ConfigMerge {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(if had_bom { format!("\u{feff}{}", text) } else { text })
}

/// Merge the freshly extracted config at `incoming` into the user's file at
/// `existing`. The incoming file provides the layout and any new keys; the
/// user's values win on conflict. The result overwrites `existing`.
pub fn merge_config_files(existing: &Path, incoming: &Path, log: &Logger) -> Result<()> {
    let user_text = read_text(existing)?;
    let new_text = read_text(incoming)?;

    let (user_doc, user_warnings) = IniDocument::parse(&user_text);
    for warning in user_warnings {
        log.warning(&format!("{}: {}", existing.display(), warning));
    }
    let (mut merged, new_warnings) = IniDocument::parse(&new_text);
    for warning in new_warnings {
        log.warning(&format!("{} (incoming): {}", existing.display(), warning));
    }

    merged.overlay(&user_doc);
    fs::write(existing, merged.render())?;
    log.debug(&format!("Merged config file: {}", existing.display()));
    Ok(())
}
