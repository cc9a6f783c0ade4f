//! Hand-rolled VDF (Valve Data Format) reader
//!
//! Enough of the format for `appmanifest_*.acf` and `libraryfolders.vdf`:
//! quoted keys and values, nested `{}` objects, `//` comments and backslash
//! escapes. Key lookups ignore ASCII case.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VdfValue {
    String(String),
    /// Children in file order
    Object(Vec<(String, VdfValue)>),
}

impl VdfValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            VdfValue::String(s) => Some(s),
            VdfValue::Object(_) => None,
        }
    }

    pub fn children(&self) -> &[(String, VdfValue)] {
        match self {
            VdfValue::Object(children) => children,
            VdfValue::String(_) => &[],
        }
    }

    pub fn get(&self, key: &str) -> Option<&VdfValue> {
        self.children()
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }
}

/// Parse VDF text into its root object
pub fn parse_vdf(content: &str) -> Option<VdfValue> {
    let mut chars = content.chars().peekable();
    parse_object(&mut chars, false)
}

fn parse_object(chars: &mut Peekable<Chars<'_>>, nested: bool) -> Option<VdfValue> {
    let mut children = Vec::new();

    loop {
        skip_trivia(chars);
        match chars.peek() {
            None if nested => return None,
            None => break,
            Some('}') => {
                chars.next();
                break;
            }
            Some('"') => {
                let key = parse_quoted(chars)?;
                skip_trivia(chars);
                let value = match chars.peek() {
                    Some('"') => VdfValue::String(parse_quoted(chars)?),
                    Some('{') => {
                        chars.next();
                        parse_object(chars, true)?
                    }
                    _ => return None,
                };
                children.push((key, value));
            }
            Some(_) => {
                chars.next();
            }
        }
    }

    Some(VdfValue::Object(children))
}

fn parse_quoted(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    if chars.next() != Some('"') {
        return None;
    }

    let mut out = String::new();
    loop {
        match chars.next()? {
            '"' => return Some(out),
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                '\\' => out.push('\\'),
                '"' => out.push('"'),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            },
            c => out.push(c),
        }
    }
}

fn skip_trivia(chars: &mut Peekable<Chars<'_>>) {
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let mut lookahead = chars.clone();
        if lookahead.next() == Some('/') && lookahead.next() == Some('/') {
            while chars.peek().is_some_and(|c| *c != '\n') {
                chars.next();
            }
            continue;
        }
        break;
    }
}

/// The fields of `appmanifest_<appid>.acf` QuickFix needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppManifest {
    pub app_id: u32,
    pub name: Option<String>,
    pub install_dir: String,
}

impl AppManifest {
    pub fn from_vdf(content: &str) -> Option<Self> {
        let root = parse_vdf(content)?;
        let state = root.get("AppState")?;

        Some(Self {
            app_id: state.get_str("appid")?.trim().parse().ok()?,
            name: state.get_str("name").map(String::from),
            install_dir: state.get_str("installdir")?.to_string(),
        })
    }
}

/// Library root paths listed in `libraryfolders.vdf`, in file order.
///
/// Handles both the current layout (`"0" { "path" "..." }`) and the old one
/// where the index maps straight to the path.
pub fn parse_library_folders(content: &str) -> Vec<String> {
    let Some(root) = parse_vdf(content) else {
        return Vec::new();
    };
    let Some(folders) = root.get("libraryfolders") else {
        return Vec::new();
    };

    folders
        .children()
        .iter()
        .filter(|(key, _)| key.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|(_, value)| match value {
            VdfValue::String(path) => Some(path.clone()),
            VdfValue::Object(_) => value.get_str("path").map(String::from),
        })
        .collect()
}
