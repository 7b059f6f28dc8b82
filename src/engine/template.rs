//! Command templating: render a leaf path (or a catalog id) into a command string.
//!
//! A template holds 0..=4 `%s` placeholders; `%%` is a literal percent sign. The
//! template is parsed once into literal segments, so rendering is plain concatenation
//! and a leaf containing `%` is never re-interpreted. Leaves are raw catalog bytes and
//! reach the command unchanged, valid UTF-8 or not.

use std::ffi::OsString;

use crate::engine::tools::bytes_to_os_string;
use crate::error::TemplateError;

/// Number of `%s` placeholders in a template.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Zero,
    One,
    Two,
    Three,
    Four,
}

impl Arity {
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            0 => Some(Arity::Zero),
            1 => Some(Arity::One),
            2 => Some(Arity::Two),
            3 => Some(Arity::Three),
            4 => Some(Arity::Four),
            _ => None,
        }
    }

    pub fn count(self) -> usize {
        match self {
            Arity::Zero => 0,
            Arity::One => 1,
            Arity::Two => 2,
            Arity::Three => 3,
            Arity::Four => 4,
        }
    }
}

/// Split `template` into literal segments around `%s`. Returns `count + 1` segments.
fn parse_segments(template: &str) -> Result<Vec<String>, TemplateError> {
    let mut segments = Vec::with_capacity(2);
    let mut current = String::with_capacity(template.len());
    let mut chars = template.char_indices();
    while let Some((pos, c)) = chars.next() {
        if c != '%' {
            current.push(c);
            continue;
        }
        match chars.next() {
            Some((_, 's')) => segments.push(std::mem::take(&mut current)),
            Some((_, '%')) => current.push('%'),
            _ => {
                return Err(TemplateError::Malformed {
                    template: template.to_string(),
                    position: pos,
                });
            }
        }
    }
    segments.push(current);
    Ok(segments)
}

/// Immutable command template with its arity resolved at construction.
#[derive(Clone, Debug)]
pub struct CommandTemplate {
    template: String,
    arity: Arity,
    segments: Vec<String>,
    max_len: usize,
}

impl CommandTemplate {
    /// Parse `template`. Rendered commands longer than `max_len` bytes are rejected.
    pub fn new(template: &str, max_len: usize) -> Result<Self, TemplateError> {
        if template.trim().is_empty() {
            return Err(TemplateError::Empty);
        }
        let segments = parse_segments(template)?;
        let count = segments.len() - 1;
        let arity = Arity::from_count(count).ok_or_else(|| TemplateError::TooManyPlaceholders {
            template: template.to_string(),
            count,
        })?;
        Ok(Self {
            template: template.to_string(),
            arity,
            segments,
            max_len,
        })
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    fn rendered_len(&self, leaf: &[u8]) -> usize {
        match self.arity {
            // template + " '" + leaf + "'"
            Arity::Zero => self.template.len() + leaf.len() + 3,
            k => self.segments.iter().map(String::len).sum::<usize>() + k.count() * leaf.len(),
        }
    }

    fn render_bytes(&self, leaf: &[u8]) -> Result<Vec<u8>, TemplateError> {
        if leaf.contains(&b'\'') {
            return Err(TemplateError::SingleQuote {
                leaf: String::from_utf8_lossy(leaf).into_owned(),
            });
        }
        let len = self.rendered_len(leaf);
        if len > self.max_len {
            return Err(TemplateError::TooLong {
                leaf: String::from_utf8_lossy(leaf).into_owned(),
                len,
                max: self.max_len,
            });
        }
        let mut out = Vec::with_capacity(len);
        match self.arity {
            Arity::Zero => {
                out.extend_from_slice(self.template.as_bytes());
                out.extend_from_slice(b" '");
                out.extend_from_slice(leaf);
                out.push(b'\'');
            }
            _ => {
                for (i, segment) in self.segments.iter().enumerate() {
                    if i > 0 {
                        out.extend_from_slice(leaf);
                    }
                    out.extend_from_slice(segment.as_bytes());
                }
            }
        }
        Ok(out)
    }

    /// Render `leaf` into the template. Zero placeholders appends the quoted leaf,
    /// otherwise every placeholder receives the same leaf.
    pub fn render(&self, leaf: impl AsRef<[u8]>) -> Result<OsString, TemplateError> {
        self.render_bytes(leaf.as_ref()).map(bytes_to_os_string)
    }
}

/// Follow-up statement run once per object with its numeric catalog id.
#[derive(Clone, Debug)]
pub struct StatementTemplate {
    inner: CommandTemplate,
}

impl StatementTemplate {
    /// Parse `template`; it must hold at least one `%s` for the id.
    pub fn new(template: &str, max_len: usize) -> Result<Self, TemplateError> {
        let inner = CommandTemplate::new(template, max_len)?;
        if inner.arity() == Arity::Zero {
            return Err(TemplateError::MissingPlaceholder {
                template: template.to_string(),
            });
        }
        Ok(Self { inner })
    }

    pub fn render(&self, id: i64) -> Result<String, TemplateError> {
        let bytes = self.inner.render_bytes(id.to_string().as_bytes())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }
}
