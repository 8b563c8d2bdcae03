//! Namespace-aware XML decoding into an owned element tree.
//!
//! OAI-PMH endpoints in the wild emit a fair amount of broken markup
//! (unescaped ampersands, mismatched end tags, truncated bodies). The decoder
//! therefore runs in one of two explicit modes:
//!
//! - [`ParseMode::Strict`] - any syntax error fails the whole document.
//! - [`ParseMode::Recover`] - mismatched end tags are ignored, undecodable
//!   text and attribute values are kept verbatim, and on a hard syntax error
//!   the tree built so far is kept with every open element closed.
//!
//! Recovery accepts data a strict parser would reject, so callers opt into
//! it; nothing here chooses it for them.
//!
//! # Example
//!
//! ```
//! use harvester_core::xml::{ParseMode, parse_document};
//!
//! let root = parse_document(b"<a><b>one</b><b>two</b></a>", ParseMode::Strict).unwrap();
//! let texts: Vec<&str> = root.children_named(None, "b").map(|b| b.text()).collect();
//! assert_eq!(texts, vec!["one", "two"]);
//! ```

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use thiserror::Error;
use tracing::warn;

/// How the decoder reacts to malformed markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Reject the document on the first syntax error.
    #[default]
    Strict,
    /// Salvage whatever structure is recoverable.
    Recover,
}

impl ParseMode {
    /// Returns `Recover` when `tolerant` is set, otherwise `Strict`.
    #[must_use]
    pub fn from_tolerant(tolerant: bool) -> Self {
        if tolerant { Self::Recover } else { Self::Strict }
    }

    /// Returns true for [`ParseMode::Recover`].
    #[must_use]
    pub fn is_recover(self) -> bool {
        self == Self::Recover
    }
}

/// Errors produced while decoding a document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum XmlError {
    /// The markup is malformed at the given byte offset.
    #[error("malformed XML at byte {position}: {message}")]
    Syntax {
        /// Byte offset reported by the reader.
        position: u64,
        /// Reader diagnostic.
        message: String,
    },

    /// Nothing resembling a root element could be read.
    #[error("document has no root element")]
    NoRootElement,
}

/// One element of a decoded document.
///
/// Names are stored as local names; the namespace URI (when the prefix was
/// bound) is stored separately so lookups never depend on prefix spelling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    namespace: Option<String>,
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    /// Creates an element with the given namespace URI and local name.
    #[must_use]
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style helper that sets the direct text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Builder-style helper that appends a child element.
    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Builder-style helper that adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Namespace URI the element's prefix resolved to, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Local (unprefixed) element name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct text content, concatenated across text and CDATA nodes.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Direct text content trimmed, or `None` when it is empty or whitespace.
    #[must_use]
    pub fn trimmed_text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Value of the attribute with the given local name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct children in document order.
    #[must_use]
    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    /// Returns true when the element has this namespace and local name.
    ///
    /// A `None` namespace matches elements in any namespace.
    #[must_use]
    pub fn is(&self, namespace: Option<&str>, name: &str) -> bool {
        self.name == name && namespace.is_none_or(|ns| self.namespace.as_deref() == Some(ns))
    }

    /// First direct child matching namespace and local name.
    #[must_use]
    pub fn child(&self, namespace: Option<&str>, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.is(namespace, name))
    }

    /// Direct children matching namespace and local name, in document order.
    pub fn children_named<'a>(
        &'a self,
        namespace: Option<&'a str>,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children
            .iter()
            .filter(move |child| child.is(namespace, name))
    }

    /// First element in a pre-order walk (self included) matching namespace and name.
    #[must_use]
    pub fn find_descendant(&self, namespace: Option<&str>, name: &str) -> Option<&XmlElement> {
        if self.is(namespace, name) {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_descendant(namespace, name))
    }

    /// All elements in a pre-order walk (self included) matching namespace and name.
    ///
    /// Matches are not searched for nested matches of their own.
    #[must_use]
    pub fn find_descendants(&self, namespace: Option<&str>, name: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        self.collect_descendants(namespace, name, &mut found);
        found
    }

    fn collect_descendants<'a>(
        &'a self,
        namespace: Option<&str>,
        name: &str,
        found: &mut Vec<&'a XmlElement>,
    ) {
        if self.is(namespace, name) {
            found.push(self);
            return;
        }
        for child in &self.children {
            child.collect_descendants(namespace, name, found);
        }
    }
}

/// Upper bound on markup fragments escaped while recovering one document.
const MAX_REPAIRS: usize = 64;

/// A decoded document and whether every byte of it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    /// Root element (closed off when the input ended early).
    pub root: XmlElement,
    /// False when [`ParseMode::Recover`] had to stop at unrecoverable
    /// markup; anything after that point is missing from `root`.
    pub complete: bool,
}

/// Decodes `bytes` into the document's root element.
///
/// # Errors
///
/// Returns [`XmlError::Syntax`] on malformed markup in [`ParseMode::Strict`],
/// and [`XmlError::NoRootElement`] when no element could be read at all.
pub fn parse_document(bytes: &[u8], mode: ParseMode) -> Result<XmlElement, XmlError> {
    decode(bytes, mode).map(|document| document.root)
}

/// Decodes `bytes`, reporting whether the whole input was read.
///
/// In [`ParseMode::Recover`] a markup fragment the reader rejects is escaped
/// to text and the document is read again, so the elements after it survive.
/// After a bounded number of such fragments the structure read so far is kept and
/// the result is marked incomplete.
///
/// # Errors
///
/// Same as [`parse_document`].
pub fn decode(bytes: &[u8], mode: ParseMode) -> Result<ParsedDocument, XmlError> {
    let mut input = Cow::Borrowed(bytes);
    let mut repairs = 0;

    loop {
        let (root, interrupted) = read_tree(&input, mode)?;
        let Some(interrupted) = interrupted else {
            let root = root.ok_or(XmlError::NoRootElement)?;
            return Ok(ParsedDocument {
                root,
                complete: true,
            });
        };

        let repaired = (repairs < MAX_REPAIRS)
            .then(|| escape_markup_at(&input, interrupted.position))
            .flatten();
        match repaired {
            Some(next) => {
                repairs += 1;
                warn!(
                    position = interrupted.position,
                    error = %interrupted.message,
                    "escaping malformed markup and reading the document again"
                );
                input = Cow::Owned(next);
            }
            None => {
                warn!(
                    position = interrupted.position,
                    error = %interrupted.message,
                    repairs,
                    "malformed XML; keeping the structure read so far"
                );
                let root = root.ok_or(XmlError::NoRootElement)?;
                return Ok(ParsedDocument {
                    root,
                    complete: false,
                });
            }
        }
    }
}

/// Where a recover-mode read stopped.
struct Interrupted {
    position: usize,
    message: String,
}

fn read_tree(
    bytes: &[u8],
    mode: ParseMode,
) -> Result<(Option<XmlElement>, Option<Interrupted>), XmlError> {
    let mut reader = NsReader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = !mode.is_recover();

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut interrupted = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_resolved_event_into(&mut buf);
        match event {
            Ok((ns, Event::Start(start))) => {
                let element = open_element(namespace_uri(&ns), &start, mode)?;
                stack.push(element);
            }
            Ok((ns, Event::Empty(start))) => {
                let element = open_element(namespace_uri(&ns), &start, mode)?;
                attach(&mut stack, &mut root, element);
            }
            Ok((_, Event::End(end))) => {
                let local = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                close_element(&mut stack, &mut root, &local);
            }
            Ok((_, Event::Text(text))) => {
                if let Some(current) = stack.last_mut() {
                    let decoded = match text.unescape() {
                        Ok(decoded) => decoded.into_owned(),
                        Err(err) if mode.is_recover() => {
                            warn!(error = %err, "keeping undecodable XML text verbatim");
                            String::from_utf8_lossy(&text).into_owned()
                        }
                        Err(err) => return Err(syntax_error(reader.buffer_position(), &err)),
                    };
                    current.text.push_str(&decoded);
                }
            }
            Ok((_, Event::CData(cdata))) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(err) => {
                if !mode.is_recover() {
                    return Err(syntax_error(reader.buffer_position(), &err));
                }
                interrupted = Some(Interrupted {
                    position: usize::try_from(reader.error_position()).unwrap_or(usize::MAX),
                    message: err.to_string(),
                });
                break;
            }
        }
        buf.clear();
    }

    if !stack.is_empty() && !mode.is_recover() {
        return Err(XmlError::Syntax {
            position: reader.buffer_position(),
            message: format!("{} element(s) left unclosed", stack.len()),
        });
    }
    while let Some(element) = stack.pop() {
        attach(&mut stack, &mut root, element);
    }

    Ok((root, interrupted))
}

/// Replaces the `<` that opens the markup at `position` with `&lt;`.
///
/// Returns `None` when no `<` precedes `position`.
fn escape_markup_at(bytes: &[u8], position: usize) -> Option<Vec<u8>> {
    let last = bytes.len().checked_sub(1)?;
    let open = bytes[..=position.min(last)].iter().rposition(|&b| b == b'<')?;

    let mut escaped = Vec::with_capacity(bytes.len() + 3);
    escaped.extend_from_slice(&bytes[..open]);
    escaped.extend_from_slice(b"&lt;");
    escaped.extend_from_slice(&bytes[open + 1..]);
    Some(escaped)
}

fn namespace_uri(resolved: &ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        ResolveResult::Unbound | ResolveResult::Unknown(_) => None,
    }
}

fn open_element(
    namespace: Option<String>,
    start: &BytesStart<'_>,
    mode: ParseMode,
) -> Result<XmlElement, XmlError> {
    let mut element = XmlElement {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        ..XmlElement::default()
    };

    for attribute in start.attributes().with_checks(!mode.is_recover()) {
        let attribute = match attribute {
            Ok(attribute) => attribute,
            Err(err) if mode.is_recover() => {
                warn!(element = %element.name, error = %err, "skipping malformed attribute");
                continue;
            }
            Err(err) => {
                return Err(XmlError::Syntax {
                    position: 0,
                    message: err.to_string(),
                });
            }
        };
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = match attribute.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) if mode.is_recover() => String::from_utf8_lossy(&attribute.value).into_owned(),
            Err(err) => {
                return Err(XmlError::Syntax {
                    position: 0,
                    message: err.to_string(),
                });
            }
        };
        element.attributes.push((key, value));
    }

    Ok(element)
}

/// Pops the innermost open element named `local` (and anything opened inside
/// it). End tags that match nothing on the stack are ignored.
fn close_element(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, local: &str) {
    let Some(depth) = stack.iter().rposition(|open| open.name == local) else {
        return;
    };
    while stack.len() > depth {
        if let Some(element) = stack.pop() {
            attach(stack, root, element);
        }
    }
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}

fn syntax_error(position: u64, err: &impl std::fmt::Display) -> XmlError {
    XmlError::Syntax {
        position,
        message: err.to_string(),
    }
}
