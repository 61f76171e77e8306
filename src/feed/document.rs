//! XML parser adapter: raw feed text to a navigable element tree.
//!
//! The tree is built from `quick-xml` events and exposed to the rest of the
//! pipeline only through the [`FeedNode`] trait, so extraction never depends
//! on the concrete representation.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth. Real feeds stay well below this;
/// anything deeper is treated as hostile input.
const MAX_DEPTH: usize = 256;

/// A feed document could not be turned into an element tree.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The tokenizer rejected the input.
    #[error("XML parse error: {0}")]
    Xml(String),
    /// An end tag closed something other than the innermost open element.
    #[error("Mismatched end tag: expected </{expected}>, found </{found}>")]
    MismatchedEnd { expected: String, found: String },
    /// Input ended while elements were still open.
    #[error("Unclosed element <{0}> at end of document")]
    UnclosedElement(String),
    /// The input contained no element at all.
    #[error("Document has no root element")]
    NoRootElement,
    /// A second element or non-blank text sits beside the root element.
    #[error("Content outside root element <{0}>")]
    ContentOutsideRoot(String),
    /// SEC-003: Nesting exceeded [`MAX_DEPTH`].
    #[error("Element nesting exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

/// Read-only navigation over a parsed feed.
///
/// Tag and attribute queries take sets of names and match any of them. A
/// query containing `:` (`media:content`) matches the qualified name
/// exactly; an unprefixed query (`content`) only matches unprefixed
/// elements, so RSS, Atom and extension vocabularies can be told apart
/// without namespace resolution.
pub trait FeedNode {
    /// All descendants whose name matches any of `tags`, in document order.
    fn find_all(&self, tags: &[&str]) -> Vec<&Self>;

    /// First direct child whose name matches any of `tags`.
    fn child(&self, tags: &[&str]) -> Option<&Self>;

    /// Concatenated text of this node and all of its descendants.
    fn text(&self) -> String;

    /// First present, non-empty attribute among `names`.
    fn attribute(&self, names: &[&str]) -> Option<&str>;

    /// Qualified name of this node, e.g. `item` or `media:thumbnail`.
    fn name(&self) -> &str;

    /// Trimmed text of the first descendant named by `tags`, trying the
    /// tags in priority order and skipping elements with blank text.
    fn first_text(&self, tags: &[&str]) -> Option<String> {
        tags.iter().find_map(|tag| {
            self.find_all(&[*tag])
                .into_iter()
                .map(|node| node.text().trim().to_owned())
                .find(|text| !text.is_empty())
        })
    }

    /// Trimmed text of the first non-blank descendant named by any of
    /// `tags`, in document order regardless of the order of `tags`.
    fn first_text_in_order(&self, tags: &[&str]) -> Option<String> {
        self.find_all(tags)
            .into_iter()
            .map(|node| node.text().trim().to_owned())
            .find(|text| !text.is_empty())
    }
}

/// One XML element with its attributes and children.
#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Text(String),
}

/// A parsed feed document. Immutable once built.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
}

fn name_matches(name: &str, query: &str) -> bool {
    if query.contains(':') {
        name == query
    } else {
        !name.contains(':') && name == query
    }
}

impl Element {
    fn new(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();

        for attr in start.attributes() {
            let attr = match attr {
                Ok(attr) => attr,
                Err(e) => {
                    tracing::debug!(element = %name, error = %e, "Skipping malformed attribute");
                    continue;
                }
            };
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            // SEC-002: only the five XML builtins and character references are
            // resolved; anything else is kept as raw text, never expanded.
            let value = match attr.decode_and_unescape_value(reader.decoder()) {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            attributes.push((key, value));
        }

        Self {
            name,
            attributes,
            children: Vec::new(),
        }
    }

    fn collect_matching<'a>(&'a self, tags: &[&str], out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if let Node::Element(el) = child {
                if tags.iter().any(|t| name_matches(&el.name, t)) {
                    out.push(el);
                }
                el.collect_matching(tags, out);
            }
        }
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(el) => el.collect_text(out),
            }
        }
    }
}

impl FeedNode for Element {
    fn find_all(&self, tags: &[&str]) -> Vec<&Self> {
        let mut out = Vec::new();
        self.collect_matching(tags, &mut out);
        out
    }

    fn child(&self, tags: &[&str]) -> Option<&Self> {
        self.children.iter().find_map(|c| match c {
            Node::Element(el) if tags.iter().any(|t| name_matches(&el.name, t)) => Some(el),
            _ => None,
        })
    }

    fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn attribute(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|wanted| {
            self.attributes
                .iter()
                .find(|(key, value)| key == wanted && !value.trim().is_empty())
                .map(|(_, value)| value.trim())
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Document {
    /// Parses raw feed text.
    ///
    /// Works for RSS 2.0, RSS 1.0 (RDF) and Atom alike; nothing about the
    /// vocabulary is assumed here.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the tokenizer fails, tags are mismatched
    /// or left open, nesting is too deep, or there is not exactly one root
    /// element with nothing but whitespace around it.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = Reader::from_str(text);
        // End names are checked against our own stack to report both sides.
        reader.config_mut().check_end_names = false;

        // Synthetic container so text and elements share one code path.
        let mut stack: Vec<Element> = vec![Element {
            name: String::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }];

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    if stack.len() > MAX_DEPTH {
                        return Err(ParseError::MaxDepthExceeded(MAX_DEPTH));
                    }
                    stack.push(Element::new(&e, &reader));
                }
                Ok(Event::Empty(e)) => {
                    let el = Element::new(&e, &reader);
                    push_child(&mut stack, Node::Element(el));
                }
                Ok(Event::End(e)) => {
                    let found = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if stack.len() < 2 {
                        return Err(ParseError::MismatchedEnd {
                            expected: String::new(),
                            found,
                        });
                    }
                    let el = stack.pop().ok_or(ParseError::NoRootElement)?;
                    if el.name != found {
                        return Err(ParseError::MismatchedEnd {
                            expected: el.name,
                            found,
                        });
                    }
                    push_child(&mut stack, Node::Element(el));
                }
                Ok(Event::Text(e)) => {
                    let text = match e.unescape() {
                        Ok(t) => t.into_owned(),
                        Err(err) => {
                            tracing::debug!(error = %err, "Keeping unresolved entity as raw text");
                            String::from_utf8_lossy(&e).into_owned()
                        }
                    };
                    push_child(&mut stack, Node::Text(text));
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    push_child(&mut stack, Node::Text(text));
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(ParseError::Xml(e.to_string())),
                // Declarations, comments, processing instructions, DOCTYPE
                _ => {}
            }
        }

        if stack.len() > 1 {
            let open = stack.pop().map(|el| el.name).unwrap_or_default();
            return Err(ParseError::UnclosedElement(open));
        }

        let container = stack.pop().ok_or(ParseError::NoRootElement)?;
        let mut root = None;
        let mut stray = false;
        for node in container.children {
            match node {
                Node::Element(el) if root.is_none() => root = Some(el),
                Node::Element(_) => stray = true,
                Node::Text(t) => stray |= !t.trim().is_empty(),
            }
        }

        let root = root.ok_or(ParseError::NoRootElement)?;
        if stray {
            return Err(ParseError::ContentOutsideRoot(root.name));
        }

        Ok(Self { root })
    }

    /// The document element (`rss`, `feed`, `rdf:RDF`, ...).
    pub fn root(&self) -> &Element {
        &self.root
    }
}

fn push_child(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}
