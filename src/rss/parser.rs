//! Feed normalization for RSS 2.0 and Atom documents.
//!
//! The root element decides the dialect. RSS items are read from
//! `<rss><channel><item>`, Atom entries from `<feed><entry>`; both end up as
//! [`FeedItem`]s in document order. Only children that share the root's
//! namespace prefix are read, so extension elements such as `media:title`
//! or `atom:link` inside an RSS item are ignored. When a field element
//! repeats, the first occurrence wins.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

use super::types::{FeedError, FeedFormat, FeedItem};
use crate::TARGET_WEB_REQUEST;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    Published,
}

#[derive(Debug)]
struct OpenElement {
    local: String,
    prefix: Option<String>,
}

#[derive(Debug, Default)]
struct AtomLink {
    rel: Option<String>,
    href: String,
}

#[derive(Debug, Default)]
struct ItemBuilder {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    published: Option<String>,
    atom_links: Vec<AtomLink>,
}

impl ItemBuilder {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::Published => &mut self.published,
        }
    }

    fn build(self) -> FeedItem {
        let link = match self.link {
            Some(link) => link,
            None => pick_atom_link(self.atom_links),
        };

        FeedItem {
            title: self.title.unwrap_or_default(),
            link,
            description: self.description.filter(|d| !d.is_empty()),
            pub_date: self.published.filter(|d| !d.trim().is_empty()),
        }
    }
}

/// Prefers `rel="alternate"` or a link without `rel`, then the first link.
fn pick_atom_link(links: Vec<AtomLink>) -> String {
    let preferred = links
        .iter()
        .position(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"));

    match preferred {
        Some(index) => links.into_iter().nth(index).map(|l| l.href).unwrap_or_default(),
        None => links.into_iter().next().map(|l| l.href).unwrap_or_default(),
    }
}

/// Parses a preprocessed feed document into canonical items.
pub fn normalize(xml: &[u8]) -> Result<Vec<FeedItem>, FeedError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut format: Option<FeedFormat> = None;
    let mut root_prefix: Option<String> = None;

    let mut items = Vec::new();
    let mut current: Option<ItemBuilder> = None;
    // The field being captured and the stack depth of its element.
    let mut capture: Option<(Field, usize)> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(malformed)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let element = open_element(e);

                match format {
                    None => {
                        let fmt = FeedFormat::from_root(&element.local)
                            .ok_or_else(|| FeedError::UnknownFormat(element.local.clone()))?;
                        debug!(target: TARGET_WEB_REQUEST, "Detected {:?} feed", fmt);
                        format = Some(fmt);
                        root_prefix = element.prefix.clone();
                    }
                    Some(fmt) => {
                        let in_namespace = element.prefix == root_prefix;
                        let depth = stack.len();

                        if in_namespace && is_item_start(fmt, &stack, &element.local, &root_prefix) {
                            if is_empty {
                                items.push(ItemBuilder::default().build());
                            } else {
                                current = Some(ItemBuilder::default());
                            }
                        } else if let Some(item) = current.as_mut() {
                            // Direct children of the open item only.
                            if in_namespace && depth == item_depth(fmt) && capture.is_none() {
                                if fmt == FeedFormat::Atom && element.local == "link" {
                                    item.atom_links.push(atom_link(e)?);
                                } else if let Some(field) = field_for(fmt, &element.local) {
                                    let slot = item.slot(field);
                                    if slot.is_none() {
                                        *slot = Some(String::new());
                                        if !is_empty {
                                            capture = Some((field, depth + 1));
                                        }
                                    }
                                }
                            }
                        }
                    }
                }

                if !is_empty {
                    stack.push(element);
                }
            }
            Event::End(_) => {
                let depth = stack.len();
                if matches!(capture, Some((_, d)) if d == depth) {
                    capture = None;
                }
                if let Some(fmt) = format {
                    if depth == item_depth(fmt) {
                        if let Some(item) = current.take() {
                            items.push(item.build());
                        }
                    }
                }
                stack.pop();
            }
            Event::Text(ref e) => {
                let text = e.unescape().map_err(malformed)?;
                append_captured(&mut current, capture, stack.len(), &text);
            }
            Event::CData(ref e) => {
                let text = reader.decoder().decode(e).map_err(malformed)?;
                append_captured(&mut current, capture, stack.len(), &text);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if format.is_none() {
        return Err(FeedError::Malformed("document has no root element".to_string()));
    }
    if !stack.is_empty() {
        return Err(FeedError::Malformed(format!(
            "unexpected end of document inside <{}>",
            stack.last().map(|e| e.local.as_str()).unwrap_or_default()
        )));
    }

    Ok(items)
}

fn malformed<E: std::fmt::Display>(err: E) -> FeedError {
    FeedError::Malformed(err.to_string())
}

fn open_element(e: &BytesStart<'_>) -> OpenElement {
    let name = e.name();
    OpenElement {
        local: String::from_utf8_lossy(name.local_name().as_ref()).into_owned(),
        prefix: name
            .prefix()
            .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned()),
    }
}

/// Stack length while an open item is the innermost element (root = 1).
fn item_depth(fmt: FeedFormat) -> usize {
    match fmt {
        FeedFormat::Rss => 3,
        FeedFormat::Atom => 2,
    }
}

fn is_item_start(
    fmt: FeedFormat,
    stack: &[OpenElement],
    local: &str,
    root_prefix: &Option<String>,
) -> bool {
    match fmt {
        FeedFormat::Rss => {
            local == "item"
                && stack.len() == 2
                && stack[1].local == "channel"
                && stack[1].prefix == *root_prefix
        }
        FeedFormat::Atom => local == "entry" && stack.len() == 1,
    }
}

fn field_for(fmt: FeedFormat, local: &str) -> Option<Field> {
    match (fmt, local) {
        (_, "title") => Some(Field::Title),
        (FeedFormat::Rss, "link") => Some(Field::Link),
        (FeedFormat::Rss, "description") => Some(Field::Description),
        (FeedFormat::Rss, "pubDate") => Some(Field::Published),
        (FeedFormat::Atom, "summary") => Some(Field::Description),
        (FeedFormat::Atom, "published") => Some(Field::Published),
        _ => None,
    }
}

fn atom_link(e: &BytesStart<'_>) -> Result<AtomLink, FeedError> {
    let mut link = AtomLink::default();
    for attr in e.attributes() {
        let attr = attr.map_err(malformed)?;
        let value = attr.unescape_value().map_err(malformed)?;
        match attr.key.local_name().as_ref() {
            b"href" => link.href = value.into_owned(),
            b"rel" => link.rel = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(link)
}

/// Text counts only when it sits directly inside the captured field element.
fn append_captured(
    current: &mut Option<ItemBuilder>,
    capture: Option<(Field, usize)>,
    depth: usize,
    text: &str,
) {
    if let (Some(item), Some((field, field_depth))) = (current.as_mut(), capture) {
        if depth == field_depth {
            item.slot(field).get_or_insert_with(String::new).push_str(text);
        }
    }
}
