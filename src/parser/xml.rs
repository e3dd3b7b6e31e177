use html_escape::decode_html_entities;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::app::{NewsdeskError, Result};
use crate::domain::FeedEntry;
use crate::parser::parse_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Rss,
    Rdf,
    Atom,
}

impl Dialect {
    fn from_root(local_name: &[u8]) -> Option<Self> {
        match local_name {
            b"rss" => Some(Self::Rss),
            b"RDF" => Some(Self::Rdf),
            b"feed" => Some(Self::Atom),
            _ => None,
        }
    }

    fn entry_tag(self) -> &'static [u8] {
        match self {
            Self::Rss | Self::Rdf => b"item",
            Self::Atom => b"entry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Published,
    Updated,
    MediaText,
    Encoded,
    Description,
    Content,
}

impl Field {
    /// HTML-bearing fields keep nested markup so `<img src>` survives.
    fn keeps_markup(self) -> bool {
        matches!(self, Self::Encoded | Self::Description | Self::Content)
    }
}

struct Capture {
    field: Field,
    depth: usize,
    buf: String,
}

impl Capture {
    /// `media:content` children (credit, title, ...) are metadata, not the URL.
    fn accepts_text_at(&self, depth: usize) -> bool {
        self.field != Field::MediaText || depth == self.depth
    }
}

#[derive(Default)]
struct EntryBuilder {
    title: Option<String>,
    link: Option<String>,
    fallback_link: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    enclosure_url: Option<String>,
    media_content_url: Option<String>,
    media_thumbnail_url: Option<String>,
    media_text: Option<String>,
    encoded_content: Option<String>,
    description: Option<String>,
    content: Option<String>,
}

impl EntryBuilder {
    fn set(&mut self, field: Field, value: String) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::MediaText => &mut self.media_text,
            Field::Encoded => &mut self.encoded_content,
            Field::Description => &mut self.description,
            Field::Content => &mut self.content,
        };
        // First occurrence wins.
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }

    fn atom_link(&mut self, e: &BytesStart) {
        let Some(href) = attr(e, b"href") else {
            return;
        };
        match attr(e, b"rel").as_deref() {
            None | Some("alternate") => {
                if self.link.is_none() {
                    self.link = Some(href);
                }
            }
            Some("enclosure") => {
                if self.enclosure_url.is_none() {
                    self.enclosure_url = Some(href);
                }
            }
            Some(_) => {
                if self.fallback_link.is_none() {
                    self.fallback_link = Some(href);
                }
            }
        }
    }

    fn media(&mut self, e: &BytesStart) {
        let slot = match e.name().as_ref() {
            b"enclosure" => &mut self.enclosure_url,
            b"media:content" => &mut self.media_content_url,
            b"media:thumbnail" => &mut self.media_thumbnail_url,
            _ => return,
        };
        if slot.is_none() {
            *slot = attr(e, b"url");
        }
    }

    fn build(self) -> FeedEntry {
        let published_at = self
            .published
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.updated.as_deref().and_then(parse_timestamp));

        FeedEntry {
            title: self.title,
            link: self.link.or(self.fallback_link),
            published_at,
            enclosure_url: self.enclosure_url,
            media_url: self.media_content_url.or(self.media_thumbnail_url),
            media_text: self.media_text,
            encoded_content: self.encoded_content,
            description: self.description,
            content: self.content,
        }
    }
}

fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    let mut attributes = e.attributes();
    attributes.with_checks(false);
    attributes
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| decode_html_entities(&String::from_utf8_lossy(&a.value)).trim().to_string())
        .filter(|v| !v.is_empty())
}

fn text_field(dialect: Dialect, name: &[u8]) -> Option<Field> {
    let field = match name {
        b"title" => Field::Title,
        b"link" if dialect != Dialect::Atom => Field::Link,
        b"pubDate" | b"dc:date" | b"published" => Field::Published,
        b"updated" | b"dc:modified" => Field::Updated,
        b"media:content" => Field::MediaText,
        b"content:encoded" => Field::Encoded,
        b"description" | b"summary" => Field::Description,
        b"content" => Field::Content,
        _ => return None,
    };
    Some(field)
}

/// Read RSS, RDF or Atom into entries.
///
/// A broken element inside an entry only loses that element. A hard XML error
/// keeps whatever complete entries were read before it.
pub(super) fn parse(body: &[u8]) -> Result<Vec<FeedEntry>> {
    let mut reader = Reader::from_reader(body);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;

    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut dialect: Option<Dialect> = None;
    let mut depth = 0usize;
    let mut entry_depth = 0usize;
    let mut current: Option<EntryBuilder> = None;
    let mut capture: Option<Capture> = None;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(e) => {
                let position = reader.buffer_position();
                if entries.is_empty() {
                    return Err(NewsdeskError::FeedParse(format!(
                        "XML error at byte {}: {}",
                        position, e
                    )));
                }
                tracing::warn!(
                    entries = entries.len(),
                    position,
                    "XML error after partial read, keeping entries so far: {}",
                    e
                );
                break;
            }
        };

        match event {
            Event::Start(e) => {
                depth += 1;

                match dialect {
                    None => {
                        dialect = Dialect::from_root(e.local_name().as_ref());
                        if dialect.is_none() {
                            return Err(NewsdeskError::FeedParse(format!(
                                "unsupported root element <{}>",
                                String::from_utf8_lossy(e.name().as_ref())
                            )));
                        }
                    }
                    Some(kind) => {
                        if let Some(cap) = capture.as_mut() {
                            if cap.field.keeps_markup() {
                                cap.buf.push('<');
                                cap.buf.push_str(&String::from_utf8_lossy(&e));
                                cap.buf.push('>');
                            }
                        } else if current.is_none() {
                            if e.local_name().as_ref() == kind.entry_tag() {
                                current = Some(EntryBuilder::default());
                                entry_depth = depth;
                            }
                        } else if let Some(entry) = current.as_mut() {
                            let name = e.name();
                            entry.media(&e);
                            if kind == Dialect::Atom && name.as_ref() == b"link" {
                                // Links nested in <source> describe the origin feed.
                                if depth == entry_depth + 1 {
                                    entry.atom_link(&e);
                                }
                            } else if depth == entry_depth + 1
                                || name.as_ref() == b"media:content"
                            {
                                if let Some(field) = text_field(kind, name.as_ref()) {
                                    capture = Some(Capture {
                                        field,
                                        depth,
                                        buf: String::new(),
                                    });
                                }
                            }
                        }
                    }
                }
            }
            Event::Empty(e) => {
                if let Some(cap) = capture.as_mut() {
                    if cap.field.keeps_markup() {
                        cap.buf.push('<');
                        cap.buf.push_str(&String::from_utf8_lossy(&e));
                        cap.buf.push_str("/>");
                    }
                } else if let Some(entry) = current.as_mut() {
                    entry.media(&e);
                    if dialect == Some(Dialect::Atom)
                        && e.name().as_ref() == b"link"
                        && depth == entry_depth
                    {
                        entry.atom_link(&e);
                    }
                }
            }
            Event::End(e) => {
                if let Some(cap) = capture.take() {
                    if depth == cap.depth {
                        if let Some(entry) = current.as_mut() {
                            entry.set(cap.field, cap.buf);
                        }
                    } else {
                        let mut cap = cap;
                        if cap.field.keeps_markup() {
                            cap.buf.push_str("</");
                            cap.buf.push_str(&String::from_utf8_lossy(e.name().as_ref()));
                            cap.buf.push('>');
                        }
                        capture = Some(cap);
                    }
                }

                if depth == entry_depth && capture.is_none() {
                    if let Some(entry) = current.take() {
                        entries.push(entry.build());
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(e) => {
                if let Some(cap) = capture.as_mut().filter(|c| c.accepts_text_at(depth)) {
                    let raw = String::from_utf8_lossy(&e);
                    cap.buf.push_str(&decode_html_entities(&raw));
                }
            }
            Event::CData(e) => {
                if let Some(cap) = capture.as_mut().filter(|c| c.accepts_text_at(depth)) {
                    cap.buf.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if dialect.is_none() {
        return Err(NewsdeskError::FeedParse("no feed root element".into()));
    }

    Ok(entries)
}
