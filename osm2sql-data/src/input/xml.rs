//! Streaming reader for OSM XML and OsmChange documents.
//!
//! Entities inside `<create>`, `<modify>` and `<delete>` blocks carry the
//! block's action. Outside such blocks an `action="modify"` or
//! `action="delete"` attribute (as written by editors) is honoured, and
//! everything else is a create.

use std::io::BufRead;

use camino::Utf8Path;
use osm2sql_core::output::OutputError;
use osm2sql_core::{ChangeAction, Element, Member, Node, OsmId, OsmType, Relation, TagList, Way};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{OsmIngestError, OsmIngestSummary, output_error};

/// Read an XML document from `source`, handing each entity to `visit`.
///
/// `path` is only used to label errors.
pub fn read_xml<R, F>(
    source: R,
    path: &Utf8Path,
    mut visit: F,
) -> Result<OsmIngestSummary, OsmIngestError>
where
    R: BufRead,
    F: FnMut(ChangeAction, Element) -> Result<(), OutputError>,
{
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);
    let mut parser = XmlParser {
        path,
        block: None,
        current: None,
        summary: OsmIngestSummary::default(),
    };
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| parser.xml_error(&reader, source))?;
        match event {
            Event::Start(ref e) => parser.open(e, &reader, &mut visit, false)?,
            Event::Empty(ref e) => parser.open(e, &reader, &mut visit, true)?,
            Event::End(ref e) => parser.close(e.name().as_ref(), &mut visit)?,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(parser.summary)
}

struct Pending {
    action: ChangeAction,
    element: Element,
}

struct XmlParser<'a> {
    path: &'a Utf8Path,
    /// Action of the enclosing OsmChange block.
    block: Option<ChangeAction>,
    current: Option<Pending>,
    summary: OsmIngestSummary,
}

impl XmlParser<'_> {
    fn open<R, F>(
        &mut self,
        e: &BytesStart<'_>,
        reader: &Reader<R>,
        visit: &mut F,
        empty: bool,
    ) -> Result<(), OsmIngestError>
    where
        F: FnMut(ChangeAction, Element) -> Result<(), OutputError>,
    {
        let attrs = self.attributes(e, reader)?;
        match e.name().as_ref() {
            b"create" => self.block = Some(ChangeAction::Create),
            b"modify" => self.block = Some(ChangeAction::Modify),
            b"delete" => self.block = Some(ChangeAction::Delete),
            b"node" => {
                let action = self.action(&attrs);
                let id = self.id(&attrs, "node")?;
                // Deletions may omit coordinates.
                let (lat, lon) = if action == ChangeAction::Delete {
                    (
                        self.optional_coord(&attrs, "lat")?.unwrap_or(0.0),
                        self.optional_coord(&attrs, "lon")?.unwrap_or(0.0),
                    )
                } else {
                    (
                        self.required_coord(&attrs, "lat")?,
                        self.required_coord(&attrs, "lon")?,
                    )
                };
                self.begin(
                    action,
                    Element::Node(Node {
                        id,
                        lat,
                        lon,
                        tags: TagList::new(),
                    }),
                );
            }
            b"way" => {
                let action = self.action(&attrs);
                let id = self.id(&attrs, "way")?;
                self.begin(
                    action,
                    Element::Way(Way {
                        id,
                        nodes: Vec::new(),
                        tags: TagList::new(),
                    }),
                );
            }
            b"relation" => {
                let action = self.action(&attrs);
                let id = self.id(&attrs, "relation")?;
                self.begin(
                    action,
                    Element::Relation(Relation {
                        id,
                        members: Vec::new(),
                        tags: TagList::new(),
                    }),
                );
            }
            b"tag" => {
                let key = self.required(&attrs, "tag", "k")?.to_owned();
                let value = self.required(&attrs, "tag", "v")?.to_owned();
                if let Some(pending) = self.current.as_mut() {
                    let tags = match &mut pending.element {
                        Element::Node(node) => &mut node.tags,
                        Element::Way(way) => &mut way.tags,
                        Element::Relation(relation) => &mut relation.tags,
                    };
                    tags.push(key, value);
                }
            }
            b"nd" => {
                let node_ref = self.parsed::<OsmId>(&attrs, "nd", "ref")?;
                if let Some(Pending {
                    element: Element::Way(way),
                    ..
                }) = self.current.as_mut()
                {
                    way.nodes.push(node_ref);
                }
            }
            b"member" => {
                let raw_kind = self.required(&attrs, "member", "type")?;
                let kind = match raw_kind {
                    "node" => OsmType::Node,
                    "way" => OsmType::Way,
                    "relation" => OsmType::Relation,
                    other => {
                        return Err(OsmIngestError::InvalidAttribute {
                            path: self.path.to_path_buf(),
                            element: "member",
                            attribute: "type",
                            value: other.to_owned(),
                        });
                    }
                };
                let id = self.parsed::<OsmId>(&attrs, "member", "ref")?;
                let role = lookup(&attrs, "role").unwrap_or("").to_owned();
                if let Some(Pending {
                    element: Element::Relation(relation),
                    ..
                }) = self.current.as_mut()
                {
                    relation.members.push(Member::new(kind, id, role));
                }
            }
            _ => {}
        }
        if empty {
            self.close(e.name().as_ref(), visit)?;
        }
        Ok(())
    }

    fn close<F>(&mut self, name: &[u8], visit: &mut F) -> Result<(), OsmIngestError>
    where
        F: FnMut(ChangeAction, Element) -> Result<(), OutputError>,
    {
        match name {
            b"create" | b"modify" | b"delete" => self.block = None,
            b"node" | b"way" | b"relation" => {
                if let Some(Pending { action, element }) = self.current.take() {
                    self.summary.record(&element);
                    let (kind, id) = (element.kind(), element.id());
                    visit(action, element)
                        .map_err(|source| output_error(self.path, kind, id, source))?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn begin(&mut self, action: ChangeAction, element: Element) {
        self.current = Some(Pending { action, element });
    }

    fn action(&self, attrs: &[(String, String)]) -> ChangeAction {
        if let Some(block) = self.block {
            return block;
        }
        match lookup(attrs, "action") {
            Some("modify") => ChangeAction::Modify,
            Some("delete") => ChangeAction::Delete,
            _ => ChangeAction::Create,
        }
    }

    fn attributes<R>(
        &self,
        e: &BytesStart<'_>,
        reader: &Reader<R>,
    ) -> Result<Vec<(String, String)>, OsmIngestError> {
        let mut attrs = Vec::new();
        for attribute in e.attributes() {
            let attribute = attribute.map_err(|err| self.xml_error(reader, err.into()))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|err| self.xml_error(reader, err))?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(attrs)
    }

    fn id(&self, attrs: &[(String, String)], element: &'static str) -> Result<OsmId, OsmIngestError> {
        self.parsed(attrs, element, "id")
    }

    fn required_coord(
        &self,
        attrs: &[(String, String)],
        attribute: &'static str,
    ) -> Result<f64, OsmIngestError> {
        self.parsed(attrs, "node", attribute)
    }

    fn optional_coord(
        &self,
        attrs: &[(String, String)],
        attribute: &'static str,
    ) -> Result<Option<f64>, OsmIngestError> {
        match lookup(attrs, attribute) {
            Some(_) => self.parsed(attrs, "node", attribute).map(Some),
            None => Ok(None),
        }
    }

    fn required<'v>(
        &self,
        attrs: &'v [(String, String)],
        element: &'static str,
        attribute: &'static str,
    ) -> Result<&'v str, OsmIngestError> {
        lookup(attrs, attribute).ok_or_else(|| OsmIngestError::MissingAttribute {
            path: self.path.to_path_buf(),
            element,
            attribute,
        })
    }

    fn parsed<T: std::str::FromStr>(
        &self,
        attrs: &[(String, String)],
        element: &'static str,
        attribute: &'static str,
    ) -> Result<T, OsmIngestError> {
        let raw = self.required(attrs, element, attribute)?;
        raw.trim()
            .parse()
            .map_err(|_| OsmIngestError::InvalidAttribute {
                path: self.path.to_path_buf(),
                element,
                attribute,
                value: raw.to_owned(),
            })
    }

    fn xml_error<R>(&self, reader: &Reader<R>, source: quick_xml::Error) -> OsmIngestError {
        OsmIngestError::Xml {
            path: self.path.to_path_buf(),
            position: reader.buffer_position(),
            source,
        }
    }
}

fn lookup<'v>(attrs: &'v [(String, String)], key: &str) -> Option<&'v str> {
    attrs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}
