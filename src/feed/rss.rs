// src/feed/rss.rs
//! RSS 2.0 serialization. Output depends only on the document, never on the
//! clock, so regenerating from the same archive gives the same bytes.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{FeedDocument, FeedEntry};
use crate::error::PipelineError;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

struct RssWriter {
    w: Writer<Vec<u8>>,
}

fn build_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Build(e.to_string())
}

impl RssWriter {
    fn new() -> Self {
        Self {
            w: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn event(&mut self, ev: Event<'_>) -> Result<(), PipelineError> {
        self.w.write_event(ev).map_err(build_err)
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), PipelineError> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.event(Event::Start(start))
    }

    fn close(&mut self, name: &str) -> Result<(), PipelineError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn element(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), PipelineError> {
        self.open(name, attrs)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), PipelineError> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.event(Event::Empty(start))
    }

    fn finish(self) -> Result<String, PipelineError> {
        let mut bytes = self.w.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(build_err)
    }
}

pub fn render(doc: &FeedDocument) -> Result<String, PipelineError> {
    let mut w = RssWriter::new();
    w.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.open("rss", &[("version", "2.0"), ("xmlns:atom", ATOM_NS)])?;
    w.open("channel", &[])?;

    w.element("title", &[], &doc.title)?;
    w.element("link", &[], &doc.link)?;
    w.element("description", &[], &doc.description)?;
    w.empty(
        "atom:link",
        &[
            ("href", doc.link.as_str()),
            ("rel", "self"),
            ("type", "application/rss+xml"),
        ],
    )?;
    w.element("language", &[], "en")?;
    if let Some(newest) = doc.entries.first() {
        w.element("pubDate", &[], &newest.published_at.to_rfc2822())?;
    }

    for entry in &doc.entries {
        write_item(&mut w, entry)?;
    }

    w.close("channel")?;
    w.close("rss")?;
    w.finish()
}

fn write_item(w: &mut RssWriter, entry: &FeedEntry) -> Result<(), PipelineError> {
    w.open("item", &[])?;
    w.element("title", &[], &entry.title)?;
    w.element("link", &[], &entry.source_link)?;
    w.element("description", &[], &entry.summary_html)?;
    w.element("guid", &[("isPermaLink", "false")], &entry.guid)?;
    w.element("pubDate", &[], &entry.published_at.to_rfc2822())?;
    w.close("item")
}
