//! The writer-side collaborator (spec §9 Design Notes: "the SAX writer
//! collaborator should be named and trait-bound so that a test harness
//! can substitute an in-memory sink"), in the source's own
//! `QuickXmlReadWrite` style of driving a `Writer` through nested element
//! handlers without an intervening abstraction. The raw SAX/XML reader is
//! an external collaborator out of this crate's scope (spec §1): the
//! stream processor consumes already-parsed `Event` values, not bytes.
//!
//! Wire format (spec §6): root `<events>`, one `<definitions>` section
//! followed by one `<eventgroups>` section containing zero or more
//! `<eventgroup event-type="…" source-id="…">`, each holding `<event>`
//! elements made of `<object property="…" value="…"/>` children, an
//! optional `<content>` text element, and an optional `<parents>`
//! element listing hashlink references.

use std::io::Write;

use quick_xml::{
  events::{BytesStart, BytesText, Event},
  Writer,
};

use crate::event::Event as EdxmlEvent;
use crate::EdxmlError;

/// Collaborator used by the stream processor and the schema emitter to
/// serialize EDXML documents (spec §4.6, §4.7, §6). Implemented here for
/// `quick_xml::Writer<W>`; a test harness can implement it for any other
/// sink. `source_id` is the registry-assigned numeric id (spec §4.2
/// `unique_source_ids`), not the source's URL.
pub trait EdxmlWriter {
  fn add_xml_definitions(&mut self, raw_definitions_xml: &str) -> Result<(), EdxmlError>;
  fn open_event_groups(&mut self) -> Result<(), EdxmlError>;
  fn open_event_group(&mut self, event_type_name: &str, source_id: u32) -> Result<(), EdxmlError>;
  fn add_event(&mut self, event: &EdxmlEvent) -> Result<(), EdxmlError>;
  fn close_event_group(&mut self) -> Result<(), EdxmlError>;
  fn close_event_groups(&mut self) -> Result<(), EdxmlError>;
}

pub struct QuickXmlEdxmlWriter<W: Write> {
  writer: Writer<W>,
  root_opened: bool,
  group_open: bool,
}

impl<W: Write> QuickXmlEdxmlWriter<W> {
  pub fn new(sink: W) -> Self {
    QuickXmlEdxmlWriter { writer: Writer::new_with_indent(sink, b' ', 2), root_opened: false, group_open: false }
  }

  fn ensure_root_open(&mut self) -> Result<(), EdxmlError> {
    if !self.root_opened {
      let tag = BytesStart::borrowed_name(b"events");
      self.writer.write_event(Event::Start(tag.to_borrowed())).map_err(EdxmlError::Write)?;
      self.root_opened = true;
    }
    Ok(())
  }

  pub fn into_inner(self) -> W {
    self.writer.into_inner()
  }
}

impl<W: Write> EdxmlWriter for QuickXmlEdxmlWriter<W> {
  fn add_xml_definitions(&mut self, raw_definitions_xml: &str) -> Result<(), EdxmlError> {
    self.ensure_root_open()?;
    self.writer.write(raw_definitions_xml.as_bytes()).map_err(EdxmlError::Io)?;
    Ok(())
  }

  fn open_event_groups(&mut self) -> Result<(), EdxmlError> {
    self.ensure_root_open()?;
    let tag = BytesStart::borrowed_name(b"eventgroups");
    self.writer.write_event(Event::Start(tag.to_borrowed())).map_err(EdxmlError::Write)?;
    Ok(())
  }

  fn open_event_group(&mut self, event_type_name: &str, source_id: u32) -> Result<(), EdxmlError> {
    if self.group_open {
      return Err(EdxmlError::Custom("cannot open an event group while one is already open".to_string()));
    }
    let source_id = source_id.to_string();
    let mut tag = BytesStart::borrowed_name(b"eventgroup");
    tag.push_attribute(("event-type", event_type_name));
    tag.push_attribute(("source-id", source_id.as_str()));
    self.writer.write_event(Event::Start(tag.to_borrowed())).map_err(EdxmlError::Write)?;
    self.group_open = true;
    Ok(())
  }

  fn add_event(&mut self, event: &EdxmlEvent) -> Result<(), EdxmlError> {
    if !self.group_open {
      return Err(EdxmlError::Custom("cannot add an event outside an open event group".to_string()));
    }
    let event_tag = BytesStart::borrowed_name(b"event");
    self.writer.write_event(Event::Start(event_tag.to_borrowed())).map_err(EdxmlError::Write)?;
    for (property_name, values) in event.properties() {
      for value in values {
        let mut tag = BytesStart::borrowed_name(b"object");
        tag.push_attribute(("property", property_name.as_str()));
        tag.push_attribute(("value", value.as_str()));
        self.writer.write_event(Event::Empty(tag)).map_err(EdxmlError::Write)?;
      }
    }
    if !event.content().is_empty() {
      let content_tag = BytesStart::borrowed_name(b"content");
      self.writer.write_event(Event::Start(content_tag.to_borrowed())).map_err(EdxmlError::Write)?;
      self.writer.write_event(Event::Text(BytesText::from_plain_str(event.content()))).map_err(EdxmlError::Write)?;
      self.writer.write_event(Event::End(content_tag.to_end())).map_err(EdxmlError::Write)?;
    }
    if !event.parents().is_empty() {
      let parents_tag = BytesStart::borrowed_name(b"parents");
      self.writer.write_event(Event::Start(parents_tag.to_borrowed())).map_err(EdxmlError::Write)?;
      self.writer.write_event(Event::Text(BytesText::from_plain_str(&event.parents().join(",")))).map_err(EdxmlError::Write)?;
      self.writer.write_event(Event::End(parents_tag.to_end())).map_err(EdxmlError::Write)?;
    }
    self.writer.write_event(Event::End(event_tag.to_end())).map_err(EdxmlError::Write)?;
    Ok(())
  }

  fn close_event_group(&mut self) -> Result<(), EdxmlError> {
    let tag = BytesStart::borrowed_name(b"eventgroup");
    self.writer.write_event(Event::End(tag.to_end())).map_err(EdxmlError::Write)?;
    self.group_open = false;
    Ok(())
  }

  fn close_event_groups(&mut self) -> Result<(), EdxmlError> {
    let groups_tag = BytesStart::borrowed_name(b"eventgroups");
    self.writer.write_event(Event::End(groups_tag.to_end())).map_err(EdxmlError::Write)?;
    let root_tag = BytesStart::borrowed_name(b"events");
    self.writer.write_event(Event::End(root_tag.to_end())).map_err(EdxmlError::Write)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn writes_a_single_event_group() {
    let mut writer = QuickXmlEdxmlWriter::new(Vec::new());
    writer.open_event_groups().unwrap();
    writer.open_event_group("test-event", 1).unwrap();
    let event = EdxmlEvent::new("test-event", "/source/").set_content("hello".to_string());
    writer.add_event(&event).unwrap();
    writer.close_event_group().unwrap();
    writer.close_event_groups().unwrap();
    let xml = String::from_utf8(writer.into_inner()).unwrap();
    assert!(xml.contains("<events"));
    assert!(xml.contains(r#"<eventgroup event-type="test-event" source-id="1">"#));
    assert!(xml.contains("hello"));
  }

  #[test]
  fn writes_objects_and_parents() {
    let mut writer = QuickXmlEdxmlWriter::new(Vec::new());
    writer.open_event_groups().unwrap();
    writer.open_event_group("test-event", 2).unwrap();
    let event = EdxmlEvent::new("test-event", "/source/").set_property("ip", ["1.2.3.4".to_string()]).set_parents(vec!["abc".to_string()]);
    writer.add_event(&event).unwrap();
    writer.close_event_group().unwrap();
    writer.close_event_groups().unwrap();
    let xml = String::from_utf8(writer.into_inner()).unwrap();
    assert!(xml.contains(r#"<object property="ip" value="1.2.3.4"/>"#));
    assert!(xml.contains("<parents>abc</parents>"));
  }

  #[test]
  fn rejects_event_outside_group() {
    let mut writer = QuickXmlEdxmlWriter::new(Vec::new());
    let event = EdxmlEvent::new("test-event", "/source/");
    assert!(writer.add_event(&event).is_err());
  }
}
