//! Events: instances of an event type, carrying a multi-valued property
//! map plus content and parent hashlinks (spec §3).

use std::collections::{BTreeMap, BTreeSet};

use paste::paste;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
  event_type_name: String,
  source_uri: String,
  /// property name -> normalized object values (a set: EDXML properties
  /// are multi-valued and unordered, spec §3).
  properties: BTreeMap<String, BTreeSet<String>>,
  content: String,
  parents: Vec<String>,
}

impl Event {
  pub fn new(event_type_name: impl Into<String>, source_uri: impl Into<String>) -> Self {
    Event {
      event_type_name: event_type_name.into(),
      source_uri: source_uri.into(),
      properties: BTreeMap::new(),
      content: String::new(),
      parents: Vec::new(),
    }
  }

  impl_builder_field!(content, String);
  impl_builder_field!(parents, Vec<String>);

  pub fn set_property(mut self, name: impl Into<String>, values: impl IntoIterator<Item = String>) -> Self {
    self.properties.insert(name.into(), values.into_iter().collect());
    self
  }

  pub fn add_property_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
    self.properties.entry(name.into()).or_default().insert(value.into());
  }

  pub fn event_type_name(&self) -> &str {
    &self.event_type_name
  }

  pub fn source_uri(&self) -> &str {
    &self.source_uri
  }

  pub fn content(&self) -> &str {
    &self.content
  }

  pub fn parents(&self) -> &[String] {
    &self.parents
  }

  pub fn property_values(&self, name: &str) -> Option<&BTreeSet<String>> {
    self.properties.get(name)
  }

  pub fn properties(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
    self.properties.iter()
  }

  /// The key used to group events for hashing and merging: the event
  /// type name together with the source URI (spec §4.3, §4.6:
  /// "`group_key = (event_type, source)`").
  pub fn group_key(&self) -> (&str, &str) {
    (&self.event_type_name, &self.source_uri)
  }
}
