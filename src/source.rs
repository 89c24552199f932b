//! Event sources: URI-identified provenance records (spec §3). The
//! numeric `source_id` is the key events reference from inside an
//! `<eventgroup>`; the registry is the sole authority for minting and
//! renumbering it (spec §4.2 `unique_source_ids`).

use paste::paste;

use crate::attrs::{AttrRule, AttrSpec};

/// Attribute grammar table for `Source` (spec §4.2). `source-id` is not
/// part of this table: it is assigned by the registry, not carried on
/// the wire attribute-for-attribute like the others.
pub const SOURCE_ATTRS: &[AttrSpec] = &[
  AttrSpec::mandatory("url", AttrRule::Any),
  AttrSpec::optional("date-acquired", AttrRule::Pattern(r"\d{8}"), ""),
  AttrSpec::optional("description", AttrRule::MaxLen(128), ""),
];

#[derive(Clone, Debug)]
pub struct Source {
  uri: String,
  description: String,
  date_acquired: Option<String>,
  source_id: u32,
}

impl Source {
  pub fn new(uri: impl Into<String>) -> Self {
    let uri = uri.into();
    Source { description: uri.clone(), uri, date_acquired: None, source_id: 0 }
  }

  impl_builder_field!(description, String);
  impl_builder_opt_string_attr!(date_acquired);

  pub fn uri(&self) -> &str {
    &self.uri
  }

  pub fn description(&self) -> &str {
    &self.description
  }

  pub fn date_acquired(&self) -> Option<&str> {
    self.date_acquired.as_deref()
  }

  pub fn source_id(&self) -> u32 {
    self.source_id
  }

  pub(crate) fn set_source_id(&mut self, id: u32) {
    self.source_id = id;
  }

  /// This entity's attribute values, resolved against [`SOURCE_ATTRS`]
  /// (spec §4.2 invariant 6). `source-id` is excluded: it is assigned by
  /// the registry, not declared on the wire.
  pub fn attrs(&self) -> std::collections::BTreeMap<String, String> {
    let mut m = std::collections::BTreeMap::new();
    m.insert("url".to_string(), self.uri.clone());
    m.insert("date-acquired".to_string(), self.date_acquired.clone().unwrap_or_default());
    m.insert("description".to_string(), self.description.clone());
    m
  }
}
