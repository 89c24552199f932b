//! Object types: named, reusable data-type + display-formatting pairs
//! shared by properties across event types (spec §3, §4.1).

use std::collections::BTreeMap;

use paste::paste;

use crate::attrs::{AttrRule, AttrSpec};
use crate::datatype::DataType;
use crate::EdxmlError;

/// Default `value-regexp`: matches any string in full (spec §3: "an
/// optional value-regexp (default `[\s\S]*`, anchored to full match at
/// use time)").
pub const DEFAULT_VALUE_REGEXP: &str = r"[\s\S]*";

/// Attribute grammar table for `ObjectType` (spec §4.2). `enp` and
/// `compress` are carried and re-registration-checked per the documented
/// default but have no attached behavior (spec §9 Open Question).
pub const OBJECT_TYPE_ATTRS: &[AttrSpec] = &[
  AttrSpec::mandatory("name", AttrRule::Pattern(".{1,64}")),
  AttrSpec::mandatory("data-type", AttrRule::Any),
  AttrSpec::optional("display-name-singular", AttrRule::MaxLen(64), ""),
  AttrSpec::optional("display-name-plural", AttrRule::MaxLen(64), ""),
  AttrSpec::optional("description", AttrRule::MaxLen(128), ""),
  AttrSpec::optional("fuzzy-matching", AttrRule::MaxLen(64), ""),
  AttrSpec::optional("compress", AttrRule::Pattern("true|false"), "false"),
  AttrSpec::optional("enp", AttrRule::UnsignedInt, "0"),
  AttrSpec::optional("value-regexp", AttrRule::Any, DEFAULT_VALUE_REGEXP),
];

#[derive(Clone, Debug)]
pub struct ObjectType {
  name: String,
  display_name_singular: String,
  display_name_plural: String,
  description: String,
  data_type: DataType,
  fuzzy_matching: Option<String>,
  /// spec §3 `compress` flag; round-tripped, no attached semantics.
  compress: bool,
  /// spec §3 `enp` (entity-name-presence) integer; round-tripped, no
  /// attached semantics.
  enp: u32,
  value_regexp: String,
}

impl ObjectType {
  pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
    let name = name.into();
    ObjectType {
      display_name_singular: name.clone(),
      display_name_plural: format!("{}s", name),
      name,
      description: String::new(),
      data_type,
      fuzzy_matching: None,
      compress: false,
      enp: 0,
      value_regexp: DEFAULT_VALUE_REGEXP.to_string(),
    }
  }

  impl_builder_field!(description, String);
  impl_builder_opt_string_attr!(fuzzy_matching);
  impl_builder_field!(compress, bool);
  impl_builder_field!(enp, u32);

  pub fn set_value_regexp(mut self, pattern: impl Into<String>) -> Self {
    self.value_regexp = pattern.into();
    self
  }

  pub fn set_display_name(mut self, singular: impl Into<String>, plural: impl Into<String>) -> Self {
    self.display_name_singular = singular.into();
    self.display_name_plural = plural.into();
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn display_name_singular(&self) -> &str {
    &self.display_name_singular
  }

  pub fn display_name_plural(&self) -> &str {
    &self.display_name_plural
  }

  pub fn data_type(&self) -> &DataType {
    &self.data_type
  }

  pub fn compress(&self) -> bool {
    self.compress
  }

  pub fn enp(&self) -> u32 {
    self.enp
  }

  pub fn value_regexp(&self) -> &str {
    &self.value_regexp
  }

  /// Normalize and additionally check `value-regexp` (spec §3: "anchored
  /// to full match at use time").
  pub fn normalize(&self, value: &str) -> Result<String, EdxmlError> {
    let normalized = self.data_type.normalize(value)?;
    let re = regex::Regex::new(&format!("^(?:{})$", self.value_regexp))
      .map_err(|e| EdxmlError::SchemaInconsistency(self.name.clone(), format!("invalid value-regexp: {}", e)))?;
    if !re.is_match(&normalized) {
      return Err(EdxmlError::InvalidObjectValue(
        value.to_string(),
        self.data_type.to_string(),
        format!("does not match value-regexp '{}'", self.value_regexp),
      ));
    }
    Ok(normalized)
  }

  /// This entity's current attribute values, resolved against
  /// [`OBJECT_TYPE_ATTRS`], for re-registration consistency checking and
  /// schema re-emission (spec §4.2 invariant 6).
  pub fn attrs(&self) -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert("name".to_string(), self.name.clone());
    m.insert("data-type".to_string(), self.data_type.to_string());
    m.insert("display-name-singular".to_string(), self.display_name_singular.clone());
    m.insert("display-name-plural".to_string(), self.display_name_plural.clone());
    m.insert("description".to_string(), self.description.clone());
    m.insert("fuzzy-matching".to_string(), self.fuzzy_matching.clone().unwrap_or_default());
    m.insert("compress".to_string(), self.compress.to_string());
    m.insert("enp".to_string(), self.enp.to_string());
    m.insert("value-regexp".to_string(), self.value_regexp.clone());
    m
  }
}
