//! Properties: named bindings of an event type to an object type, with
//! uniqueness, merge strategy and entity-relevance configuration (spec
//! §3, §4.4).

use std::collections::BTreeMap;

use paste::paste;

use crate::attrs::{AttrRule, AttrSpec};
use crate::EdxmlError;

#[derive(PartialEq, Eq, Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub enum MergeStrategy {
  Drop,
  Add,
  Replace,
  Min,
  Max,
  Match,
}

impl MergeStrategy {
  /// spec §3 invariant 3: "`merge ∈ {match, min, max}` implies the
  /// property is mandatory".
  pub fn implies_mandatory(self) -> bool {
    matches!(self, MergeStrategy::Match | MergeStrategy::Min | MergeStrategy::Max)
  }

  /// spec §3 invariant 3: "`merge ∈ {match, replace, min, max}` implies
  /// singleton".
  pub fn implies_singleton(self) -> bool {
    matches!(self, MergeStrategy::Match | MergeStrategy::Replace | MergeStrategy::Min | MergeStrategy::Max)
  }
}

impl std::str::FromStr for MergeStrategy {
  type Err = EdxmlError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "drop" => Ok(MergeStrategy::Drop),
      "add" => Ok(MergeStrategy::Add),
      "replace" => Ok(MergeStrategy::Replace),
      "min" => Ok(MergeStrategy::Min),
      "max" => Ok(MergeStrategy::Max),
      "match" => Ok(MergeStrategy::Match),
      other => Err(EdxmlError::InvalidDataType(other.to_string(), "unknown merge strategy".to_string())),
    }
  }
}

impl std::fmt::Display for MergeStrategy {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let s = match self {
      MergeStrategy::Drop => "drop",
      MergeStrategy::Add => "add",
      MergeStrategy::Replace => "replace",
      MergeStrategy::Min => "min",
      MergeStrategy::Max => "max",
      MergeStrategy::Match => "match",
    };
    write!(f, "{}", s)
  }
}

/// Attribute grammar table for `Property` (spec §4.2).
pub const PROPERTY_ATTRS: &[AttrSpec] = &[
  AttrSpec::mandatory("name", AttrRule::Pattern(".{1,64}")),
  AttrSpec::mandatory("object-type", AttrRule::Any),
  AttrSpec::optional("description", AttrRule::MaxLen(128), ""),
  AttrSpec::optional("similar", AttrRule::MaxLen(64), ""),
  AttrSpec::optional("unique", AttrRule::Pattern("true|false"), "false"),
  AttrSpec::optional("merge", AttrRule::Pattern("drop|add|replace|min|max|match"), "drop"),
  AttrSpec::optional("defines-entity", AttrRule::Pattern("true|false"), "false"),
  AttrSpec::optional("entity-confidence", AttrRule::UnitInterval, "1.0"),
];

#[derive(Clone, Debug)]
pub struct Property {
  name: String,
  object_type_name: String,
  description: String,
  similar: Option<String>,
  /// spec §3: "`unique` flag". A unique property makes its owning event
  /// type unique (spec invariant 2) and is left untouched by the merge
  /// engine (spec §4.4).
  unique: bool,
  merge: MergeStrategy,
  /// spec §3: "`defines-entity` flag".
  defines_entity: bool,
  /// spec §3: "`entity-confidence` decimal", in `[0.0, 1.0]`.
  entity_confidence: f64,
}

impl Property {
  pub fn new(name: impl Into<String>, object_type_name: impl Into<String>) -> Self {
    let name = name.into();
    Property {
      object_type_name: object_type_name.into(),
      description: name.clone(),
      name,
      similar: None,
      unique: false,
      merge: MergeStrategy::Drop,
      defines_entity: false,
      entity_confidence: 1.0,
    }
  }

  impl_builder_opt_string_attr!(similar);
  impl_builder_field!(merge, MergeStrategy);
  impl_builder_field!(unique, bool);
  impl_builder_field!(defines_entity, bool);
  impl_builder_field!(entity_confidence, f64);
  impl_builder_field!(description, String);

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn object_type_name(&self) -> &str {
    &self.object_type_name
  }

  pub fn merge_strategy(&self) -> MergeStrategy {
    self.merge
  }

  pub fn is_unique(&self) -> bool {
    self.unique
  }

  /// spec §3 invariant 3: mandatory iff `unique` or the merge strategy
  /// implies it.
  pub fn is_mandatory(&self) -> bool {
    self.unique || self.merge.implies_mandatory()
  }

  /// spec §3 invariant 3: singleton iff `unique` or the merge strategy
  /// implies it (parent-map membership is applied by the owning event
  /// type, spec §4.2).
  pub fn is_single_valued(&self) -> bool {
    self.unique || self.merge.implies_singleton()
  }

  pub fn defines_entity(&self) -> bool {
    self.defines_entity
  }

  pub fn entity_confidence(&self) -> f64 {
    self.entity_confidence
  }

  pub fn attrs(&self) -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert("name".to_string(), self.name.clone());
    m.insert("object-type".to_string(), self.object_type_name.clone());
    m.insert("description".to_string(), self.description.clone());
    m.insert("similar".to_string(), self.similar.clone().unwrap_or_default());
    m.insert("unique".to_string(), self.unique.to_string());
    m.insert("merge".to_string(), self.merge.to_string());
    m.insert("defines-entity".to_string(), self.defines_entity.to_string());
    m.insert("entity-confidence".to_string(), self.entity_confidence.to_string());
    m
  }
}
