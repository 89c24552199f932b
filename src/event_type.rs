//! Event types: the schema-side record describing one kind of event
//! (spec §3, §4.2). An event type owns its properties and relations by
//! name and may declare a parent event type for the `is-parent`/`is-child`
//! implicit relation rules (spec §4.2 invariant 6).

use std::collections::BTreeMap;

use paste::paste;

use crate::attrs::{first_mismatch, AttrRule, AttrSpec};
use crate::property::Property;
use crate::relation::Relation;
use crate::reporter::ReporterTemplate;
use crate::EdxmlError;

/// Attribute grammar table for `EventType` (spec §4.2). Properties,
/// relations and the parent map are not part of this table -- they are
/// entities in their own right, merged incrementally on re-registration
/// by [`EventType::merge_from`].
pub const EVENT_TYPE_ATTRS: &[AttrSpec] = &[
  AttrSpec::mandatory("name", AttrRule::Pattern(".{1,64}")),
  AttrSpec::optional("display-name-singular", AttrRule::MaxLen(64), ""),
  AttrSpec::optional("display-name-plural", AttrRule::MaxLen(64), ""),
  AttrSpec::optional("description", AttrRule::MaxLen(128), ""),
  AttrSpec::optional("classlist", AttrRule::Any, ""),
];

#[derive(Clone, Debug)]
pub struct EventTypeParent {
  pub event_type_name: String,
  pub property_map: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct EventType {
  name: String,
  display_name_singular: String,
  display_name_plural: String,
  description: String,
  classlist: Vec<String>,
  properties: BTreeMap<String, Property>,
  relations: Vec<Relation>,
  parent: Option<EventTypeParent>,
  reporter_short: Option<ReporterTemplate>,
  reporter_long: Option<ReporterTemplate>,
  /// Derived, not set directly: true iff any property is unique (spec
  /// §4.2: "`event_type.unique` is true iff `unique-properties` is
  /// non-empty"), recomputed whenever a property is added.
  unique: bool,
}

impl EventType {
  pub fn new(name: impl Into<String>) -> Self {
    let name = name.into();
    EventType {
      display_name_singular: name.clone(),
      display_name_plural: format!("{}s", name),
      name,
      description: String::new(),
      classlist: Vec::new(),
      properties: BTreeMap::new(),
      relations: Vec::new(),
      parent: None,
      reporter_short: None,
      reporter_long: None,
      unique: false,
    }
  }

  impl_builder_field!(description, String);
  impl_builder_field!(classlist, Vec<String>);

  /// Retained for tests and call sites that build an `EventType` without
  /// going through [`EventType::add_property`] (spec §4.2's derived-set
  /// computation otherwise has nothing to derive from). Real registration
  /// should rely on `add_property` recomputing this automatically.
  pub fn set_unique(mut self, unique: bool) -> Self {
    self.unique = unique;
    self
  }

  pub fn set_display_name(mut self, singular: impl Into<String>, plural: impl Into<String>) -> Self {
    self.display_name_singular = singular.into();
    self.display_name_plural = plural.into();
    self
  }

  pub fn set_parent(mut self, parent: EventTypeParent) -> Self {
    self.parent = Some(parent);
    self
  }

  pub fn set_reporter_short(mut self, template: ReporterTemplate) -> Self {
    self.reporter_short = Some(template);
    self
  }

  pub fn set_reporter_long(mut self, template: ReporterTemplate) -> Self {
    self.reporter_long = Some(template);
    self
  }

  pub fn add_property(&mut self, property: Property) {
    self.properties.insert(property.name().to_string(), property);
    self.unique = self.properties.values().any(Property::is_unique);
  }

  /// `unique-properties` (spec §4.2): grows whenever a property with
  /// `unique=true` is added.
  pub fn unique_properties(&self) -> impl Iterator<Item = &Property> {
    self.properties.values().filter(|p| p.is_unique())
  }

  /// `mandatory-properties` (spec §4.2): grows when `merge ∈
  /// {match,min,max}`, which `Property::is_mandatory` already accounts
  /// for alongside the `unique` case.
  pub fn mandatory_properties(&self) -> impl Iterator<Item = &Property> {
    self.properties.values().filter(|p| p.is_mandatory())
  }

  /// `singleton-properties` (spec §4.2): grows when `merge ∈
  /// {match,replace,min,max}` or the property is in a parent map.
  pub fn singleton_properties(&self) -> impl Iterator<Item = &Property> {
    let parent_mapped: std::collections::BTreeSet<&str> =
      self.parent.iter().flat_map(|p| p.property_map.keys()).map(String::as_str).collect();
    self.properties.values().filter(move |p| p.is_single_valued() || parent_mapped.contains(p.name()))
  }

  /// `related-properties` (spec §4.2): grows when a relation names the
  /// property.
  pub fn related_properties(&self) -> impl Iterator<Item = &Property> {
    let related: std::collections::BTreeSet<&str> = self.relations.iter().flat_map(|r| r.referenced_properties()).collect();
    self.properties.values().filter(move |p| related.contains(p.name()))
  }

  pub fn add_relation(&mut self, relation: Relation) {
    self.relations.push(relation);
  }

  /// This entity's top-level attribute values, resolved against
  /// [`EVENT_TYPE_ATTRS`] (spec §4.2 invariant 6). Properties, relations
  /// and the parent map are compared separately by [`EventType::merge_from`].
  pub fn attrs(&self) -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert("name".to_string(), self.name.clone());
    m.insert("display-name-singular".to_string(), self.display_name_singular.clone());
    m.insert("display-name-plural".to_string(), self.display_name_plural.clone());
    m.insert("description".to_string(), self.description.clone());
    m.insert("classlist".to_string(), self.classlist.join(","));
    m
  }

  /// Re-registration: merge `other` (a second declaration of the same
  /// named event type, e.g. from a second input document) into `self`.
  /// Mandatory/optional top-level attributes must agree (spec §4.2
  /// invariant 6); properties and relations not yet present on `self`
  /// are adopted, matching the public contract's incremental
  /// `add_property`/`add_relation` (spec §4.2).
  pub fn merge_from(&mut self, other: EventType) -> Result<(), EdxmlError> {
    if let Some(mismatch) = first_mismatch(EVENT_TYPE_ATTRS, &self.attrs(), &other.attrs()) {
      return Err(EdxmlError::SchemaInconsistency(format!("eventtype/{}/{}", self.name, mismatch), "conflicting redefinition".to_string()));
    }
    for (name, property) in other.properties {
      match self.properties.get(&name) {
        Some(existing) => {
          if let Some(mismatch) = first_mismatch(crate::property::PROPERTY_ATTRS, &existing.attrs(), &property.attrs()) {
            return Err(EdxmlError::SchemaInconsistency(format!("eventtype/{}/property/{}/{}", self.name, name, mismatch), "conflicting redefinition".to_string()));
          }
        }
        None => {
          self.properties.insert(name, property);
        }
      }
    }
    self.unique = self.properties.values().any(Property::is_unique);
    for relation in other.relations {
      let already_present = self.relations.iter().any(|r| {
        r.property_name() == relation.property_name() && r.related_property_name() == relation.related_property_name() && r.predicate() == relation.predicate()
      });
      if !already_present {
        self.relations.push(relation);
      }
    }
    match (&self.parent, other.parent) {
      (None, Some(p)) => self.parent = Some(p),
      (Some(existing), Some(p)) => {
        if existing.event_type_name != p.event_type_name || existing.property_map != p.property_map {
          return Err(EdxmlError::SchemaInconsistency(format!("eventtype/{}/parent", self.name), "conflicting redefinition".to_string()));
        }
      }
      _ => {}
    }
    Ok(())
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_unique(&self) -> bool {
    self.unique
  }

  pub fn classlist(&self) -> &[String] {
    &self.classlist
  }

  pub fn property(&self, name: &str) -> Option<&Property> {
    self.properties.get(name)
  }

  pub fn properties(&self) -> impl Iterator<Item = &Property> {
    self.properties.values()
  }

  pub fn relations(&self) -> &[Relation] {
    &self.relations
  }

  pub fn parent(&self) -> Option<&EventTypeParent> {
    self.parent.as_ref()
  }

  pub fn reporter_short(&self) -> Option<&ReporterTemplate> {
    self.reporter_short.as_ref()
  }

  pub fn reporter_long(&self) -> Option<&ReporterTemplate> {
    self.reporter_long.as_ref()
  }
}
