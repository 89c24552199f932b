//! C2: the schema registry. Owns every object type, event type, and
//! source definition encountered while loading one or more EDXML
//! documents, and enforces cross-definition invariants (spec §3, §4.2):
//! re-registration must be identical, relations may only reference
//! declared properties, parent maps must reference a declared parent
//! event type and existing properties on both sides, and so on.

use std::collections::BTreeMap;

use crate::attrs::{first_mismatch, validate_attrs};
use crate::context::ProcessingContext;
use crate::event_type::{EventType, EVENT_TYPE_ATTRS};
use crate::object_type::{ObjectType, OBJECT_TYPE_ATTRS};
use crate::property::PROPERTY_ATTRS;
use crate::source::{Source, SOURCE_ATTRS};
use crate::EdxmlError;

#[derive(Default)]
pub struct SchemaRegistry {
  object_types: BTreeMap<String, ObjectType>,
  event_types: BTreeMap<String, EventType>,
  sources: BTreeMap<String, Source>,
}

impl SchemaRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add an object type, or verify an existing definition of the same
  /// name agrees on every mandatory attribute and every optional
  /// attribute present on either side (spec §4.2 invariant 6).
  pub fn add_object_type(&mut self, object_type: ObjectType) -> Result<(), EdxmlError> {
    match self.object_types.get(object_type.name()) {
      Some(existing) => match first_mismatch(OBJECT_TYPE_ATTRS, &existing.attrs(), &object_type.attrs()) {
        Some(attr) => Err(EdxmlError::SchemaInconsistency(format!("objecttype/{}/{}", object_type.name(), attr), "conflicting redefinition".to_string())),
        None => Ok(()),
      },
      None => {
        validate_attrs(&format!("objecttype/{}", object_type.name()), OBJECT_TYPE_ATTRS, &object_type.attrs())?;
        self.object_types.insert(object_type.name().to_string(), object_type);
        Ok(())
      }
    }
  }

  /// Register an event type, or merge a second declaration of the same
  /// name into the existing one (spec §4.2 invariant 6, §3 "entities ...
  /// may be re-registered, consistency-checked").
  pub fn add_event_type(&mut self, event_type: EventType) -> Result<(), EdxmlError> {
    match self.event_types.get_mut(event_type.name()) {
      Some(existing) => existing.merge_from(event_type),
      None => {
        validate_attrs(&format!("eventtype/{}", event_type.name()), EVENT_TYPE_ATTRS, &event_type.attrs())?;
        for property in event_type.properties() {
          validate_attrs(&format!("eventtype/{}/property/{}", event_type.name(), property.name()), PROPERTY_ATTRS, &property.attrs())?;
        }
        self.event_types.insert(event_type.name().to_string(), event_type);
        Ok(())
      }
    }
  }

  pub fn add_source(&mut self, mut source: Source) -> Result<(), EdxmlError> {
    match self.sources.get(source.uri()) {
      Some(existing) => match first_mismatch(SOURCE_ATTRS, &existing.attrs(), &source.attrs()) {
        Some(attr) => Err(EdxmlError::SchemaInconsistency(format!("source/{}/{}", source.uri(), attr), "conflicting redefinition".to_string())),
        None => Ok(()),
      },
      None => {
        validate_attrs(&format!("source/{}", source.uri()), SOURCE_ATTRS, &source.attrs())?;
        // Mint the next consecutive positive source id; re-numbering to
        // collapse gaps across merged documents happens in
        // `unique_source_ids` (spec §4.2).
        let next_id = self.sources.values().map(Source::source_id).max().unwrap_or(0) + 1;
        source.set_source_id(next_id);
        self.sources.insert(source.uri().to_string(), source);
        Ok(())
      }
    }
  }

  pub fn object_type(&self, name: &str) -> Option<&ObjectType> {
    self.object_types.get(name)
  }

  pub fn event_type(&self, name: &str) -> Option<&EventType> {
    self.event_types.get(name)
  }

  pub fn event_type_mut(&mut self, name: &str) -> Option<&mut EventType> {
    self.event_types.get_mut(name)
  }

  pub fn source(&self, uri: &str) -> Option<&Source> {
    self.sources.get(uri)
  }

  pub fn object_types(&self) -> impl Iterator<Item = &ObjectType> {
    self.object_types.values()
  }

  pub fn sources(&self) -> impl Iterator<Item = &Source> {
    self.sources.values()
  }

  pub fn event_types(&self) -> impl Iterator<Item = &EventType> {
    self.event_types.values()
  }

  /// `property_object_type` (spec §4.2): the object-type name a given
  /// event type's property is bound to.
  pub fn property_object_type(&self, event_type_name: &str, property_name: &str) -> Option<&str> {
    self.event_types.get(event_type_name)?.property(property_name).map(|p| p.object_type_name())
  }

  pub fn unique_properties(&self, event_type_name: &str) -> Vec<&str> {
    self.event_types.get(event_type_name).map(|et| et.unique_properties().map(|p| p.name()).collect()).unwrap_or_default()
  }

  pub fn mandatory_properties(&self, event_type_name: &str) -> Vec<&str> {
    self.event_types.get(event_type_name).map(|et| et.mandatory_properties().map(|p| p.name()).collect()).unwrap_or_default()
  }

  pub fn singleton_properties(&self, event_type_name: &str) -> Vec<&str> {
    self.event_types.get(event_type_name).map(|et| et.singleton_properties().map(|p| p.name()).collect()).unwrap_or_default()
  }

  pub fn event_type_is_unique(&self, event_type_name: &str) -> bool {
    self.event_types.get(event_type_name).map(EventType::is_unique).unwrap_or(false)
  }

  /// `event_types_having_object_type` (spec §4.2): every event type with
  /// at least one property bound to `object_type_name`.
  pub fn event_types_having_object_type(&self, object_type_name: &str) -> impl Iterator<Item = &EventType> {
    self
      .event_types
      .values()
      .filter(move |et| et.properties().any(|p| p.object_type_name() == object_type_name))
  }

  /// `event_types_in_class(es)` (spec §4.2): every event type whose
  /// comma-separated class list contains any of `classes`.
  pub fn event_types_in_class(&self, classes: &[&str]) -> impl Iterator<Item = &EventType> + '_ {
    let wanted: std::collections::BTreeSet<&str> = classes.iter().copied().collect();
    self.event_types.values().filter(move |et| et.classlist().iter().any(|c| wanted.contains(c.as_str())))
  }

  pub fn source_id_for_url(&self, url: &str) -> Option<u32> {
    self.sources.get(url).map(Source::source_id)
  }

  pub fn source_url_for_id(&self, id: u32) -> Option<&str> {
    self.sources.values().find(|s| s.source_id() == id).map(Source::uri)
  }

  /// Renumber every source to consecutive positive integers in URL order
  /// and return the URL -> new-id mapping, for callers merging documents
  /// whose numeric source ids collided (spec §4.2).
  pub fn unique_source_ids(&mut self) -> BTreeMap<String, u32> {
    let mut mapping = BTreeMap::new();
    for (i, (url, source)) in self.sources.iter_mut().enumerate() {
      let new_id = (i + 1) as u32;
      source.set_source_id(new_id);
      mapping.insert(url.clone(), new_id);
    }
    mapping
  }

  /// Every property of every event type must name an object type that
  /// has actually been registered (spec §4.2 invariant 2).
  pub fn check_property_object_types(&self, ctx: &mut ProcessingContext) -> Result<(), EdxmlError> {
    for event_type in self.event_types.values() {
      for property in event_type.properties() {
        if self.object_types.get(property.object_type_name()).is_none() {
          ctx.record_error();
          return Err(EdxmlError::SchemaInconsistency(
            format!("{}/{}", event_type.name(), property.name()),
            format!("references undefined object type '{}'", property.object_type_name()),
          ));
        }
      }
    }
    Ok(())
  }

  /// Every relation's two properties must be declared on the owning
  /// event type (spec §4.2 invariant 4), and every relation's
  /// description must carry both `[[property1]]` and `[[property2]]`
  /// placeholders (spec §3 invariant 4).
  pub fn check_event_type_relations(&self, ctx: &mut ProcessingContext) -> Result<(), EdxmlError> {
    for event_type in self.event_types.values() {
      for relation in event_type.relations() {
        if !relation.has_valid_placeholders() {
          ctx.record_error();
          return Err(EdxmlError::SchemaInconsistency(
            event_type.name().to_string(),
            format!(
              "relation between '{}' and '{}' has a description missing [[property1]]/[[property2]] placeholders",
              relation.property_name(),
              relation.related_property_name()
            ),
          ));
        }
        for property_name in relation.referenced_properties() {
          if event_type.property(property_name).is_none() {
            ctx.record_error();
            return Err(EdxmlError::SchemaInconsistency(
              event_type.name().to_string(),
              format!("relation references undeclared property '{}'", property_name),
            ));
          }
        }
      }
    }
    Ok(())
  }

  /// A declared parent event type must exist, every property named in
  /// its property map must exist on both the child and the parent event
  /// type, every unique property of the parent must be mapped to some
  /// child property, and every mapped child property's merge strategy
  /// must be `match` or `drop` (spec §3 invariant 2: a parent definition
  /// "maps every unique property of the parent to a child property whose
  /// merge strategy is `match` or `drop`").
  pub fn check_event_type_parents(&self, ctx: &mut ProcessingContext) -> Result<(), EdxmlError> {
    use crate::property::MergeStrategy;

    for event_type in self.event_types.values() {
      let Some(parent) = event_type.parent() else { continue };
      let Some(parent_event_type) = self.event_types.get(&parent.event_type_name) else {
        ctx.record_error();
        return Err(EdxmlError::SchemaInconsistency(
          event_type.name().to_string(),
          format!("parent event type '{}' is not defined", parent.event_type_name),
        ));
      };
      for (child_property, parent_property) in &parent.property_map {
        let Some(child_property) = event_type.property(child_property) else {
          ctx.record_error();
          return Err(EdxmlError::SchemaInconsistency(
            event_type.name().to_string(),
            format!("parent property map references undeclared property '{}'", child_property),
          ));
        };
        if parent_event_type.property(parent_property).is_none() {
          ctx.record_error();
          return Err(EdxmlError::SchemaInconsistency(
            event_type.name().to_string(),
            format!("parent property map references undeclared parent property '{}'", parent_property),
          ));
        }
        if !matches!(child_property.merge_strategy(), MergeStrategy::Match | MergeStrategy::Drop) {
          ctx.record_error();
          return Err(EdxmlError::SchemaInconsistency(
            event_type.name().to_string(),
            format!("parent property map maps '{}' whose merge strategy is not match or drop", child_property.name()),
          ));
        }
      }
      for unique in parent_event_type.unique_properties() {
        if !parent.property_map.values().any(|mapped| mapped.as_str() == unique.name()) {
          ctx.record_error();
          return Err(EdxmlError::SchemaInconsistency(
            event_type.name().to_string(),
            format!("parent property map does not map parent's unique property '{}'", unique.name()),
          ));
        }
      }
    }
    Ok(())
  }

  /// Short and long reporter strings must resolve every placeholder
  /// against the owning event type's declared properties and the
  /// formatter table, with formatters checked against the property's
  /// resolved data type (spec §4.5). A property never referenced by
  /// either reporter string is logged as a warning, not an error.
  pub fn check_reporter_strings(&self, ctx: &mut ProcessingContext) -> Result<(), EdxmlError> {
    for event_type in self.event_types.values() {
      let object_type_of = |object_type_name: &str| self.object_types.get(object_type_name).map(|ot| ot.data_type().clone());
      for (label, template) in [("reporter", event_type.reporter_short()), ("reporter-html", event_type.reporter_long())] {
        let Some(template) = template else { continue };
        let path = format!("{}/{}", event_type.name(), label);
        if let Err(e) = template.check_completeness(&path, event_type, object_type_of) {
          ctx.record_error();
          return Err(e);
        }
        for property_name in template.unreferenced_properties(event_type) {
          ctx.warn(format!("{}: property '{}' is never referenced by {}", event_type.name(), property_name, label));
        }
      }
    }
    Ok(())
  }

  /// Run every cross-definition check; called once the schema section of
  /// a document (or the accumulated schema across several documents) is
  /// considered closed (spec §4.2: "DefinitionsLoaded").
  pub fn finalize(&self, ctx: &mut ProcessingContext) -> Result<(), EdxmlError> {
    self.check_property_object_types(ctx)?;
    self.check_event_type_relations(ctx)?;
    self.check_event_type_parents(ctx)?;
    self.check_reporter_strings(ctx)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::datatype::DataType;
  use crate::property::Property;
  use crate::relation::{Relation, RelationType};
  use std::str::FromStr;

  #[test]
  fn rejects_conflicting_object_type_redefinition() {
    let mut registry = SchemaRegistry::new();
    let dt = DataType::from_str("boolean").unwrap();
    registry.add_object_type(ObjectType::new("flag", dt.clone())).unwrap();
    let other_dt = DataType::from_str("number:int").unwrap();
    assert!(registry.add_object_type(ObjectType::new("flag", other_dt)).is_err());
  }

  #[test]
  fn accepts_identical_redefinition() {
    let mut registry = SchemaRegistry::new();
    let dt = DataType::from_str("boolean").unwrap();
    registry.add_object_type(ObjectType::new("flag", dt.clone())).unwrap();
    assert!(registry.add_object_type(ObjectType::new("flag", dt)).is_ok());
  }

  #[test]
  fn finalize_detects_missing_object_type() {
    let mut registry = SchemaRegistry::new();
    let mut et = EventType::new("test");
    et.add_property(Property::new("x", "missing-object-type"));
    registry.add_event_type(et).unwrap();
    let mut ctx = ProcessingContext::new();
    assert!(registry.finalize(&mut ctx).is_err());
  }

  #[test]
  fn finalize_detects_undeclared_relation_property() {
    let mut registry = SchemaRegistry::new();
    let dt = DataType::from_str("boolean").unwrap();
    registry.add_object_type(ObjectType::new("flag", dt)).unwrap();
    let mut et = EventType::new("test");
    et.add_property(Property::new("x", "flag"));
    et.add_relation(Relation::new("x", "y", RelationType::Other, "related to"));
    registry.add_event_type(et).unwrap();
    let mut ctx = ProcessingContext::new();
    assert!(registry.finalize(&mut ctx).is_err());
  }

  /// S6 (spec §8): re-registering event type `e` with a different
  /// `description` reports `SchemaInconsistency` naming
  /// `eventtype/e/description`.
  #[test]
  fn s6_pinned_event_type_redefinition_conflict() {
    let mut registry = SchemaRegistry::new();
    registry.add_event_type(EventType::new("e").set_description("first".to_string())).unwrap();
    let err = registry.add_event_type(EventType::new("e").set_description("second".to_string())).unwrap_err();
    match err {
      EdxmlError::SchemaInconsistency(path, _) => assert_eq!(path, "eventtype/e/description"),
      other => panic!("expected SchemaInconsistency, got {:?}", other),
    }
  }

  #[test]
  fn re_registration_adopts_new_properties() {
    let mut registry = SchemaRegistry::new();
    registry.add_event_type(EventType::new("e")).unwrap();
    let mut second = EventType::new("e");
    second.add_property(Property::new("x", "flag"));
    registry.add_event_type(second).unwrap();
    assert!(registry.event_type("e").unwrap().property("x").is_some());
  }

  #[test]
  fn source_ids_are_assigned_and_renumbered() {
    let mut registry = SchemaRegistry::new();
    registry.add_source(Source::new("/a")).unwrap();
    registry.add_source(Source::new("/b")).unwrap();
    assert_eq!(registry.source_id_for_url("/a"), Some(1));
    assert_eq!(registry.source_id_for_url("/b"), Some(2));
    assert_eq!(registry.source_url_for_id(1), Some("/a"));

    let mapping = registry.unique_source_ids();
    assert_eq!(mapping.len(), 2);
    assert_eq!(registry.source_id_for_url("/a"), Some(*mapping.get("/a").unwrap()));
  }

  #[test]
  fn finalize_detects_unresolvable_reporter_placeholder() {
    use crate::reporter::ReporterTemplate;
    let mut registry = SchemaRegistry::new();
    let dt = DataType::from_str("boolean").unwrap();
    registry.add_object_type(ObjectType::new("flag", dt)).unwrap();
    let mut et = EventType::new("test");
    et.add_property(Property::new("x", "flag"));
    let et = et.set_reporter_short(ReporterTemplate::new("saw [[bogus]]"));
    registry.add_event_type(et).unwrap();
    let mut ctx = ProcessingContext::new();
    assert!(registry.finalize(&mut ctx).is_err());
  }

  #[test]
  fn finalize_warns_about_unreferenced_property() {
    use crate::reporter::ReporterTemplate;
    let mut registry = SchemaRegistry::new();
    let dt = DataType::from_str("boolean").unwrap();
    registry.add_object_type(ObjectType::new("flag", dt)).unwrap();
    let mut et = EventType::new("test");
    et.add_property(Property::new("x", "flag"));
    let et = et.set_reporter_short(ReporterTemplate::new("nothing referenced here"));
    registry.add_event_type(et).unwrap();
    let mut ctx = ProcessingContext::new();
    registry.finalize(&mut ctx).unwrap();
    assert_eq!(ctx.warning_count(), 1);
  }

  /// spec §4.2: attribute grammar enforced on first registration, valid
  /// and invalid case for `Source`'s `date-acquired`.
  #[test]
  fn rejects_source_with_malformed_date_acquired() {
    let mut registry = SchemaRegistry::new();
    let bad = Source::new("/a").set_date_acquired("not-a-date".to_string());
    assert!(registry.add_source(bad).is_err());

    let mut registry = SchemaRegistry::new();
    let good = Source::new("/a").set_date_acquired("20240101".to_string());
    assert!(registry.add_source(good).is_ok());
  }

  /// spec §4.2: valid and invalid case for `ObjectType`'s `description`
  /// length limit.
  #[test]
  fn rejects_object_type_with_oversized_description() {
    let dt = DataType::from_str("boolean").unwrap();
    let mut registry = SchemaRegistry::new();
    let bad = ObjectType::new("flag", dt.clone()).set_description("x".repeat(129));
    assert!(registry.add_object_type(bad).is_err());

    let mut registry = SchemaRegistry::new();
    let good = ObjectType::new("flag", dt).set_description("x".repeat(128));
    assert!(registry.add_object_type(good).is_ok());
  }

  /// spec §4.2: valid and invalid case for `Property`'s `name` pattern,
  /// enforced from `add_event_type` without changing `add_property`'s
  /// signature.
  #[test]
  fn rejects_event_type_with_invalid_property_name() {
    let mut registry = SchemaRegistry::new();
    let mut et = EventType::new("e");
    et.add_property(Property::new("", "flag"));
    assert!(registry.add_event_type(et).is_err());

    let mut registry = SchemaRegistry::new();
    let mut et = EventType::new("e");
    et.add_property(Property::new("x", "flag"));
    assert!(registry.add_event_type(et).is_ok());
  }

  /// spec §3 invariant 2: a parent map must cover every unique property
  /// of the parent, and each mapped child property's merge strategy must
  /// be `match` or `drop`.
  #[test]
  fn parent_map_must_cover_every_unique_parent_property() {
    use crate::event_type::EventTypeParent;
    use crate::property::MergeStrategy;
    let dt = DataType::from_str("boolean").unwrap();

    let mut registry = SchemaRegistry::new();
    registry.add_object_type(ObjectType::new("flag", dt)).unwrap();
    let mut parent = EventType::new("p");
    parent.add_property(Property::new("id", "flag").set_unique(true));
    registry.add_event_type(parent).unwrap();

    // Valid: the parent's only unique property is mapped, and the
    // mapped child property's merge strategy is the default (drop).
    let mut child = EventType::new("c");
    child.add_property(Property::new("id", "flag"));
    let mut property_map = BTreeMap::new();
    property_map.insert("id".to_string(), "id".to_string());
    let child = child.set_parent(EventTypeParent { event_type_name: "p".to_string(), property_map });
    registry.add_event_type(child).unwrap();
    let mut ctx = ProcessingContext::new();
    assert!(registry.finalize(&mut ctx).is_ok());

    // Invalid: the parent map is empty, so its unique property is unmapped.
    let mut registry = SchemaRegistry::new();
    registry.add_object_type(ObjectType::new("flag", DataType::from_str("boolean").unwrap())).unwrap();
    let mut parent = EventType::new("p");
    parent.add_property(Property::new("id", "flag").set_unique(true));
    registry.add_event_type(parent).unwrap();
    let mut child = EventType::new("c");
    child.add_property(Property::new("id", "flag"));
    let child = child.set_parent(EventTypeParent { event_type_name: "p".to_string(), property_map: BTreeMap::new() });
    registry.add_event_type(child).unwrap();
    let mut ctx = ProcessingContext::new();
    assert!(registry.finalize(&mut ctx).is_err());

    // Invalid: mapped but the child property's merge strategy is neither
    // match nor drop.
    let mut registry = SchemaRegistry::new();
    registry.add_object_type(ObjectType::new("flag", DataType::from_str("boolean").unwrap())).unwrap();
    let mut parent = EventType::new("p");
    parent.add_property(Property::new("id", "flag").set_unique(true));
    registry.add_event_type(parent).unwrap();
    let mut child = EventType::new("c");
    child.add_property(Property::new("id", "flag").set_merge(MergeStrategy::Add));
    let mut property_map = BTreeMap::new();
    property_map.insert("id".to_string(), "id".to_string());
    let child = child.set_parent(EventTypeParent { event_type_name: "p".to_string(), property_map });
    registry.add_event_type(child).unwrap();
    let mut ctx = ProcessingContext::new();
    assert!(registry.finalize(&mut ctx).is_err());
  }

  #[test]
  fn derived_sets_reflect_merge_strategy_and_uniqueness() {
    use crate::property::MergeStrategy;
    let mut registry = SchemaRegistry::new();
    let mut et = EventType::new("e");
    et.add_property(Property::new("u", "flag").set_unique(true));
    et.add_property(Property::new("m", "flag").set_merge(MergeStrategy::Min));
    et.add_property(Property::new("d", "flag"));
    registry.add_event_type(et).unwrap();

    assert!(registry.event_type_is_unique("e"));
    assert_eq!(registry.unique_properties("e"), vec!["u"]);
    let mandatory = registry.mandatory_properties("e");
    assert!(mandatory.contains(&"u") && mandatory.contains(&"m") && !mandatory.contains(&"d"));
  }
}
