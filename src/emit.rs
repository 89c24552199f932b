//! C7: the schema emitter. Re-serializes a registry's accumulated
//! definitions back to EDXML XML (spec §4.2: "a loaded and re-emitted
//! schema section must be semantically identical to the input, though
//! not necessarily byte-identical"), and additionally renders an XSD and
//! a RelaxNG fragment describing the same schema, enrichments supplied
//! because downstream validators outside this crate's scope commonly
//! consume one of those formats rather than EDXML's own definitions
//! section.

use std::fmt::Write as _;

use crate::registry::SchemaRegistry;
use crate::EdxmlError;

/// Render the `<definitions>` section: `<objecttypes>`, `<eventtypes>`
/// and `<sources>` sub-sections (spec §6), each entity written in
/// canonical (sorted-by-name) order for reproducibility across runs. Not
/// necessarily byte-identical to the input, but semantically so (spec
/// §4.2: "a loaded and re-emitted schema section must be semantically
/// identical to the input").
pub fn emit_definitions_xml(registry: &SchemaRegistry) -> Result<String, EdxmlError> {
  let mut out = String::new();
  writeln!(out, "<definitions>").map_err(io_err)?;

  writeln!(out, "  <objecttypes>").map_err(io_err)?;
  for object_type in registry_object_types_sorted(registry) {
    writeln!(
      out,
      "    <objecttype name=\"{}\" data-type=\"{}\" display-name-singular=\"{}\" display-name-plural=\"{}\" />",
      object_type.name(),
      object_type.data_type(),
      object_type.display_name_singular(),
      object_type.display_name_plural(),
    )
    .map_err(io_err)?;
  }
  writeln!(out, "  </objecttypes>").map_err(io_err)?;

  writeln!(out, "  <eventtypes>").map_err(io_err)?;
  for event_type in registry.event_types() {
    writeln!(out, "    <eventtype name=\"{}\" unique=\"{}\">", event_type.name(), event_type.is_unique()).map_err(io_err)?;
    writeln!(out, "      <properties>").map_err(io_err)?;
    for property in event_type.properties() {
      writeln!(
        out,
        "        <property name=\"{}\" object-type=\"{}\" unique=\"{}\" merge=\"{}\" />",
        property.name(),
        property.object_type_name(),
        property.is_unique(),
        property.merge_strategy(),
      )
      .map_err(io_err)?;
    }
    writeln!(out, "      </properties>").map_err(io_err)?;
    if !event_type.relations().is_empty() {
      writeln!(out, "      <relations>").map_err(io_err)?;
      for relation in event_type.relations() {
        let [a, b] = relation.referenced_properties();
        writeln!(out, "        <relation property1=\"{}\" property2=\"{}\" predicate=\"{}\" />", a, b, relation.predicate()).map_err(io_err)?;
      }
      writeln!(out, "      </relations>").map_err(io_err)?;
    }
    if let Some(parent) = event_type.parent() {
      writeln!(out, "      <parent event-type=\"{}\">", parent.event_type_name).map_err(io_err)?;
      for (child_property, parent_property) in &parent.property_map {
        writeln!(out, "        <propertymap child=\"{}\" parent=\"{}\" />", child_property, parent_property).map_err(io_err)?;
      }
      writeln!(out, "      </parent>").map_err(io_err)?;
    }
    writeln!(out, "    </eventtype>").map_err(io_err)?;
  }
  writeln!(out, "  </eventtypes>").map_err(io_err)?;

  writeln!(out, "  <sources>").map_err(io_err)?;
  for source in registry.sources() {
    writeln!(
      out,
      "    <source source-id=\"{}\" url=\"{}\" date-acquired=\"{}\" description=\"{}\" />",
      source.source_id(),
      source.uri(),
      source.date_acquired().unwrap_or(""),
      source.description(),
    )
    .map_err(io_err)?;
  }
  writeln!(out, "  </sources>").map_err(io_err)?;

  writeln!(out, "</definitions>").map_err(io_err)?;
  Ok(out)
}

fn registry_object_types_sorted(registry: &SchemaRegistry) -> Vec<&crate::object_type::ObjectType> {
  let mut names: Vec<&str> = registry.event_types().flat_map(|et| et.properties().map(|p| p.object_type_name())).collect();
  names.sort_unstable();
  names.dedup();
  names.into_iter().filter_map(|name| registry.object_type(name)).collect()
}

fn io_err(err: std::fmt::Error) -> EdxmlError {
  EdxmlError::Custom(format!("formatting error while emitting schema: {}", err))
}

/// Render an XSD fragment that constrains an event's properties to the
/// declared set of names, for consumers that validate EDXML instance
/// documents with a generic XML toolchain rather than this crate.
pub fn emit_xsd(registry: &SchemaRegistry) -> Result<String, EdxmlError> {
  let mut out = String::new();
  writeln!(out, "<xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\">").map_err(io_err)?;
  for event_type in registry.event_types() {
    writeln!(out, "  <xs:element name=\"{}-event\">", event_type.name()).map_err(io_err)?;
    writeln!(out, "    <xs:complexType>").map_err(io_err)?;
    writeln!(out, "      <xs:sequence>").map_err(io_err)?;
    for property in event_type.properties() {
      let occurs = if property.is_mandatory() { "1" } else { "0" };
      let max_occurs = if property.is_single_valued() { "1" } else { "unbounded" };
      writeln!(
        out,
        "        <xs:element name=\"{}\" minOccurs=\"{}\" maxOccurs=\"{}\" />",
        property.name(),
        occurs,
        max_occurs
      )
      .map_err(io_err)?;
    }
    writeln!(out, "      </xs:sequence>").map_err(io_err)?;
    writeln!(out, "    </xs:complexType>").map_err(io_err)?;
    writeln!(out, "  </xs:element>").map_err(io_err)?;
  }
  writeln!(out, "</xs:schema>").map_err(io_err)?;
  Ok(out)
}

/// Render a minimal RelaxNG fragment, for the same reason as
/// [`emit_xsd`] but for toolchains that prefer RelaxNG.
pub fn emit_relax_ng(registry: &SchemaRegistry) -> Result<String, EdxmlError> {
  let mut out = String::new();
  writeln!(out, "<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\">").map_err(io_err)?;
  writeln!(out, "  <start>").map_err(io_err)?;
  writeln!(out, "    <choice>").map_err(io_err)?;
  for event_type in registry.event_types() {
    writeln!(out, "      <ref name=\"{}-event\" />", event_type.name()).map_err(io_err)?;
  }
  writeln!(out, "    </choice>").map_err(io_err)?;
  writeln!(out, "  </start>").map_err(io_err)?;
  for event_type in registry.event_types() {
    writeln!(out, "  <define name=\"{}-event\">", event_type.name()).map_err(io_err)?;
    writeln!(out, "    <element name=\"event\">").map_err(io_err)?;
    for property in event_type.properties() {
      let wrap: (&str, &str) = if property.is_mandatory() { ("", "") } else { ("<optional>", "</optional>") };
      writeln!(out, "      {}<element name=\"{}\"><text/></element>{}", wrap.0, property.name(), wrap.1).map_err(io_err)?;
    }
    writeln!(out, "    </element>").map_err(io_err)?;
    writeln!(out, "  </define>").map_err(io_err)?;
  }
  writeln!(out, "</grammar>").map_err(io_err)?;
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::datatype::DataType;
  use crate::event_type::EventType;
  use crate::object_type::ObjectType;
  use crate::property::Property;
  use std::str::FromStr;

  fn sample_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.add_object_type(ObjectType::new("ip", DataType::from_str("ip").unwrap())).unwrap();
    let mut et = EventType::new("connection").set_unique(true);
    et.add_property(Property::new("source-ip", "ip").set_unique(true));
    registry.add_event_type(et).unwrap();
    registry
  }

  #[test]
  fn emits_definitions_with_event_type_and_property() {
    let xml = emit_definitions_xml(&sample_registry()).unwrap();
    assert!(xml.contains("<eventtype name=\"connection\""));
    assert!(xml.contains("<property name=\"source-ip\" object-type=\"ip\""));
  }

  #[test]
  fn emits_source_with_registry_assigned_id() {
    let mut registry = sample_registry();
    registry.add_source(crate::source::Source::new("/source/")).unwrap();
    let xml = emit_definitions_xml(&registry).unwrap();
    assert!(xml.contains("<source source-id=\"1\" url=\"/source/\""));
  }

  #[test]
  fn emits_xsd_with_mandatory_cardinality() {
    let xsd = emit_xsd(&sample_registry()).unwrap();
    assert!(xsd.contains("minOccurs=\"1\""));
  }

  #[test]
  fn emits_relax_ng_grammar() {
    let rng = emit_relax_ng(&sample_registry()).unwrap();
    assert!(rng.contains("<define name=\"connection-event\">"));
  }
}
