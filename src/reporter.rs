//! C3: reporter-string mini-language validator (spec §4.5). A reporter
//! string is free text interspersed with `[[name]]` and
//! `[[FORMATTER:args[:opts]]]` placeholders; this module parses that
//! grammar, checks bracket balance, and checks each placeholder against
//! the owning event type's properties and the formatter table.

use crate::datatype::DataType;
use crate::event_type::EventType;
use crate::EdxmlError;

#[derive(Clone, Debug)]
pub struct ReporterTemplate {
  raw: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Placeholder {
  /// `[[name]]`
  Property(String),
  /// `[[FORMATTER:arg1:arg2...]]`
  Formatter { name: String, args: Vec<String> },
}

impl ReporterTemplate {
  pub fn new(raw: impl Into<String>) -> Self {
    ReporterTemplate { raw: raw.into() }
  }

  pub fn raw(&self) -> &str {
    &self.raw
  }

  /// Split the template into literal-text and placeholder segments,
  /// rejecting unbalanced or nested `[[`/`]]` delimiters (spec §4.5:
  /// "brackets must balance; placeholders do not nest").
  fn parse(&self, path: &str) -> Result<Vec<Placeholder>, EdxmlError> {
    let mut placeholders = Vec::new();
    let mut rest = self.raw.as_str();
    loop {
      match rest.find("[[") {
        None => {
          if rest.contains("]]") {
            return Err(EdxmlError::ReporterError(path.to_string(), "unmatched ']]' in reporter string".to_string()));
          }
          break;
        }
        Some(open) => {
          let after_open = &rest[open + 2..];
          if after_open.contains("[[") && after_open.find("[[").unwrap() < after_open.find("]]").unwrap_or(usize::MAX) {
            return Err(EdxmlError::ReporterError(path.to_string(), "nested '[[' inside a placeholder".to_string()));
          }
          let close = after_open
            .find("]]")
            .ok_or_else(|| EdxmlError::ReporterError(path.to_string(), "unmatched '[[' in reporter string".to_string()))?;
          let body = &after_open[..close];
          placeholders.push(parse_placeholder(body, path)?);
          rest = &after_open[close + 2..];
        }
      }
    }
    Ok(placeholders)
  }

  /// Check every placeholder against the owning event type's properties
  /// and the formatter table (spec §4.5: "every `[[name]]` must name a
  /// declared property; every formatter invocation must be well-formed
  /// for its property's data type"). `object_type_of` resolves a
  /// property's object type name to its data type, to check formatters
  /// that require a specific property kind (timestamp, boolean).
  pub fn check_completeness(&self, path: &str, event_type: &EventType, object_type_of: impl Fn(&str) -> Option<DataType>) -> Result<(), EdxmlError> {
    check_brace_depth(path, &self.raw)?;
    for placeholder in self.parse(path)? {
      match placeholder {
        Placeholder::Property(name) => {
          event_type
            .property(&name)
            .ok_or_else(|| EdxmlError::ReporterError(path.to_string(), format!("unknown property '{}'", name)))?;
        }
        Placeholder::Formatter { name, args } => {
          check_formatter(path, &name, &args, event_type, &object_type_of)?;
        }
      }
    }
    Ok(())
  }

  /// Properties of `event_type` that no placeholder in this template
  /// references (spec §4.5: "`check_completeness=true` additionally
  /// warns when a property of the event type is not referenced"). Does
  /// not itself validate the template; call after `check_completeness`.
  pub fn unreferenced_properties<'a>(&self, event_type: &'a EventType) -> Vec<&'a str> {
    let referenced: std::collections::BTreeSet<String> = self
      .parse("")
      .unwrap_or_default()
      .into_iter()
      .flat_map(|p| match p {
        Placeholder::Property(name) => vec![name],
        Placeholder::Formatter { args, .. } => args.first().map(|a| a.split(',').map(str::to_string).collect()).unwrap_or_default(),
      })
      .collect();
    event_type.properties().map(|p| p.name()).filter(|name| !referenced.contains(*name)).collect()
  }
}

/// Scan for balanced `{`/`}` (spec §3 invariant 5, §4.5: "no negative
/// depth; final depth zero"), independent of and in addition to the
/// `[[`/`]]` placeholder balance checked by [`ReporterTemplate::parse`].
fn check_brace_depth(path: &str, raw: &str) -> Result<(), EdxmlError> {
  let mut depth: i32 = 0;
  for c in raw.chars() {
    match c {
      '{' => depth += 1,
      '}' => {
        depth -= 1;
        if depth < 0 {
          return Err(EdxmlError::ReporterError(path.to_string(), "'}' encountered with no matching '{'".to_string()));
        }
      }
      _ => {}
    }
  }
  if depth != 0 {
    return Err(EdxmlError::ReporterError(path.to_string(), "unbalanced '{' with no matching '}'".to_string()));
  }
  Ok(())
}

fn parse_placeholder(body: &str, path: &str) -> Result<Placeholder, EdxmlError> {
  if body.is_empty() {
    return Err(EdxmlError::ReporterError(path.to_string(), "empty placeholder".to_string()));
  }
  let parts: Vec<&str> = body.split(':').collect();
  if parts.len() == 1 {
    Ok(Placeholder::Property(parts[0].to_string()))
  } else {
    Ok(Placeholder::Formatter { name: parts[0].to_string(), args: parts[1..].iter().map(|s| s.to_string()).collect() })
  }
}

#[derive(Clone, Copy)]
enum ArgShape {
  /// Two property names, comma-separated within a single colon segment
  /// (spec §4.5: "two properties, comma-separated"), both timestamp.
  TimestampPair,
  /// One property, required to be a timestamp.
  Timestamp,
  /// One property, any object type, no further options.
  AnyNoOpts,
  /// One property, required to be boolean.
  BooleanNoOpts,
  /// One boolean property plus two literal option strings.
  BooleanStringChoice,
  /// One property plus one literal argument (CURRENCY, EMPTY).
  WithLiteral,
}

const KNOWN_FORMATTERS: &[(&str, ArgShape)] = &[
  ("TIMESPAN", ArgShape::TimestampPair),
  ("DURATION", ArgShape::TimestampPair),
  ("DATE", ArgShape::Timestamp),
  ("DATETIME", ArgShape::Timestamp),
  ("FULLDATETIME", ArgShape::Timestamp),
  ("WEEK", ArgShape::Timestamp),
  ("MONTH", ArgShape::Timestamp),
  ("YEAR", ArgShape::Timestamp),
  ("LATITUDE", ArgShape::AnyNoOpts),
  ("LONGITUDE", ArgShape::AnyNoOpts),
  ("BYTECOUNT", ArgShape::AnyNoOpts),
  ("COUNTRYCODE", ArgShape::AnyNoOpts),
  ("FILESERVER", ArgShape::AnyNoOpts),
  ("BOOLEAN_ON_OFF", ArgShape::BooleanNoOpts),
  ("BOOLEAN_IS_ISNOT", ArgShape::BooleanNoOpts),
  ("BOOLEAN_STRINGCHOICE", ArgShape::BooleanStringChoice),
  ("CURRENCY", ArgShape::WithLiteral),
  ("EMPTY", ArgShape::WithLiteral),
];

fn resolve_property<'a>(path: &str, event_type: &'a EventType, name: &str) -> Result<&'a crate::property::Property, EdxmlError> {
  event_type.property(name).ok_or_else(|| EdxmlError::ReporterError(path.to_string(), format!("unknown property '{}'", name)))
}

fn require_kind(path: &str, event_type: &EventType, object_type_of: &impl Fn(&str) -> Option<DataType>, property_name: &str, is_required_kind: impl Fn(&DataType) -> bool, kind: &str) -> Result<(), EdxmlError> {
  let property = resolve_property(path, event_type, property_name)?;
  if let Some(data_type) = object_type_of(property.object_type_name()) {
    if !is_required_kind(&data_type) {
      return Err(EdxmlError::ReporterError(path.to_string(), format!("property '{}' must be {} for this formatter", property_name, kind)));
    }
  }
  Ok(())
}

fn check_formatter(path: &str, name: &str, args: &[String], event_type: &EventType, object_type_of: &impl Fn(&str) -> Option<DataType>) -> Result<(), EdxmlError> {
  let (_, shape) = KNOWN_FORMATTERS
    .iter()
    .find(|(formatter_name, _)| *formatter_name == name)
    .ok_or_else(|| EdxmlError::ReporterError(path.to_string(), format!("unknown formatter '{}'", name)))?;
  let is_timestamp = |dt: &DataType| matches!(dt, DataType::Timestamp);
  let is_boolean = |dt: &DataType| matches!(dt, DataType::Boolean);
  match shape {
    ArgShape::TimestampPair => {
      let pair = args.first().ok_or_else(|| EdxmlError::ReporterError(path.to_string(), format!("formatter '{}' requires two properties", name)))?;
      let props: Vec<&str> = pair.split(',').collect();
      if props.len() != 2 {
        return Err(EdxmlError::ReporterError(path.to_string(), format!("formatter '{}' requires two comma-separated properties", name)));
      }
      for p in props {
        require_kind(path, event_type, object_type_of, p, is_timestamp, "a timestamp")?;
      }
      Ok(())
    }
    ArgShape::Timestamp => {
      let p = args.first().ok_or_else(|| EdxmlError::ReporterError(path.to_string(), format!("formatter '{}' requires a property", name)))?;
      require_kind(path, event_type, object_type_of, p, is_timestamp, "a timestamp")
    }
    ArgShape::AnyNoOpts => {
      let p = args.first().ok_or_else(|| EdxmlError::ReporterError(path.to_string(), format!("formatter '{}' requires a property", name)))?;
      resolve_property(path, event_type, p).map(|_| ())
    }
    ArgShape::BooleanNoOpts => {
      let p = args.first().ok_or_else(|| EdxmlError::ReporterError(path.to_string(), format!("formatter '{}' requires a property", name)))?;
      require_kind(path, event_type, object_type_of, p, is_boolean, "boolean")
    }
    ArgShape::BooleanStringChoice => {
      if args.len() != 3 {
        return Err(EdxmlError::ReporterError(path.to_string(), format!("formatter '{}' requires a property and two literal options", name)));
      }
      require_kind(path, event_type, object_type_of, &args[0], is_boolean, "boolean")
    }
    ArgShape::WithLiteral => {
      if args.len() != 2 {
        return Err(EdxmlError::ReporterError(path.to_string(), format!("formatter '{}' requires a property and one literal argument", name)));
      }
      resolve_property(path, event_type, &args[0]).map(|_| ())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::property::Property;

  fn sample_event_type() -> EventType {
    let mut et = EventType::new("test-event");
    et.add_property(Property::new("ip", "computer.ip-address"));
    et.add_property(Property::new("seen", "datetime.iso8601"));
    et.add_property(Property::new("active", "boolean.flag"));
    et
  }

  fn no_types(_name: &str) -> Option<DataType> {
    None
  }

  fn typed(name: &str) -> Option<DataType> {
    match name {
      "datetime.iso8601" => Some(DataType::Timestamp),
      "boolean.flag" => Some(DataType::Boolean),
      _ => None,
    }
  }

  #[test]
  fn plain_property_reference() {
    let template = ReporterTemplate::new("Connection from [[ip]]");
    assert!(template.check_completeness("test-event", &sample_event_type(), no_types).is_ok());
  }

  #[test]
  fn formatter_reference() {
    let template = ReporterTemplate::new("Used [[BYTECOUNT:ip]] bytes");
    assert!(template.check_completeness("test-event", &sample_event_type(), no_types).is_ok());
  }

  #[test]
  fn unknown_property_rejected() {
    let template = ReporterTemplate::new("[[bogus]]");
    assert!(template.check_completeness("test-event", &sample_event_type(), no_types).is_err());
  }

  #[test]
  fn unbalanced_brackets_rejected() {
    let template = ReporterTemplate::new("[[ip] unbalanced");
    assert!(template.check_completeness("test-event", &sample_event_type(), no_types).is_err());
  }

  #[test]
  fn unknown_formatter_rejected() {
    let template = ReporterTemplate::new("[[BOGUS:ip]]");
    assert!(template.check_completeness("test-event", &sample_event_type(), no_types).is_err());
  }

  #[test]
  fn timestamp_pair_formatter_requires_two_timestamps() {
    let ok = ReporterTemplate::new("Lasted [[TIMESPAN:seen,seen]]");
    assert!(ok.check_completeness("test-event", &sample_event_type(), typed).is_ok());
    let bad = ReporterTemplate::new("Lasted [[TIMESPAN:seen,ip]]");
    assert!(bad.check_completeness("test-event", &sample_event_type(), typed).is_err());
  }

  #[test]
  fn boolean_formatter_requires_boolean_property() {
    let ok = ReporterTemplate::new("[[BOOLEAN_ON_OFF:active]]");
    assert!(ok.check_completeness("test-event", &sample_event_type(), typed).is_ok());
    let bad = ReporterTemplate::new("[[BOOLEAN_ON_OFF:ip]]");
    assert!(bad.check_completeness("test-event", &sample_event_type(), typed).is_err());
  }

  #[test]
  fn boolean_stringchoice_requires_property_and_two_literals() {
    let template = ReporterTemplate::new("[[BOOLEAN_STRINGCHOICE:active:on:off]]");
    assert!(template.check_completeness("test-event", &sample_event_type(), typed).is_ok());
  }

  #[test]
  fn currency_requires_property_and_literal() {
    let template = ReporterTemplate::new("[[CURRENCY:ip:USD]]");
    assert!(template.check_completeness("test-event", &sample_event_type(), no_types).is_ok());
  }

  #[test]
  fn balanced_braces_are_accepted() {
    let template = ReporterTemplate::new("Connection from [[ip]] {nested text}");
    assert!(template.check_completeness("test-event", &sample_event_type(), no_types).is_ok());
  }

  #[test]
  fn negative_brace_depth_rejected() {
    let template = ReporterTemplate::new("stray } before [[ip]]");
    assert!(template.check_completeness("test-event", &sample_event_type(), no_types).is_err());
  }

  #[test]
  fn unclosed_brace_rejected() {
    let template = ReporterTemplate::new("{unterminated [[ip]]");
    assert!(template.check_completeness("test-event", &sample_event_type(), no_types).is_err());
  }

  #[test]
  fn unreferenced_properties_are_reported() {
    let template = ReporterTemplate::new("Connection from [[ip]]");
    let unreferenced = template.unreferenced_properties(&sample_event_type());
    assert_eq!(unreferenced, vec!["active", "seen"]);
  }
}
