use std::{
  num::{ParseFloatError, ParseIntError},
  str::ParseBoolError,
};

use quick_error::quick_error;

quick_error! {
  #[derive(Debug)]
  pub enum EdxmlError {
    /// A data-type descriptor is syntactically malformed (spec §4.1).
    InvalidDataType(descriptor: String, reason: String) {
      display("Invalid data type descriptor '{}': {}", descriptor, reason)
    }
    /// A value violates its declared data type (spec §4.1).
    InvalidObjectValue(value: String, datatype: String, reason: String) {
      display("Invalid value '{}' for data type '{}': {}", value, datatype, reason)
    }
    /// An entity attribute exceeds its length or fails its pattern (spec §4.2).
    AttributeViolation(path: String, reason: String) {
      display("Attribute violation at {}: {}", path, reason)
    }
    /// An attribute name is not in the entity's grammar table (spec §4.2).
    UnknownAttribute(path: String) {
      display("Unknown attribute at {}", path)
    }
    /// A mandatory attribute is missing on registration (spec §4.2).
    MissingMandatoryAttribute(path: String) {
      display("Missing mandatory attribute at {}", path)
    }
    /// Re-registration conflicts with a prior definition, an unresolved
    /// reference, an invalid parent map, a relation without valid
    /// placeholders, etc (spec §4.2, invariants 1-6).
    SchemaInconsistency(path: String, reason: String) {
      display("Schema inconsistency at {}: {}", path, reason)
    }
    /// A reporter string is malformed, refers to an unknown property, or
    /// misuses a formatter (spec §4.5).
    ReporterError(path: String, reason: String) {
      display("Reporter string error at {}: {}", path, reason)
    }
    /// An operation is not valid for the given entity, e.g. `merge_events`
    /// on a non-unique event type (spec §4.4).
    UnsupportedOperation(reason: String) {
      display("Unsupported operation: {}", reason)
    }
    /// Cooperative-cancellation signal observed at a chunk boundary (spec §5).
    ProcessingInterrupted {
      display("Processing was interrupted by the caller's stop signal")
    }
    ParseBool(err: ParseBoolError) {
      display("Error parsing a boolean: {}", err)
    }
    ParseInt(err: ParseIntError) {
      display("Error parsing an integer: {}", err)
    }
    ParseFloat(err: ParseFloatError) {
      display("Error parsing a float: {}", err)
    }
    Read(err: quick_xml::Error) {
      display("Error while reading: {}", err)
    }
    Write(err: quick_xml::Error) {
      display("Error while writing: {}", err)
    }
    Attr(err: quick_xml::events::attributes::AttrError) {
      display("Attributes error: {}", err)
    }
    PrematureEOF(tag: &'static str) {
      display("Premature end of file encountered in tag {}", tag)
    }
    Io(err: std::io::Error) {
      display("I/O error: {}", err)
    }
    Utf8(err: std::str::Utf8Error) {
      display("UTF-8 error, valid up to {}", err.valid_up_to())
    }
    FromUtf8(err: std::string::FromUtf8Error) {
      display("UTF-8 error: {}", err)
    }
    TomlDe(err: toml::de::Error) {
      display("TOML error: {}", err)
    }
    Custom(err: std::string::String) {
      display("Custom error: {}", err)
    }
  }
}

impl serde::de::Error for EdxmlError {
  fn custom<T: std::fmt::Display>(desc: T) -> Self {
    EdxmlError::Custom(desc.to_string())
  }
}

impl serde::ser::Error for EdxmlError {
  fn custom<T: std::fmt::Display>(desc: T) -> Self {
    EdxmlError::Custom(desc.to_string())
  }
}
