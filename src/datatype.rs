//! C1: the type system. Data-type descriptors are colon-separated tokens
//! (spec §4.1); `DataType::from_str` parses and validates the descriptor
//! shape (returning `EdxmlError::InvalidDataType` on malformed input),
//! `DataType::normalize` validates and canonicalizes a value against an
//! already-parsed descriptor (returning `EdxmlError::InvalidObjectValue`),
//! and `Display` reproduces the canonical descriptor text for schema
//! re-emission (spec §6 "byte-identical schema section").

use std::{fmt, str::FromStr};

use crate::EdxmlError;

#[derive(PartialEq, Eq, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum NumberType {
  TinyInt { signed: bool },
  SmallInt { signed: bool },
  MediumInt { signed: bool },
  Int { signed: bool },
  BigInt { signed: bool },
  Float { signed: bool },
  Double { signed: bool },
  Decimal { total: u32, fraction: u32, signed: bool },
  Hex { len: u32, group: u32, sep: Option<char> },
}

impl NumberType {
  /// Whether this numeric sub-type is excluded from hashing (spec §4.3
  /// step 1: "the property's object-type data type is `number:float` or
  /// `number:double`").
  pub fn excluded_from_hashing(&self) -> bool {
    matches!(self, NumberType::Float { .. } | NumberType::Double { .. })
  }

  fn int_range(&self) -> Option<(i128, i128)> {
    let (bits, signed) = match self {
      NumberType::TinyInt { signed } => (8, *signed),
      NumberType::SmallInt { signed } => (16, *signed),
      NumberType::MediumInt { signed } => (24, *signed),
      NumberType::Int { signed } => (32, *signed),
      NumberType::BigInt { signed } => (64, *signed),
      _ => return None,
    };
    Some(if signed {
      (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
      (0, (1i128 << bits) - 1)
    })
  }
}

#[derive(PartialEq, Eq, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum DataType {
  Boolean,
  Timestamp,
  Ip,
  HashLink,
  GeoPoint,
  Enum(Vec<String>),
  Number(NumberType),
  Str { max_len: u32, case_sensitive: bool, allow_unicode: bool },
  BinString { max_len: u32, raw: bool },
}

impl DataType {
  /// Whether this data type is excluded from hashing (spec §4.3 step 1).
  pub fn excluded_from_hashing(&self) -> bool {
    matches!(self, DataType::Number(n) if n.excluded_from_hashing())
  }

  /// Validate `value` against this data type and return its canonical
  /// normalized form. Normalization is total for valid inputs (spec §4.1)
  /// and is the form used by the hash engine (§4.3) and the merge engine
  /// (§4.4).
  pub fn normalize(&self, value: &str) -> Result<String, EdxmlError> {
    let invalid = |reason: String| EdxmlError::InvalidObjectValue(value.to_string(), self.to_string(), reason);
    match self {
      DataType::Boolean => match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok("true".to_string()),
        "false" => Ok("false".to_string()),
        _ => Err(invalid("expected 'true' or 'false'".to_string())),
      },
      DataType::Timestamp => {
        let v: f64 = value.trim().parse().map_err(|_| invalid("not a decimal number of seconds".to_string()))?;
        Ok(format!("{:.6}", v))
      }
      DataType::Ip => {
        let parts: Vec<&str> = value.trim().split('.').collect();
        if parts.len() != 4 {
          return Err(invalid("expected 4 dotted decimal octets".to_string()));
        }
        let mut octets = [0u16; 4];
        for (i, part) in parts.iter().enumerate() {
          if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(format!("octet '{}' is not decimal", part)));
          }
          let n: u16 = part.parse().map_err(|_| invalid(format!("octet '{}' is not numeric", part)))?;
          if n > 255 {
            return Err(invalid(format!("octet '{}' out of range 0-255", part)));
          }
          octets[i] = n;
        }
        Ok(format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3]))
      }
      DataType::HashLink => {
        let v = value.trim();
        if v.len() != 40 || !v.bytes().all(|b| b.is_ascii_hexdigit()) {
          return Err(invalid("expected exactly 40 hex characters".to_string()));
        }
        Ok(v.to_ascii_lowercase())
      }
      DataType::GeoPoint => Ok(value.to_string()),
      DataType::Enum(variants) => {
        if variants.iter().any(|v| v == value) {
          Ok(value.to_string())
        } else {
          Err(invalid(format!("expected one of {:?}", variants)))
        }
      }
      DataType::Number(NumberType::Decimal { total, fraction, signed }) => {
        normalize_decimal(value, *total, *fraction, *signed).map_err(invalid)
      }
      DataType::Number(NumberType::Hex { len, group, sep }) => {
        normalize_hex(value, *len, *group, *sep).map_err(invalid)
      }
      DataType::Number(n @ (NumberType::Float { .. } | NumberType::Double { .. })) => {
        let signed = matches!(n, NumberType::Float { signed: true } | NumberType::Double { signed: true });
        let v: f64 = value.trim().parse().map_err(|_| invalid("not a floating point number".to_string()))?;
        if !signed && v.is_sign_negative() && v != 0.0 {
          return Err(invalid("unsigned type rejects negative value".to_string()));
        }
        Ok(format!("{:.6}", v))
      }
      DataType::Number(n) => {
        let (min, max) = n.int_range().expect("integer sub-type always has a range");
        let v: i128 = value.trim().parse().map_err(|_| invalid("not an integer".to_string()))?;
        if v < min || v > max {
          return Err(invalid(format!("out of range [{}, {}]", min, max)));
        }
        Ok(format!("{}", v))
      }
      DataType::Str { max_len, case_sensitive, allow_unicode } => {
        if !allow_unicode && !value.chars().all(|c| (c as u32) <= 0xFF) {
          return Err(invalid("non-Latin-1 code point not allowed".to_string()));
        }
        let char_count = value.chars().count() as u32;
        if *max_len != 0 && char_count > *max_len {
          return Err(invalid(format!("exceeds maximum length {}", max_len)));
        }
        Ok(if *case_sensitive { value.to_string() } else { value.to_lowercase() })
      }
      DataType::BinString { max_len, .. } => {
        if *max_len != 0 && (value.len() as u32) > *max_len {
          return Err(invalid(format!("exceeds maximum length {}", max_len)));
        }
        Ok(value.to_string())
      }
    }
  }
}

fn normalize_decimal(value: &str, total: u32, fraction: u32, signed: bool) -> Result<String, String> {
  let value = value.trim();
  let (negative, rest) = match value.strip_prefix('-') {
    Some(rest) => (true, rest),
    None => (false, value.strip_prefix('+').unwrap_or(value)),
  };
  if negative && !signed {
    return Err("unsigned type rejects negative value".to_string());
  }
  let (int_part, frac_part) = match rest.split_once('.') {
    Some((i, f)) => (i, f),
    None => (rest, ""),
  };
  if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
    return Err("invalid integer part".to_string());
  }
  if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
    return Err("invalid fractional part".to_string());
  }
  let int_trimmed = int_part.trim_start_matches('0');
  let int_trimmed = if int_trimmed.is_empty() { "0" } else { int_trimmed };
  let frac_fixed = if frac_part.len() as u32 >= fraction {
    frac_part[..fraction as usize].to_string()
  } else {
    format!("{:0<width$}", frac_part, width = fraction as usize)
  };
  let significant_digits = int_trimmed.len() as u32 + fraction;
  if significant_digits > total {
    return Err(format!("exceeds total precision {}", total));
  }
  let sign = if negative && int_trimmed != "0" { "-" } else if negative && frac_fixed.bytes().any(|b| b != b'0') { "-" } else { "" };
  Ok(if fraction == 0 {
    format!("{}{}", sign, int_trimmed)
  } else {
    format!("{}{}.{}", sign, int_trimmed, frac_fixed)
  })
}

fn normalize_hex(value: &str, len: u32, group: u32, sep: Option<char>) -> Result<String, String> {
  let stripped: String = match sep {
    Some(sep) => value.chars().filter(|&c| c != sep).collect(),
    None => value.to_string(),
  };
  if stripped.len() as u32 != len {
    return Err(format!("expected {} hex characters, found {}", len, stripped.len()));
  }
  if len % group != 0 {
    return Err(format!("length {} is not divisible by group size {}", len, group));
  }
  if !stripped.bytes().all(|b| b.is_ascii_hexdigit()) {
    return Err("expected only hex digits".to_string());
  }
  Ok(stripped.to_ascii_lowercase())
}

impl FromStr for DataType {
  type Err = EdxmlError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let malformed = |reason: &str| EdxmlError::InvalidDataType(s.to_string(), reason.to_string());
    let tokens: Vec<&str> = s.split(':').collect();
    match tokens.as_slice() {
      ["boolean"] => Ok(DataType::Boolean),
      ["timestamp"] => Ok(DataType::Timestamp),
      ["ip"] => Ok(DataType::Ip),
      ["hashlink"] => Ok(DataType::HashLink),
      ["geo", "point"] => Ok(DataType::GeoPoint),
      ["enum", rest @ ..] if !rest.is_empty() => {
        Ok(DataType::Enum(rest.iter().map(|v| v.to_string()).collect()))
      }
      ["number", rest @ ..] => parse_number(rest, &malformed),
      ["string", rest @ ..] => parse_string(rest, &malformed),
      ["binstring", rest @ ..] => parse_binstring(rest, &malformed),
      _ => Err(malformed("unrecognized data type descriptor")),
    }
  }
}

fn parse_signed_suffix(rest: &[&str], malformed: &dyn Fn(&str) -> EdxmlError) -> Result<bool, EdxmlError> {
  match rest {
    [] => Ok(false),
    ["signed"] => Ok(true),
    _ => Err(malformed("expected an optional trailing ':signed'")),
  }
}

fn parse_number(rest: &[&str], malformed: &dyn Fn(&str) -> EdxmlError) -> Result<DataType, EdxmlError> {
  match rest {
    ["tinyint", signed @ ..] => Ok(DataType::Number(NumberType::TinyInt { signed: parse_signed_suffix(signed, malformed)? })),
    ["smallint", signed @ ..] => Ok(DataType::Number(NumberType::SmallInt { signed: parse_signed_suffix(signed, malformed)? })),
    ["mediumint", signed @ ..] => Ok(DataType::Number(NumberType::MediumInt { signed: parse_signed_suffix(signed, malformed)? })),
    ["int", signed @ ..] => Ok(DataType::Number(NumberType::Int { signed: parse_signed_suffix(signed, malformed)? })),
    ["bigint", signed @ ..] => Ok(DataType::Number(NumberType::BigInt { signed: parse_signed_suffix(signed, malformed)? })),
    ["float", signed @ ..] => Ok(DataType::Number(NumberType::Float { signed: parse_signed_suffix(signed, malformed)? })),
    ["double", signed @ ..] => Ok(DataType::Number(NumberType::Double { signed: parse_signed_suffix(signed, malformed)? })),
    ["decimal", total, fraction, signed @ ..] => {
      let total: u32 = total.parse().map_err(|_| malformed("decimal TOTAL is not a non-negative integer"))?;
      let fraction: u32 = fraction.parse().map_err(|_| malformed("decimal FRACTION is not a non-negative integer"))?;
      if fraction >= total {
        return Err(malformed("decimal FRACTION must be strictly less than TOTAL"));
      }
      Ok(DataType::Number(NumberType::Decimal { total, fraction, signed: parse_signed_suffix(signed, malformed)? }))
    }
    ["hex", len] => {
      let len: u32 = len.parse().map_err(|_| malformed("hex LEN is not a non-negative integer"))?;
      Ok(DataType::Number(NumberType::Hex { len, group: len.max(1), sep: None }))
    }
    ["hex", len, group, sep] => {
      let len: u32 = len.parse().map_err(|_| malformed("hex LEN is not a non-negative integer"))?;
      let group: u32 = group.parse().map_err(|_| malformed("hex GROUP is not a non-negative integer"))?;
      if group == 0 || len % group != 0 {
        return Err(malformed("hex LEN must be divisible by GROUP"));
      }
      let sep = sep.chars().next().filter(|_| sep.chars().count() == 1);
      if sep.is_none() {
        return Err(malformed("hex SEP must be a single character"));
      }
      Ok(DataType::Number(NumberType::Hex { len, group, sep }))
    }
    _ => Err(malformed("unrecognized 'number' sub-type")),
  }
}

fn parse_string(rest: &[&str], malformed: &dyn Fn(&str) -> EdxmlError) -> Result<DataType, EdxmlError> {
  match rest {
    [len, cs_ci] | [len, cs_ci, "u"] => {
      let max_len: u32 = len.parse().map_err(|_| malformed("string LEN is not a non-negative integer"))?;
      let case_sensitive = match *cs_ci {
        "cs" => true,
        "ci" => false,
        _ => return Err(malformed("expected 'cs' or 'ci'")),
      };
      let allow_unicode = rest.len() == 3;
      Ok(DataType::Str { max_len, case_sensitive, allow_unicode })
    }
    _ => Err(malformed("expected 'string:LEN:{cs|ci}[:u]'")),
  }
}

fn parse_binstring(rest: &[&str], malformed: &dyn Fn(&str) -> EdxmlError) -> Result<DataType, EdxmlError> {
  match rest {
    [len] => {
      let max_len: u32 = len.parse().map_err(|_| malformed("binstring LEN is not a non-negative integer"))?;
      Ok(DataType::BinString { max_len, raw: false })
    }
    [len, "r"] => {
      let max_len: u32 = len.parse().map_err(|_| malformed("binstring LEN is not a non-negative integer"))?;
      Ok(DataType::BinString { max_len, raw: true })
    }
    _ => Err(malformed("expected 'binstring:LEN[:r]'")),
  }
}

impl fmt::Display for DataType {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      DataType::Boolean => write!(f, "boolean"),
      DataType::Timestamp => write!(f, "timestamp"),
      DataType::Ip => write!(f, "ip"),
      DataType::HashLink => write!(f, "hashlink"),
      DataType::GeoPoint => write!(f, "geo:point"),
      DataType::Enum(variants) => write!(f, "enum:{}", variants.join(":")),
      DataType::Number(n) => fmt_number(n, f),
      DataType::Str { max_len, case_sensitive, allow_unicode } => {
        write!(f, "string:{}:{}", max_len, if *case_sensitive { "cs" } else { "ci" })?;
        if *allow_unicode {
          write!(f, ":u")?;
        }
        Ok(())
      }
      DataType::BinString { max_len, raw } => {
        write!(f, "binstring:{}", max_len)?;
        if *raw {
          write!(f, ":r")?;
        }
        Ok(())
      }
    }
  }
}

fn fmt_number(n: &NumberType, f: &mut fmt::Formatter) -> fmt::Result {
  fn suffix(signed: bool) -> &'static str {
    if signed {
      ":signed"
    } else {
      ""
    }
  }
  match n {
    NumberType::TinyInt { signed } => write!(f, "number:tinyint{}", suffix(*signed)),
    NumberType::SmallInt { signed } => write!(f, "number:smallint{}", suffix(*signed)),
    NumberType::MediumInt { signed } => write!(f, "number:mediumint{}", suffix(*signed)),
    NumberType::Int { signed } => write!(f, "number:int{}", suffix(*signed)),
    NumberType::BigInt { signed } => write!(f, "number:bigint{}", suffix(*signed)),
    NumberType::Float { signed } => write!(f, "number:float{}", suffix(*signed)),
    NumberType::Double { signed } => write!(f, "number:double{}", suffix(*signed)),
    NumberType::Decimal { total, fraction, signed } => {
      write!(f, "number:decimal:{}:{}{}", total, fraction, suffix(*signed))
    }
    NumberType::Hex { len, group, sep } => {
      write!(f, "number:hex:{}", len)?;
      if let Some(sep) = sep {
        write!(f, ":{}:{}", group, sep)?;
      }
      Ok(())
    }
  }
}
