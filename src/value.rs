//! Dynamic values stored in models, instance properties and passed through method dispatch.

use crate::error::ModelError;
use chrono::{DateTime, SecondsFormat, Utc};
use core::fmt::{self, Display, Formatter};
use std::collections::BTreeMap;

/// A loosely typed value, close to what a JSON document can carry, plus dates.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	Number(f64),
	String(String),
	Date(DateTime<Utc>),
	Array(Vec<Value>),
	Object(BTreeMap<String, Value>),
}

impl Value {
	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_f64(&self) -> Option<f64> {
		match *self {
			Value::Number(n) => Some(n),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_bool(&self) -> Option<bool> {
		match *self {
			Value::Bool(b) => Some(b),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
		match self {
			Value::Object(map) => Some(map),
			_ => None,
		}
	}

	/// JavaScript-ish truthiness, used for boolean attributes.
	#[must_use]
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Null => false,
			Value::Bool(b) => *b,
			Value::Number(n) => *n != 0.0 && !n.is_nan(),
			Value::String(s) => !s.is_empty(),
			Value::Date(_) | Value::Array(_) | Value::Object(_) => true,
		}
	}

	#[must_use]
	pub fn to_json(&self) -> serde_json::Value {
		match self {
			Value::Null => serde_json::Value::Null,
			Value::Bool(b) => serde_json::Value::Bool(*b),
			Value::Number(n) => serde_json::Number::from_f64(*n).map_or(serde_json::Value::Null, serde_json::Value::Number),
			Value::String(s) => serde_json::Value::String(s.clone()),
			Value::Date(date) => serde_json::Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
			Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
			Value::Object(map) => serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
		}
	}

	/// Converts parsed JSON, turning every RFC 3339 timestamp string back into a [`Value::Date`].
	#[must_use]
	pub fn from_json_reviving(json: serde_json::Value) -> Self {
		match json {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(b),
			serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
			serde_json::Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
				Ok(date) => Value::Date(date.with_timezone(&Utc)),
				Err(_) => Value::String(s),
			},
			serde_json::Value::Array(items) => Value::Array(items.into_iter().map(Value::from_json_reviving).collect()),
			serde_json::Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, Value::from_json_reviving(v))).collect()),
		}
	}

	/// Encodes `fields` as a JSON object.
	#[must_use]
	pub fn encode_fields(fields: &BTreeMap<String, Value>) -> String {
		serde_json::Value::Object(fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()).to_string()
	}

	/// Decodes a JSON object into fields, reviving dates.
	///
	/// # Errors
	///
	/// Iff `text` is not valid JSON or not an object.
	pub fn decode_fields(text: &str) -> Result<BTreeMap<String, Value>, ModelError> {
		match serde_json::from_str::<serde_json::Value>(text)? {
			serde_json::Value::Object(map) => Ok(map.into_iter().map(|(k, v)| (k, Value::from_json_reviving(v))).collect()),
			_ => Err(ModelError::NotAnObject),
		}
	}
}

impl Display for Value {
	/// Formats the value the way it is written into an attribute.
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => Ok(()),
			Value::Bool(b) => write!(f, "{}", b),
			Value::Number(n) => write!(f, "{}", n),
			Value::String(s) => f.write_str(s),
			Value::Date(date) => f.write_str(&date.to_rfc3339_opts(SecondsFormat::Millis, true)),
			Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
		}
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl From<f64> for Value {
	fn from(n: f64) -> Self {
		Value::Number(n)
	}
}

impl From<i32> for Value {
	fn from(n: i32) -> Self {
		Value::Number(n.into())
	}
}

impl From<u32> for Value {
	fn from(n: u32) -> Self {
		Value::Number(n.into())
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.to_owned())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::String(s)
	}
}

impl From<DateTime<Utc>> for Value {
	fn from(date: DateTime<Utc>) -> Self {
		Value::Date(date)
	}
}

/// The declared type of an attribute, from an `attrs` member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
	String,
	Number,
	Boolean,
	Date,
}

impl AttrType {
	#[must_use]
	pub fn parse(name: &str) -> Option<Self> {
		Some(match name {
			"string" => AttrType::String,
			"number" => AttrType::Number,
			"boolean" => AttrType::Boolean,
			"date" => AttrType::Date,
			_ => return None,
		})
	}

	/// Converts a raw attribute into a model value.
	///
	/// `None` means the attribute carries no usable value for this type and the field should be cleared.
	#[must_use]
	pub fn read(self, raw: Option<&str>) -> Option<Value> {
		match self {
			AttrType::Boolean => Some(Value::Bool(raw.map_or(false, |raw| raw != "false"))),
			AttrType::String => raw.map(Value::from),
			AttrType::Number => raw.and_then(|raw| raw.trim().parse::<f64>().ok()).map(Value::Number),
			AttrType::Date => raw.and_then(|raw| DateTime::parse_from_rfc3339(raw).ok()).map(|date| Value::Date(date.with_timezone(&Utc))),
		}
	}

	/// Converts a model value into a raw attribute. `None` removes the attribute.
	#[must_use]
	pub fn write(self, value: Option<&Value>) -> Option<String> {
		match (self, value) {
			(_, None | Some(Value::Null)) => None,
			(AttrType::Boolean, Some(value)) => value.is_truthy().then(|| "true".to_owned()),
			(_, Some(value)) => Some(value.to_string()),
		}
	}
}
