//! CSS-like compound selectors, as used by model binding rules.
//!
//! Supported: `*`, `tag`, `#id`, `.class`, `[attr]`, `[attr=value]` (optionally quoted), combined into compounds and comma lists.
//! Combinators are not.

use core::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported selector {selector:?} at byte {position}")]
pub struct SelectorError {
	pub selector: String,
	pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
	tag: Option<String>,
	id: Option<String>,
	classes: Vec<String>,
	attributes: Vec<(String, Option<String>)>,
}

impl Compound {
	fn matches(&self, tag: &str, attributes: &[(String, String)]) -> bool {
		let attribute = |name: &str| attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str());
		self.tag.as_deref().map_or(true, |expected| expected == tag)
			&& self.id.as_deref().map_or(true, |expected| attribute("id") == Some(expected))
			&& self.classes.iter().all(|class| attribute("class").map_or(false, |classes| classes.split_ascii_whitespace().any(|c| c == class)))
			&& self.attributes.iter().all(|(name, expected)| match (attribute(name), expected) {
				(None, _) => false,
				(Some(_), None) => true,
				(Some(actual), Some(expected)) => actual == expected,
			})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
	source: String,
	alternatives: Vec<Compound>,
}

impl Selector {
	/// # Errors
	///
	/// Iff `source` uses syntax outside the supported subset.
	pub fn parse(source: &str) -> Result<Self, SelectorError> {
		let error = |position| SelectorError {
			selector: source.to_owned(),
			position,
		};

		let mut alternatives = Vec::new();
		let mut offset = 0;
		for part in source.split(',') {
			let trimmed = part.trim();
			let start = offset + (part.len() - part.trim_start().len());
			offset += part.len() + 1;
			if trimmed.is_empty() {
				return Err(error(start));
			}

			let mut compound = Compound::default();
			let bytes = trimmed.as_bytes();
			let mut i = 0;
			let ident_end = |from: usize| from + trimmed[from..].find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_')).unwrap_or(trimmed.len() - from);
			while i < bytes.len() {
				match bytes[i] {
					b'*' if i == 0 => i += 1,
					b'#' | b'.' => {
						let end = ident_end(i + 1);
						if end == i + 1 {
							return Err(error(start + i));
						}
						let ident = trimmed[i + 1..end].to_owned();
						if bytes[i] == b'#' {
							compound.id = Some(ident);
						} else {
							compound.classes.push(ident);
						}
						i = end;
					}
					b'[' => {
						let close = trimmed[i..].find(']').map(|close| i + close).ok_or_else(|| error(start + i))?;
						let inner = &trimmed[i + 1..close];
						let (name, value) = match inner.split_once('=') {
							Some((name, value)) => (name.trim(), Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_owned())),
							None => (inner.trim(), None),
						};
						if name.is_empty() {
							return Err(error(start + i));
						}
						compound.attributes.push((name.to_owned(), value));
						i = close + 1;
					}
					c if i == 0 && c.is_ascii_alphabetic() => {
						let end = ident_end(0);
						compound.tag = Some(trimmed[..end].to_ascii_lowercase());
						i = end;
					}
					_ => return Err(error(start + i)),
				}
			}
			alternatives.push(compound);
		}

		Ok(Self {
			source: source.to_owned(),
			alternatives,
		})
	}

	#[must_use]
	pub fn matches(&self, tag: &str, attributes: &[(String, String)]) -> bool {
		self.alternatives.iter().any(|compound| compound.matches(tag, attributes))
	}
}

impl Display for Selector {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&self.source)
	}
}
