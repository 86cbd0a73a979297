/// Runtime-wide settings, fixed when the [`Runtime`](`crate::Runtime`) is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	/// Embed each instance's model into a marker comment after every sync, so a client can pick it up again.
	pub server_rendering: bool,
	/// Resolve members by walking the class chain on each lookup.
	///
	/// When `false`, every instance instead keeps a flattened copy of its class's member view, which is rebuilt from scratch
	/// whenever a class in its chain is mutated. Both strategies must behave identically; this switch exists to test the latter.
	pub prototype_delegation: bool,
	pub model_marker_prefix: String,
	/// How often [`Runtime::tick`](`crate::Runtime::tick`) may go around before it gives up on settling.
	pub max_settle_rounds: usize,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			server_rendering: false,
			prototype_delegation: true,
			model_marker_prefix: "itag-model:".to_owned(),
			max_settle_rounds: 64,
		}
	}
}

impl Config {
	#[must_use]
	pub fn server_rendering(mut self, server_rendering: bool) -> Self {
		self.server_rendering = server_rendering;
		self
	}

	#[doc(hidden)]
	#[must_use]
	pub fn prototype_delegation(mut self, prototype_delegation: bool) -> Self {
		self.prototype_delegation = prototype_delegation;
		self
	}

	#[must_use]
	pub fn model_marker_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.model_marker_prefix = prefix.into();
		self
	}

	#[must_use]
	pub fn max_settle_rounds(mut self, rounds: usize) -> Self {
		self.max_settle_rounds = rounds;
		self
	}
}
