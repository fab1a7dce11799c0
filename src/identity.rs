//! Identity resolution: maps a Bitbucket profile into the internal identity record handed to
//! the hosting layer's session logic.

// self
use crate::{_prelude::*, profile::{ProviderEmail, ProviderUser}};

/// Stable key identifying this identity source towards the hosting layer.
pub const PROVIDER_KEY: &str = "bitbucket";

/// Error returned when a login strategy label cannot be interpreted.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown login strategy: {value}.")]
pub struct LoginStrategyParseError {
	/// The unrecognized label.
	pub value: String,
}

/// Strategy used to derive the internal login from the Bitbucket username.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStrategy {
	/// Suffixes the username with `@bitbucket` so it never collides with a same-named local
	/// account or a login issued by another identity source.
	#[default]
	Unique,
	/// Uses the Bitbucket username verbatim.
	SameAsProvider,
}
impl LoginStrategy {
	/// Returns a stable label suitable for configuration files and logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			LoginStrategy::Unique => "unique",
			LoginStrategy::SameAsProvider => "same_as_provider",
		}
	}
}
impl Display for LoginStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for LoginStrategy {
	type Err = LoginStrategyParseError;

	// Accepts both the snake_case labels and the human-facing option labels used by admin
	// consoles ("Unique", "Same as Bitbucket login").
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"unique" | "Unique" => Ok(Self::Unique),
			"same_as_provider" | "Same as Bitbucket login" => Ok(Self::SameAsProvider),
			other => Err(LoginStrategyParseError { value: other.to_owned() }),
		}
	}
}

/// Internal identity record produced by one successful authentication attempt.
///
/// The record is request-scoped: the core never persists it, the hosting layer consumes it to
/// establish a session or provision a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
	/// Internal login; never empty, deterministic for a given username and strategy.
	pub login: String,
	/// Human-facing name copied from the Bitbucket profile.
	pub display_name: String,
	/// Preferred email address, absent when Bitbucket exposed none.
	pub email: Option<String>,
	/// Identity source key (always [`PROVIDER_KEY`]).
	pub provider_key: &'static str,
	/// Whether the hosting layer may provision a new account for this identity.
	pub allow_sign_up: bool,
}
impl UserIdentity {
	/// Resolves the internal identity for an authenticated Bitbucket user.
	///
	/// Total function: the username is guaranteed non-empty by the profile client, and a
	/// missing or unqualified email set simply leaves `email` absent.
	pub fn resolve(
		user: &ProviderUser,
		email: Option<&ProviderEmail>,
		strategy: LoginStrategy,
		allow_sign_up: bool,
	) -> Self {
		let login = match strategy {
			LoginStrategy::Unique => format!("{}@{PROVIDER_KEY}", user.username),
			LoginStrategy::SameAsProvider => user.username.clone(),
		};

		Self {
			login,
			display_name: user.display_name.clone(),
			email: email.map(|e| e.email.clone()),
			provider_key: PROVIDER_KEY,
			allow_sign_up,
		}
	}
}
