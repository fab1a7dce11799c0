//! Configuration surface consumed by the flow, and the per-attempt snapshot taken from it.
//!
//! The hosting layer owns configuration storage and its UI; this module only reads. A
//! [`FlowConfig`] snapshot is captured once at the start of every attempt so a concurrent
//! configuration mutation can never leave a single attempt observing two different states.

// self
use crate::{_prelude::*, error::ConfigError, identity::LoginStrategy, policy::TeamRestriction};

/// Default Bitbucket Cloud REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.bitbucket.org/";
/// Default Bitbucket Cloud web URL the OAuth endpoints live under.
pub const DEFAULT_WEB_URL: &str = "https://bitbucket.org/";
/// Fixed scope requested during authorization; grants read access to the account profile.
pub const REQUIRED_SCOPE: &str = "account";

pub(crate) const AUTHORIZE_PATH: &str = "site/oauth2/authorize";
pub(crate) const TOKEN_PATH: &str = "site/oauth2/access_token";

/// Read-only configuration collaborator.
///
/// Implementations are read concurrently by many attempts and must never block on the flow;
/// persisted storage and admin-console metadata belong to the hosting layer.
pub trait SettingsSource
where
	Self: Send + Sync,
{
	/// Enablement flag; ignored when either credential is missing.
	fn enabled(&self) -> bool;
	/// OAuth consumer key issued by Bitbucket.
	fn client_id(&self) -> Option<String>;
	/// OAuth consumer secret issued by Bitbucket.
	fn client_secret(&self) -> Option<String>;
	/// REST API base URL override; defaults to [`DEFAULT_API_URL`].
	fn api_url(&self) -> Option<String>;
	/// Web URL override the OAuth endpoints are derived from; defaults to
	/// [`DEFAULT_WEB_URL`].
	fn web_url(&self) -> Option<String>;
	/// Strategy used to derive internal logins.
	fn login_strategy(&self) -> LoginStrategy;
	/// Team identifiers allowed to authenticate; empty disables the restriction.
	fn team_restriction(&self) -> Vec<String>;
	/// Whether unknown users may be provisioned by the hosting layer.
	fn allow_users_to_sign_up(&self) -> bool;
}

/// In-memory [`SettingsSource`] for hosts that load configuration from files, and for tests.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticSettings {
	/// Enablement flag.
	pub enabled: bool,
	/// OAuth consumer key.
	pub client_id: Option<String>,
	/// OAuth consumer secret.
	pub client_secret: Option<String>,
	/// REST API base URL override.
	pub api_url: Option<String>,
	/// Web URL override.
	pub web_url: Option<String>,
	/// Login derivation strategy.
	pub login_strategy: LoginStrategy,
	/// Allowed team identifiers.
	pub team_restriction: Vec<String>,
	/// Sign-up policy flag.
	pub allow_users_to_sign_up: bool,
}
impl StaticSettings {
	/// Overrides the enablement flag.
	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;

		self
	}

	/// Sets the OAuth consumer key.
	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the OAuth consumer secret.
	pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Overrides the REST API base URL.
	pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
		self.api_url = Some(api_url.into());

		self
	}

	/// Overrides the web URL the OAuth endpoints are derived from.
	pub fn with_web_url(mut self, web_url: impl Into<String>) -> Self {
		self.web_url = Some(web_url.into());

		self
	}

	/// Overrides the login strategy.
	pub fn with_login_strategy(mut self, strategy: LoginStrategy) -> Self {
		self.login_strategy = strategy;

		self
	}

	/// Replaces the team restriction list.
	pub fn with_team_restriction<I, S>(mut self, teams: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.team_restriction = teams.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the sign-up policy flag.
	pub fn with_allow_users_to_sign_up(mut self, allow: bool) -> Self {
		self.allow_users_to_sign_up = allow;

		self
	}
}
impl Default for StaticSettings {
	fn default() -> Self {
		Self {
			enabled: false,
			client_id: None,
			client_secret: None,
			api_url: None,
			web_url: None,
			login_strategy: LoginStrategy::default(),
			team_restriction: Vec::new(),
			allow_users_to_sign_up: true,
		}
	}
}
impl SettingsSource for StaticSettings {
	fn enabled(&self) -> bool {
		self.enabled
	}

	fn client_id(&self) -> Option<String> {
		self.client_id.clone()
	}

	fn client_secret(&self) -> Option<String> {
		self.client_secret.clone()
	}

	fn api_url(&self) -> Option<String> {
		self.api_url.clone()
	}

	fn web_url(&self) -> Option<String> {
		self.web_url.clone()
	}

	fn login_strategy(&self) -> LoginStrategy {
		self.login_strategy
	}

	fn team_restriction(&self) -> Vec<String> {
		self.team_restriction.clone()
	}

	fn allow_users_to_sign_up(&self) -> bool {
		self.allow_users_to_sign_up
	}
}

/// Immutable snapshot of configuration read at the start of one authentication attempt.
#[derive(Clone, Debug)]
pub struct FlowConfig {
	/// OAuth consumer key.
	pub client_id: String,
	/// OAuth consumer secret.
	pub client_secret: String,
	/// REST API base URL, trailing slash guaranteed.
	pub api_url: Url,
	/// Authorization endpoint derived from the web URL.
	pub authorize_endpoint: Url,
	/// Token endpoint derived from the web URL.
	pub token_endpoint: Url,
	/// Callback URL supplied per-request by the hosting layer.
	pub callback_url: Url,
	/// Login derivation strategy.
	pub login_strategy: LoginStrategy,
	/// Normalized team restriction; empty disables the gate.
	pub restriction: TeamRestriction,
	/// Sign-up policy flag forwarded into the resolved identity.
	pub allow_sign_up: bool,
}
impl FlowConfig {
	/// Captures a per-attempt snapshot from the settings source.
	///
	/// Fails with [`Error::Disabled`] when the enablement flag is off or either credential is
	/// missing, before any network I/O can happen.
	pub fn snapshot(source: &dyn SettingsSource, callback_url: Url) -> Result<Self> {
		if !source.enabled() {
			return Err(Error::Disabled);
		}

		let (Some(client_id), Some(client_secret)) = (
			source.client_id().filter(|id| !id.is_empty()),
			source.client_secret().filter(|secret| !secret.is_empty()),
		) else {
			return Err(Error::Disabled);
		};
		let api_url = parse_base_url("API", source.api_url(), DEFAULT_API_URL)?;
		let web_url = parse_base_url("web", source.web_url(), DEFAULT_WEB_URL)?;
		let authorize_endpoint = web_url
			.join(AUTHORIZE_PATH)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "authorization", source })?;
		let token_endpoint = web_url
			.join(TOKEN_PATH)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "token", source })?;

		Ok(Self {
			client_id,
			client_secret,
			api_url,
			authorize_endpoint,
			token_endpoint,
			callback_url,
			login_strategy: source.login_strategy(),
			restriction: TeamRestriction::new(source.team_restriction()),
			allow_sign_up: source.allow_users_to_sign_up(),
		})
	}
}

// `Url::join` treats the last path segment of a slash-less base as a file name, so both
// configured bases are normalized to a trailing slash first.
fn parse_base_url(
	name: &'static str,
	configured: Option<String>,
	default: &str,
) -> Result<Url, ConfigError> {
	let mut raw = configured.filter(|url| !url.is_empty()).unwrap_or_else(|| default.to_owned());

	if !raw.ends_with('/') {
		raw.push('/');
	}

	Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { name, value: raw.clone(), source })
}
