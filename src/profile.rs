//! Bitbucket REST client for the three profile endpoints, plus the wire records they produce.
//!
//! Each operation issues exactly one bearer-signed GET and either parses the JSON body or
//! reports the HTTP status and raw body via [`FetchError`]. Whether a failure is mandatory or
//! soft is the flow controller's call, not this module's. Provider field names
//! (`display_name`, `is_primary`, ...) stay behind this parsing boundary; the rest of the
//! crate only sees the semantic record shapes.

// crates.io
use reqwest::header::AUTHORIZATION;
// self
use crate::{_prelude::*, http::ReqwestHttpClient, oauth::AccessToken};

pub(crate) const USER_PATH: &str = "2.0/user";
pub(crate) const EMAILS_PATH: &str = "2.0/user/emails";
pub(crate) const TEAMS_PATH: &str = "2.0/teams?role=member&pagelen=100";

/// Failure reported by a single profile endpoint call.
///
/// The caller classifies: a [`FetchError::Status`] on the user endpoint aborts the attempt,
/// while the same failure on the emails or teams endpoint degrades the result instead.
#[derive(Debug, ThisError)]
pub enum FetchError {
	/// The transport failed before an HTTP status was available (DNS, TCP, TLS, timeout).
	#[error("Bitbucket API call failed in transport.")]
	Transport {
		/// Underlying reqwest failure.
		#[source]
		source: ReqwestError,
	},
	/// Bitbucket answered with a non-2xx status.
	#[error("Bitbucket API returned HTTP {status}: {body}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Raw response body, kept verbatim for diagnostics.
		body: String,
	},
	/// Bitbucket answered 2xx with a body that could not be parsed.
	#[error("Bitbucket API returned a malformed payload.")]
	Parse {
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The profile payload parsed but carries no username.
	#[error("Bitbucket profile is missing a username.")]
	MissingUsername,
}

/// Authenticated user's profile as returned by `2.0/user`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProviderUser {
	/// Bitbucket username; the only value usable as a stable foreign key into the provider.
	pub username: String,
	/// Human-facing display name; may be empty.
	#[serde(default)]
	pub display_name: String,
}

/// One email address entry from `2.0/user/emails`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProviderEmail {
	/// The address itself.
	pub email: String,
	/// Whether Bitbucket marks this address as the primary one.
	#[serde(default)]
	pub is_primary: bool,
	/// Whether the address has been confirmed by the user.
	#[serde(default)]
	pub is_active: bool,
}

/// Provider-ordered email list; distinct from "fetch failed", which the flow models as absence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct EmailSet {
	/// Entries in provider-returned order.
	#[serde(default)]
	pub values: Vec<ProviderEmail>,
}
impl EmailSet {
	/// First entry that is both primary and active, keeping the selection reproducible when
	/// several qualify.
	pub fn preferred(&self) -> Option<&ProviderEmail> {
		self.values.iter().find(|email| email.is_primary && email.is_active)
	}
}

/// One team membership entry from `2.0/teams`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProviderTeam {
	/// Team identifier, matched against the configured restriction.
	pub username: String,
	/// Human-facing team name; may be empty.
	#[serde(default)]
	pub display_name: String,
}

/// Team memberships of the authenticated user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TeamSet {
	/// Entries in provider-returned order.
	#[serde(default)]
	pub values: Vec<ProviderTeam>,
}
impl TeamSet {
	/// Iterator over the membership identifiers.
	pub fn identifiers(&self) -> impl Iterator<Item = &str> {
		self.values.iter().map(|team| team.username.as_str())
	}
}

/// Client for the Bitbucket REST API paths consumed during one authentication attempt.
#[derive(Clone)]
pub struct ProfileClient {
	http_client: ReqwestHttpClient,
	api_url: Url,
}
impl ProfileClient {
	/// Creates a client rooted at the configured API base URL (trailing slash guaranteed by
	/// the configuration snapshot).
	pub fn new(http_client: ReqwestHttpClient, api_url: Url) -> Self {
		Self { http_client, api_url }
	}

	/// Fetches the authenticated user's profile and validates that it names a user.
	pub async fn fetch_user(&self, token: &AccessToken) -> Result<ProviderUser, FetchError> {
		let user: ProviderUser = self.get(USER_PATH, token).await?;

		if user.username.is_empty() {
			return Err(FetchError::MissingUsername);
		}

		Ok(user)
	}

	/// Fetches the authenticated user's email addresses.
	pub async fn fetch_emails(&self, token: &AccessToken) -> Result<EmailSet, FetchError> {
		self.get(EMAILS_PATH, token).await
	}

	/// Fetches the teams the authenticated user is a member of.
	pub async fn fetch_teams(&self, token: &AccessToken) -> Result<TeamSet, FetchError> {
		self.get(TEAMS_PATH, token).await
	}

	async fn get<T>(&self, path: &str, token: &AccessToken) -> Result<T, FetchError>
	where
		T: for<'de> Deserialize<'de>,
	{
		let url = format!("{}{path}", self.api_url);

		crate::obs::api_call(&url);

		let response = self
			.http_client
			.get(&url)
			.header(AUTHORIZATION, format!("Bearer {}", token.expose()))
			.send()
			.await
			.map_err(|source| FetchError::Transport { source })?;
		let status = response.status();
		let body = response.text().await.map_err(|source| FetchError::Transport { source })?;

		if !status.is_success() {
			return Err(FetchError::Status { status: status.as_u16(), body });
		}

		parse_payload(&body)
	}
}
impl Debug for ProfileClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProfileClient").field("api_url", &self.api_url.as_str()).finish()
	}
}

fn parse_payload<T>(body: &str) -> Result<T, FetchError>
where
	T: for<'de> Deserialize<'de>,
{
	let mut deserializer = serde_json::Deserializer::from_str(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| FetchError::Parse { source })
}
