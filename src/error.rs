//! Error taxonomy shared across the flow controller, profile client, and configuration layer.
//!
//! Mandatory failures ([`Error::TokenExchange`], [`Error::ProfileFetch`]) abort an
//! authentication attempt; soft outcomes (absent emails, absent teams) are not errors and never
//! appear here. Remote-call failures keep the HTTP status and raw body for operator-facing
//! logs, while bearer secrets stay out of every message.

// self
use crate::{_prelude::*, profile::FetchError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Bitbucket authentication is switched off or the OAuth consumer credentials are missing.
	#[error("Bitbucket authentication is disabled.")]
	Disabled,
	/// The authorization callback was malformed.
	#[error("Authorization callback is malformed: {reason}.")]
	Protocol {
		/// What the callback was missing or carrying in an unusable form.
		reason: String,
	},
	/// The token endpoint rejected the authorization-code exchange, answered with an unusable
	/// payload, or was unreachable.
	#[error("Token exchange failed: {reason}.")]
	TokenExchange {
		/// Reason string summarizing the rejection or failure.
		reason: String,
		/// HTTP status code returned by the token endpoint, when a response arrived.
		status: Option<u16>,
		/// Underlying transport or parse failure, when one caused the exchange to fail.
		#[source]
		source: Option<BoxError>,
	},
	/// The mandatory profile call failed; status and body are kept verbatim for diagnostics.
	#[error("Can not get Bitbucket user profile. HTTP code: {status}, response: {body}")]
	ProfileFetch {
		/// HTTP status code returned by the profile endpoint.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// The profile endpoint answered 2xx but the payload failed parsing or validation.
	#[error("Bitbucket returned an invalid user profile payload.")]
	InvalidProfile {
		/// Underlying parse or validation failure.
		#[source]
		source: FetchError,
	},
	/// The authenticated user is not a member of any restricted team.
	#[error("User {username} is not part of restricted teams.")]
	AccessDenied {
		/// Bitbucket username of the authenticated (but denied) user.
		username: String,
	},
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Configuration and validation failures raised before any network I/O.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured base URL cannot be parsed.
	#[error("Configured {name} URL is invalid: {value}.")]
	InvalidUrl {
		/// Which setting failed validation.
		name: &'static str,
		/// The offending URL string.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// An OAuth endpoint derived from the configured web URL is unusable.
	#[error("Cannot derive the {endpoint} endpoint from the configured web URL.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Callback URL supplied by the hosting layer cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling Bitbucket.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling Bitbucket.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
