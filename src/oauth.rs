//! Facade driving the `oauth2` crate for the authorization-code exchange.

pub use oauth2;

// crates.io
use oauth2::{
	AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	config::FlowConfig,
	error::ConfigError,
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Redacted bearer secret obtained from the token endpoint.
///
/// The token lives only for the duration of one authentication attempt and never appears in
/// `Debug`/`Display` output or error messages.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);
impl AccessToken {
	/// Wraps a new bearer secret.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Exchanges an authorization code for an access token against the configured token endpoint.
pub(crate) struct TokenExchanger {
	oauth_client: ConfiguredBasicClient,
	http_client: ReqwestHttpClient,
}
impl TokenExchanger {
	pub(crate) fn from_config(
		config: &FlowConfig,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(config.authorize_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "authorization", source })?;
		let token_url = TokenUrl::new(config.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "token", source })?;
		let redirect_url = RedirectUrl::new(config.callback_url.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url);

		Ok(Self { oauth_client, http_client })
	}

	/// Performs the code exchange; exactly one token endpoint call, no retries.
	pub(crate) async fn exchange_code(&self, code: &str) -> Result<AccessToken> {
		let slot = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(slot.clone());
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(slot.take(), err))?;

		Ok(AccessToken::new(response.access_token().secret().to_owned()))
	}
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let status = meta.and_then(|meta| meta.status);

	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = if let Some(description) = response.error_description() {
				description.clone()
			} else {
				response.error().as_ref().to_string()
			};

			Error::TokenExchange { reason, status, source: None }
		},
		RequestTokenError::Request(error) => map_transport_error(status, error),
		RequestTokenError::Parse(source, _body) => Error::TokenExchange {
			reason: format!("token endpoint returned malformed JSON at `{}`", source.path()),
			status,
			source: Some(Box::new(source)),
		},
		RequestTokenError::Other(message) =>
			Error::TokenExchange { reason: message, status, source: None },
	}
}

// Every failure of the exchange stays within the token exchange error, so an unreachable token
// endpoint is distinguishable from a transport failure on a later profile call. Request
// construction problems are local misconfiguration, not an endpoint outcome.
fn map_transport_error(status: Option<u16>, err: HttpClientError<ReqwestError>) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => Error::TokenExchange {
			reason: "token endpoint is unreachable".into(),
			status,
			source: Some(inner),
		},
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => Error::TokenExchange {
			reason: "I/O error during the token endpoint call".into(),
			status,
			source: Some(Box::new(inner)),
		},
		HttpClientError::Other(message) =>
			Error::TokenExchange { reason: message, status, source: None },
		_ => Error::TokenExchange {
			reason: "token endpoint call failed".into(),
			status,
			source: None,
		},
	}
}
