//! Authorization flow controller: the `begin`/`complete` entry points a hosting web layer
//! drives.
//!
//! Each attempt is a single pass over an immutable [`FlowConfig`] snapshot—no shared mutable
//! state, no retries, no backtracking. Concurrent attempts only share the read-only settings
//! source and the HTTP connection pool.

// self
use crate::{
	_prelude::*,
	config::{FlowConfig, REQUIRED_SCOPE, SettingsSource},
	error::TransportError,
	http::ReqwestHttpClient,
	identity::UserIdentity,
	oauth::TokenExchanger,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	profile::{FetchError, ProfileClient, TeamSet},
};

/// The authorization callback request the user agent was redirected back with.
///
/// Wraps the full callback URL so the flow can extract the authorization code and recover the
/// redirect URI the token endpoint must see again.
#[derive(Clone, Debug)]
pub struct CallbackRequest {
	url: Url,
}
impl CallbackRequest {
	/// Wraps the inbound callback URL.
	pub fn new(url: Url) -> Self {
		Self { url }
	}

	/// Full callback URL as received.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Authorization code carried in the `code` query parameter, if any.
	pub fn authorization_code(&self) -> Option<String> {
		self.url
			.query_pairs()
			.find(|(key, _)| key == "code")
			.map(|(_, value)| value.into_owned())
			.filter(|code| !code.is_empty())
	}

	/// Callback URL with query and fragment stripped; this is the redirect URI the
	/// authorization request was built with and the token exchange must repeat.
	pub fn redirect_uri(&self) -> Url {
		let mut url = self.url.clone();

		url.set_query(None);
		url.set_fragment(None);

		url
	}
}

/// Orchestrates one Bitbucket authentication attempt end to end.
///
/// The controller owns the settings source and the HTTP client so the hosting layer can keep
/// a single long-lived instance; every attempt snapshots configuration afresh and shares
/// nothing else with its neighbors.
#[derive(Clone)]
pub struct IdentityFlow {
	settings: Arc<dyn SettingsSource>,
	http_client: ReqwestHttpClient,
}
impl IdentityFlow {
	/// Creates a flow controller with a default reqwest transport.
	pub fn new(settings: Arc<dyn SettingsSource>) -> Self {
		Self::with_http_client(settings, ReqwestHttpClient::default())
	}

	/// Creates a flow controller that reuses the caller-provided transport.
	pub fn with_http_client(settings: Arc<dyn SettingsSource>, http_client: ReqwestHttpClient) -> Self {
		Self { settings, http_client }
	}

	/// Builds the authorization redirect URL the hosting layer sends the user agent to.
	///
	/// Performs no network I/O and persists no state across the redirect. Bitbucket's flow
	/// does not round-trip a `state` anti-forgery value; the only correlation between
	/// `begin` and [`complete`](Self::complete) is the hosting layer's callback transport.
	pub fn begin(&self, callback_url: Url) -> Result<Url> {
		let _guard = FlowSpan::new(FlowKind::Begin, "begin").entered();

		obs::record_flow_outcome(FlowKind::Begin, FlowOutcome::Attempt);

		let result = FlowConfig::snapshot(self.settings.as_ref(), callback_url)
			.map(|config| authorize_url(&config));

		match &result {
			Ok(_) => obs::record_flow_outcome(FlowKind::Begin, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(FlowKind::Begin, FlowOutcome::Failure),
		}

		result
	}

	/// Handles the authorization callback and resolves the internal identity.
	///
	/// Runs the whole sequence—code extraction, token exchange, profile fetch, optional team
	/// gate, identity resolution—issuing each remote call exactly once. The caller
	/// establishes the session from the returned identity and redirects the user agent to
	/// the originally requested page.
	pub async fn complete(&self, callback: &CallbackRequest) -> Result<UserIdentity> {
		let span = FlowSpan::new(FlowKind::Complete, "complete");

		obs::record_flow_outcome(FlowKind::Complete, FlowOutcome::Attempt);

		let result = span.instrument(self.complete_inner(callback)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(FlowKind::Complete, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(FlowKind::Complete, FlowOutcome::Failure),
		}

		result
	}

	async fn complete_inner(&self, callback: &CallbackRequest) -> Result<UserIdentity> {
		let config = FlowConfig::snapshot(self.settings.as_ref(), callback.redirect_uri())?;
		let code = callback.authorization_code().ok_or_else(|| Error::Protocol {
			reason: "missing `code` query parameter".into(),
		})?;
		let token = TokenExchanger::from_config(&config, self.http_client.clone())?
			.exchange_code(&code)
			.await?;
		let profile_client = ProfileClient::new(self.http_client.clone(), config.api_url.clone());
		let user = profile_client.fetch_user(&token).await.map_err(map_user_fetch_error)?;
		let emails = match profile_client.fetch_emails(&token).await {
			Ok(emails) => Some(emails),
			Err(err) => {
				obs::soft_failure("user emails", &err);

				None
			},
		};

		if !config.restriction.is_empty() {
			let teams: Option<TeamSet> = match profile_client.fetch_teams(&token).await {
				Ok(teams) => Some(teams),
				Err(err) => {
					obs::soft_failure("teams", &err);

					None
				},
			};

			if !config.restriction.permits(teams.as_ref()) {
				return Err(Error::AccessDenied { username: user.username });
			}
		}

		let email = emails.as_ref().and_then(|emails| emails.preferred());

		Ok(UserIdentity::resolve(&user, email, config.login_strategy, config.allow_sign_up))
	}
}
impl Debug for IdentityFlow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityFlow").finish_non_exhaustive()
	}
}

fn authorize_url(config: &FlowConfig) -> Url {
	let mut url = config.authorize_endpoint.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", &config.client_id);
	pairs.append_pair("redirect_uri", config.callback_url.as_str());
	pairs.append_pair("scope", REQUIRED_SCOPE);

	drop(pairs);

	url
}

// The user fetch is the one mandatory profile call: a non-2xx aborts with the status and body
// preserved verbatim, everything else keeps its own shape.
fn map_user_fetch_error(err: FetchError) -> Error {
	match err {
		FetchError::Status { status, body } => Error::ProfileFetch { status, body },
		FetchError::Transport { source } => TransportError::from(source).into(),
		err => Error::InvalidProfile { source: err },
	}
}
