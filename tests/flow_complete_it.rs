// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use bitbucket_identity::{
	config::StaticSettings,
	error::Error,
	flow::{CallbackRequest, IdentityFlow},
	identity::LoginStrategy,
	url::Url,
};

const CLIENT_ID: &str = "client-it";
const CLIENT_SECRET: &str = "secret-it";

fn build_test_flow(settings: StaticSettings) -> IdentityFlow {
	IdentityFlow::new(Arc::new(settings))
}

fn server_settings(server: &MockServer) -> StaticSettings {
	StaticSettings::default()
		.with_enabled(true)
		.with_client_id(CLIENT_ID)
		.with_client_secret(CLIENT_SECRET)
		.with_api_url(server.base_url())
		.with_web_url(server.base_url())
}

fn callback_with_code() -> CallbackRequest {
	CallbackRequest::new(
		Url::parse("https://sonar.example.com/oauth2/callback/bitbucket?code=valid-code")
			.expect("Callback fixture should parse successfully."),
	)
}

async fn mock_token_endpoint(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/site/oauth2/access_token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-123\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await
}

async fn mock_user_endpoint(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(GET).path("/2.0/user").header("authorization", "Bearer access-123");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"username\":\"john\",\"display_name\":\"John\"}");
		})
		.await
}

async fn mock_emails_endpoint(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(GET).path("/2.0/user/emails").header("authorization", "Bearer access-123");
			then.status(200).header("content-type", "application/json").body(
				"{\"values\":[{\"email\":\"john@x.org\",\"is_primary\":true,\"is_active\":true}]}",
			);
		})
		.await
}

async fn mock_teams_endpoint<'a>(server: &'a MockServer, body: &str) -> httpmock::Mock<'a> {
	let body = body.to_owned();

	server
		.mock_async(move |when, then| {
			when.method(GET)
				.path("/2.0/teams")
				.query_param("role", "member")
				.query_param("pagelen", "100");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

#[tokio::test]
async fn complete_resolves_the_identity_with_exactly_three_remote_calls() {
	let server = MockServer::start_async().await;
	let token_mock = mock_token_endpoint(&server).await;
	let user_mock = mock_user_endpoint(&server).await;
	let emails_mock = mock_emails_endpoint(&server).await;
	let teams_mock = mock_teams_endpoint(&server, "{\"values\":[]}").await;
	let flow = build_test_flow(server_settings(&server));
	let identity = flow
		.complete(&callback_with_code())
		.await
		.expect("Unrestricted authentication should succeed.");

	assert_eq!(identity.login, "john@bitbucket");
	assert_eq!(identity.display_name, "John");
	assert_eq!(identity.email.as_deref(), Some("john@x.org"));
	assert_eq!(identity.provider_key, "bitbucket");
	assert!(identity.allow_sign_up);

	token_mock.assert_async().await;
	user_mock.assert_async().await;
	emails_mock.assert_async().await;

	assert_eq!(
		teams_mock.hits_async().await,
		0,
		"The teams endpoint must stay untouched without a configured restriction."
	);
}

#[tokio::test]
async fn complete_honors_the_provider_login_strategy() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token_endpoint(&server).await;
	let _user_mock = mock_user_endpoint(&server).await;
	let _emails_mock = mock_emails_endpoint(&server).await;
	let settings =
		server_settings(&server).with_login_strategy(LoginStrategy::SameAsProvider);
	let flow = build_test_flow(settings);
	let identity = flow
		.complete(&callback_with_code())
		.await
		.expect("Authentication should succeed with the provider login strategy.");

	assert_eq!(identity.login, "john");
}

#[tokio::test]
async fn complete_aborts_when_the_profile_fetch_fails() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token_endpoint(&server).await;
	let user_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/2.0/user");
			then.status(500).body("{\"error\":\"boom\"}");
		})
		.await;
	let emails_mock = mock_emails_endpoint(&server).await;
	let flow = build_test_flow(server_settings(&server));
	let err = flow
		.complete(&callback_with_code())
		.await
		.expect_err("A failing profile fetch must abort the attempt.");

	assert!(
		matches!(&err, Error::ProfileFetch { status: 500, body } if body == "{\"error\":\"boom\"}"),
		"Expected a profile fetch failure carrying status and body, got: {err:?}"
	);

	user_mock.assert_async().await;

	assert_eq!(
		emails_mock.hits_async().await,
		0,
		"No further calls may happen after the mandatory fetch fails."
	);
}

#[tokio::test]
async fn complete_continues_without_an_email_when_the_email_fetch_fails() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token_endpoint(&server).await;
	let _user_mock = mock_user_endpoint(&server).await;
	let _emails_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/2.0/user/emails");
			then.status(500).body("unavailable");
		})
		.await;
	let flow = build_test_flow(server_settings(&server));
	let identity = flow
		.complete(&callback_with_code())
		.await
		.expect("A failing email fetch must not abort the attempt.");

	assert_eq!(identity.login, "john@bitbucket");
	assert_eq!(identity.email, None);
}

#[tokio::test]
async fn complete_admits_members_of_a_restricted_team() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token_endpoint(&server).await;
	let _user_mock = mock_user_endpoint(&server).await;
	let _emails_mock = mock_emails_endpoint(&server).await;
	let teams_mock = mock_teams_endpoint(
		&server,
		"{\"values\":[{\"username\":\"team2\",\"display_name\":\"Team Two\"}]}",
	)
	.await;
	let settings = server_settings(&server).with_team_restriction(["team1", "team2"]);
	let flow = build_test_flow(settings);
	let identity = flow
		.complete(&callback_with_code())
		.await
		.expect("A member of a restricted team should authenticate.");

	assert_eq!(identity.login, "john@bitbucket");

	teams_mock.assert_async().await;
}

#[tokio::test]
async fn complete_denies_users_outside_the_restricted_teams() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token_endpoint(&server).await;
	let _user_mock = mock_user_endpoint(&server).await;
	let _emails_mock = mock_emails_endpoint(&server).await;
	let _teams_mock =
		mock_teams_endpoint(&server, "{\"values\":[{\"username\":\"team3\"}]}").await;
	let settings = server_settings(&server).with_team_restriction(["team1", "team2"]);
	let flow = build_test_flow(settings);
	let err = flow
		.complete(&callback_with_code())
		.await
		.expect_err("A user outside the restricted teams must be denied.");

	assert!(
		matches!(&err, Error::AccessDenied { username } if username == "john"),
		"Denial must name the authenticated provider username, got: {err:?}"
	);
}

#[tokio::test]
async fn complete_fails_closed_when_the_team_fetch_fails() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token_endpoint(&server).await;
	let _user_mock = mock_user_endpoint(&server).await;
	let _emails_mock = mock_emails_endpoint(&server).await;
	let _teams_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/2.0/teams");
			then.status(401).body("token expired");
		})
		.await;
	let settings = server_settings(&server).with_team_restriction(["team1"]);
	let flow = build_test_flow(settings);
	let err = flow
		.complete(&callback_with_code())
		.await
		.expect_err("An unverifiable membership must be denied, not waved through.");

	assert!(matches!(err, Error::AccessDenied { .. }));
}

#[tokio::test]
async fn complete_propagates_token_endpoint_rejections() {
	let server = MockServer::start_async().await;
	let _token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/site/oauth2/access_token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;
	let user_mock = mock_user_endpoint(&server).await;
	let flow = build_test_flow(server_settings(&server));
	let err = flow
		.complete(&callback_with_code())
		.await
		.expect_err("A rejected code exchange must abort the attempt.");

	assert!(
		matches!(err, Error::TokenExchange { status: Some(400), .. }),
		"Token exchange failures must carry the endpoint's HTTP status."
	);
	assert_eq!(
		user_mock.hits_async().await,
		0,
		"No profile call may happen without an access token."
	);
}

#[tokio::test]
async fn complete_reports_an_unreachable_token_endpoint_as_an_exchange_failure() {
	let settings = StaticSettings::default()
		.with_enabled(true)
		.with_client_id(CLIENT_ID)
		.with_client_secret(CLIENT_SECRET)
		.with_api_url("http://127.0.0.1:1")
		.with_web_url("http://127.0.0.1:1");
	let flow = build_test_flow(settings);
	let err = flow
		.complete(&callback_with_code())
		.await
		.expect_err("An unreachable token endpoint must fail the attempt.");

	assert!(
		matches!(err, Error::TokenExchange { status: None, .. }),
		"Exchange transport failures must surface as token exchange failures, got: {err:?}"
	);
}

#[tokio::test]
async fn complete_rejects_callbacks_without_a_code() {
	let server = MockServer::start_async().await;
	let token_mock = mock_token_endpoint(&server).await;
	let flow = build_test_flow(server_settings(&server));
	let callback = CallbackRequest::new(
		Url::parse("https://sonar.example.com/oauth2/callback/bitbucket?error=access_denied")
			.expect("Callback fixture should parse successfully."),
	);
	let err = flow
		.complete(&callback)
		.await
		.expect_err("A callback without a code is a protocol error.");

	assert!(matches!(err, Error::Protocol { .. }));
	assert_eq!(token_mock.hits_async().await, 0);
}

#[tokio::test]
async fn complete_fails_before_any_network_call_when_disabled() {
	let server = MockServer::start_async().await;
	let token_mock = mock_token_endpoint(&server).await;
	let settings = server_settings(&server).with_enabled(false);
	let flow = build_test_flow(settings);
	let err = flow
		.complete(&callback_with_code())
		.await
		.expect_err("A disabled configuration must fail the attempt.");

	assert!(matches!(err, Error::Disabled));
	assert_eq!(token_mock.hits_async().await, 0);
}
