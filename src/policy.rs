//! Team restriction policy: a pure decision gate over the configured allow-list and the team
//! memberships fetched for the authenticated user.

// std
use std::collections::BTreeSet;
// self
use crate::profile::TeamSet;

/// Normalized set of team identifiers that are allowed to authenticate.
///
/// Identifiers are deduplicated and ordered so equality stays stable regardless of how the
/// configuration lists them. An empty set means the restriction is disabled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeamRestriction {
	teams: BTreeSet<String>,
}
impl TeamRestriction {
	/// Builds a restriction from the configured identifier list, dropping empty entries.
	pub fn new<I, S>(teams: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let teams = teams.into_iter().map(Into::into).filter(|team| !team.is_empty()).collect();

		Self { teams }
	}

	/// Returns true when no restriction is configured.
	pub fn is_empty(&self) -> bool {
		self.teams.is_empty()
	}

	/// Iterator over the normalized team identifiers.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.teams.iter().map(String::as_str)
	}

	/// Decides whether the fetched memberships satisfy the restriction.
	///
	/// Total function, no I/O. `None` means the team fetch failed or never happened and is
	/// treated as "member of nothing": a configured restriction then denies access
	/// (fail-closed) rather than waving the user through.
	pub fn permits(&self, teams: Option<&TeamSet>) -> bool {
		if self.teams.is_empty() {
			return true;
		}

		let Some(teams) = teams else {
			return false;
		};

		teams.identifiers().any(|team| self.teams.contains(team))
	}
}
