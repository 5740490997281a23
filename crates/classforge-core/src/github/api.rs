//! Operations the provisioning workflows require from a hosting provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    ApiResult, Commit, CommitComment, Hook, HookSpec, ImportStatus, Membership, Permission,
    Repository, Team,
};

/// Stateless request surface scoped to one organization.
///
/// Every call either yields its typed payload or an [`ApiError`](super::ApiError);
/// nothing is retried or swallowed here.
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Browser URL of an organization repository.
    fn repo_url(&self, repo: &str) -> String;

    /// Git remote URL of an organization repository (without credentials).
    fn clone_url(&self, repo: &str) -> String;

    async fn create_repo(&self, name: &str) -> ApiResult<Repository>;

    async fn delete_repo(&self, name: &str) -> ApiResult<()>;

    async fn list_repos(&self) -> ApiResult<Vec<Repository>>;

    /// Full team listing, merged across pages.
    async fn list_teams(&self) -> ApiResult<Vec<Team>>;

    async fn create_team(&self, name: &str) -> ApiResult<Team>;

    async fn rename_team(&self, team_id: u64, name: &str) -> ApiResult<Team>;

    async fn add_team_to_repo(
        &self,
        team_id: u64,
        repo: &str,
        permission: Permission,
    ) -> ApiResult<()>;

    async fn add_team_member(&self, team_id: u64, user: &str) -> ApiResult<Membership>;

    async fn remove_team_member(&self, team_id: u64, user: &str) -> ApiResult<()>;

    async fn add_collaborator(&self, repo: &str, user: &str, permission: Permission)
    -> ApiResult<()>;

    async fn remove_collaborator(&self, repo: &str, user: &str) -> ApiResult<()>;

    async fn list_hooks(&self, repo: &str) -> ApiResult<Vec<Hook>>;

    async fn add_hook(&self, repo: &str, hook: &HookSpec) -> ApiResult<Hook>;

    async fn delete_hook(&self, repo: &str, hook_id: u64) -> ApiResult<()>;

    /// Kick off a server-side import. Completion is not tracked.
    async fn start_import(&self, repo: &str, source_url: &str) -> ApiResult<ImportStatus>;

    /// Commits on the default branch, newest first.
    async fn list_commits(&self, repo: &str, until: Option<DateTime<Utc>>)
    -> ApiResult<Vec<Commit>>;

    async fn post_commit_comment(
        &self,
        repo: &str,
        sha: &str,
        body: &str,
    ) -> ApiResult<CommitComment>;

    /// Look a team up by name or slug in the full listing.
    async fn find_team_by_name(&self, name: &str) -> ApiResult<Option<Team>> {
        let teams = self.list_teams().await?;
        Ok(teams
            .into_iter()
            .find(|team| team.name == name || team.slug == name))
    }

    /// Look an organization repository up by name in the full listing.
    async fn find_repo_by_name(&self, name: &str) -> ApiResult<Option<Repository>> {
        let repos = self.list_repos().await?;
        Ok(repos
            .into_iter()
            .find(|repo| repo.name.eq_ignore_ascii_case(name)))
    }

    /// Newest commit authored at or before `until`.
    async fn latest_commit_before(
        &self,
        repo: &str,
        until: DateTime<Utc>,
    ) -> ApiResult<Option<Commit>> {
        let commits = self.list_commits(repo, Some(until)).await?;
        Ok(commits
            .into_iter()
            .find(|commit| commit.authored_at().is_none_or(|at| at <= until)))
    }
}
