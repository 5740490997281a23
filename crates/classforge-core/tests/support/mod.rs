//! In-memory collaborators for driving workflows without a network or git.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tokio::time::Instant;

use classforge_core::entity::{
    EntityRef, EntityStore, GroupRepoDescription, MemoryEntityStore, PersistedProvisioningState,
    ProjectRepoDescription, StoreError,
};
use classforge_core::github::{
    ApiError, ApiResult, Commit, CommitAuthor, CommitComment, CommitDetail, Hook, HookConfig,
    HookSpec, HostingApi, ImportStatus, Membership, Permission, Repository, Team,
};
use classforge_core::provision::{ProvisionTargets, Provisioner, StaffTeam};
use classforge_core::transplant::{
    TransplantError, TransplantOutcome, TransplantStep, Transplanter,
};

pub const ORG: &str = "cs310";
pub const WEB: &str = "https://github.test";
pub const STAFF_TEAM_ID: u64 = 1;
pub const HOOK_URL: &str = "https://ci.test/push";
pub const STARTER: &str = "https://github.test/cs310/starter";

// =========================================================================
// Hosting API
// =========================================================================

#[derive(Debug, Clone)]
pub struct Call {
    pub op: &'static str,
    pub target: String,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    status: u16,
    /// `None` fails every call.
    remaining: Option<usize>,
}

#[derive(Default)]
struct World {
    next_id: u64,
    repos: BTreeMap<String, Repository>,
    teams: Vec<Team>,
    members: HashMap<u64, BTreeSet<String>>,
    team_access: HashMap<(u64, String), Permission>,
    collaborators: HashMap<String, BTreeMap<String, Permission>>,
    hooks: HashMap<String, Vec<Hook>>,
    commits: HashMap<String, Vec<Commit>>,
    comments: Vec<(String, String, String)>,
    imports: Vec<(String, String)>,
    calls: Vec<Call>,
    failures: HashMap<&'static str, Failure>,
}

/// Organization held in memory. Mirrors the provider's observable
/// semantics: duplicate names are 422, unknown ids are 404, and
/// membership and access grants are idempotent.
pub struct FakeHostingApi {
    world: Mutex<World>,
}

impl FakeHostingApi {
    /// Empty organization containing only the `staff` team.
    pub fn new() -> Arc<Self> {
        let fake = Self {
            world: Mutex::new(World {
                next_id: 100,
                ..World::default()
            }),
        };
        fake.world.lock().unwrap().teams.push(Team {
            id: STAFF_TEAM_ID,
            name: "staff".to_string(),
            slug: "staff".to_string(),
        });
        Arc::new(fake)
    }

    /// Fail every call to `op` with `status`.
    pub fn fail_always(&self, op: &'static str, status: u16) {
        self.world.lock().unwrap().failures.insert(
            op,
            Failure {
                status,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` calls to `op` with `status`.
    pub fn fail_times(&self, op: &'static str, status: u16, times: usize) {
        self.world.lock().unwrap().failures.insert(
            op,
            Failure {
                status,
                remaining: Some(times),
            },
        );
    }

    pub fn heal(&self, op: &'static str) {
        self.world.lock().unwrap().failures.remove(op);
    }

    pub fn seed_team(&self, name: &str) -> u64 {
        let mut world = self.world.lock().unwrap();
        let id = world.allocate_id();
        world.teams.push(Team {
            id,
            name: name.to_string(),
            slug: name.to_lowercase(),
        });
        id
    }

    pub fn seed_repo(&self, name: &str) -> Repository {
        let mut world = self.world.lock().unwrap();
        let id = world.allocate_id();
        let repo = repository(id, name);
        world.repos.insert(name.to_string(), repo.clone());
        repo
    }

    pub fn seed_hook(&self, repo: &str, url: &str) -> u64 {
        let mut world = self.world.lock().unwrap();
        let id = world.allocate_id();
        world.hooks.entry(repo.to_string()).or_default().push(hook(id, url));
        id
    }

    pub fn seed_commit(&self, repo: &str, sha: &str, date: DateTime<Utc>) {
        let commit = Commit {
            sha: sha.to_string(),
            commit: CommitDetail {
                message: format!("commit {sha}"),
                author: Some(CommitAuthor {
                    name: "student".to_string(),
                    date,
                }),
            },
            html_url: format!("{WEB}/{ORG}/{repo}/commit/{sha}"),
        };
        self.world
            .lock()
            .unwrap()
            .commits
            .entry(repo.to_string())
            .or_default()
            .push(commit);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.world.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.world
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.op == op)
            .count()
    }

    /// Time of the first call to `op` against `target`.
    pub fn first_call(&self, op: &str, target: &str) -> Option<Instant> {
        self.world
            .lock()
            .unwrap()
            .calls
            .iter()
            .find(|call| call.op == op && call.target == target)
            .map(|call| call.at)
    }

    pub fn repo(&self, name: &str) -> Option<Repository> {
        self.world.lock().unwrap().repos.get(name).cloned()
    }

    pub fn team_named(&self, name: &str) -> Option<Team> {
        self.world
            .lock()
            .unwrap()
            .teams
            .iter()
            .find(|team| team.name == name)
            .cloned()
    }

    pub fn members(&self, team_id: u64) -> BTreeSet<String> {
        self.world
            .lock()
            .unwrap()
            .members
            .get(&team_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn team_access(&self, team_id: u64, repo: &str) -> Option<Permission> {
        self.world
            .lock()
            .unwrap()
            .team_access
            .get(&(team_id, repo.to_string()))
            .copied()
    }

    pub fn collaborators(&self, repo: &str) -> BTreeMap<String, Permission> {
        self.world
            .lock()
            .unwrap()
            .collaborators
            .get(repo)
            .cloned()
            .unwrap_or_default()
    }

    pub fn hooks(&self, repo: &str) -> Vec<Hook> {
        self.world
            .lock()
            .unwrap()
            .hooks
            .get(repo)
            .cloned()
            .unwrap_or_default()
    }

    pub fn comments(&self) -> Vec<(String, String, String)> {
        self.world.lock().unwrap().comments.clone()
    }

    /// Log the call and apply any configured failure.
    fn enter(&self, op: &'static str, target: impl Into<String>) -> ApiResult<()> {
        let target = target.into();
        let mut world = self.world.lock().unwrap();
        world.calls.push(Call {
            op,
            target: target.clone(),
            at: Instant::now(),
        });
        let Some(failure) = world.failures.get_mut(op) else {
            return Ok(());
        };
        let status = failure.status;
        match &mut failure.remaining {
            None => {}
            Some(0) => return Ok(()),
            Some(n) => *n -= 1,
        }
        Err(api_error(&format!("{op} {target}"), status))
    }
}

impl World {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_repo(&self, name: &str) -> ApiResult<()> {
        if self.repos.contains_key(name) {
            Ok(())
        } else {
            Err(api_error(&format!("repos/{ORG}/{name}"), 404))
        }
    }

    fn require_team(&self, team_id: u64) -> ApiResult<()> {
        if self.teams.iter().any(|team| team.id == team_id) {
            Ok(())
        } else {
            Err(api_error(&format!("teams/{team_id}"), 404))
        }
    }
}

pub fn api_error(path: &str, status: u16) -> ApiError {
    let status = StatusCode::from_u16(status).unwrap();
    ApiError::from_response(path, status, None, None, "injected failure")
}

fn repository(id: u64, name: &str) -> Repository {
    Repository {
        id,
        name: name.to_string(),
        full_name: format!("{ORG}/{name}"),
        html_url: format!("{WEB}/{ORG}/{name}"),
        clone_url: format!("{WEB}/{ORG}/{name}.git"),
        private: true,
    }
}

fn hook(id: u64, url: &str) -> Hook {
    Hook {
        id,
        active: true,
        events: vec!["push".to_string()],
        config: HookConfig {
            url: Some(url.to_string()),
            content_type: Some("json".to_string()),
        },
    }
}

#[async_trait]
impl HostingApi for FakeHostingApi {
    fn repo_url(&self, repo: &str) -> String {
        format!("{WEB}/{ORG}/{repo}")
    }

    fn clone_url(&self, repo: &str) -> String {
        format!("{WEB}/{ORG}/{repo}.git")
    }

    async fn create_repo(&self, name: &str) -> ApiResult<Repository> {
        self.enter("create_repo", name)?;
        let mut world = self.world.lock().unwrap();
        if world.repos.contains_key(name) {
            return Err(api_error(&format!("orgs/{ORG}/repos"), 422));
        }
        let id = world.allocate_id();
        let repo = repository(id, name);
        world.repos.insert(name.to_string(), repo.clone());
        Ok(repo)
    }

    async fn delete_repo(&self, name: &str) -> ApiResult<()> {
        self.enter("delete_repo", name)?;
        let mut world = self.world.lock().unwrap();
        world.require_repo(name)?;
        world.repos.remove(name);
        world.hooks.remove(name);
        world.collaborators.remove(name);
        world.team_access.retain(|(_, repo), _| repo != name);
        Ok(())
    }

    async fn list_repos(&self) -> ApiResult<Vec<Repository>> {
        self.enter("list_repos", ORG)?;
        Ok(self.world.lock().unwrap().repos.values().cloned().collect())
    }

    async fn list_teams(&self) -> ApiResult<Vec<Team>> {
        self.enter("list_teams", ORG)?;
        Ok(self.world.lock().unwrap().teams.clone())
    }

    async fn create_team(&self, name: &str) -> ApiResult<Team> {
        self.enter("create_team", name)?;
        let mut world = self.world.lock().unwrap();
        if world.teams.iter().any(|team| team.name == name) {
            return Err(api_error(&format!("orgs/{ORG}/teams"), 422));
        }
        let id = world.allocate_id();
        let team = Team {
            id,
            name: name.to_string(),
            slug: name.to_lowercase(),
        };
        world.teams.push(team.clone());
        Ok(team)
    }

    async fn rename_team(&self, team_id: u64, name: &str) -> ApiResult<Team> {
        self.enter("rename_team", team_id.to_string())?;
        let mut world = self.world.lock().unwrap();
        world.require_team(team_id)?;
        let team = world
            .teams
            .iter_mut()
            .find(|team| team.id == team_id)
            .unwrap();
        team.name = name.to_string();
        team.slug = name.to_lowercase();
        Ok(team.clone())
    }

    async fn add_team_to_repo(
        &self,
        team_id: u64,
        repo: &str,
        permission: Permission,
    ) -> ApiResult<()> {
        self.enter("add_team_to_repo", format!("{team_id}:{repo}"))?;
        let mut world = self.world.lock().unwrap();
        world.require_team(team_id)?;
        world.require_repo(repo)?;
        world
            .team_access
            .insert((team_id, repo.to_string()), permission);
        Ok(())
    }

    async fn add_team_member(&self, team_id: u64, user: &str) -> ApiResult<Membership> {
        self.enter("add_team_member", format!("{team_id}:{user}"))?;
        let mut world = self.world.lock().unwrap();
        world.require_team(team_id)?;
        world
            .members
            .entry(team_id)
            .or_default()
            .insert(user.to_string());
        Ok(Membership {
            state: "active".to_string(),
            role: "member".to_string(),
        })
    }

    async fn remove_team_member(&self, team_id: u64, user: &str) -> ApiResult<()> {
        self.enter("remove_team_member", format!("{team_id}:{user}"))?;
        let mut world = self.world.lock().unwrap();
        world.require_team(team_id)?;
        world.members.entry(team_id).or_default().remove(user);
        Ok(())
    }

    async fn add_collaborator(
        &self,
        repo: &str,
        user: &str,
        permission: Permission,
    ) -> ApiResult<()> {
        self.enter("add_collaborator", format!("{repo}:{user}"))?;
        let mut world = self.world.lock().unwrap();
        world.require_repo(repo)?;
        world
            .collaborators
            .entry(repo.to_string())
            .or_default()
            .insert(user.to_string(), permission);
        Ok(())
    }

    async fn remove_collaborator(&self, repo: &str, user: &str) -> ApiResult<()> {
        self.enter("remove_collaborator", format!("{repo}:{user}"))?;
        let mut world = self.world.lock().unwrap();
        world.require_repo(repo)?;
        world
            .collaborators
            .entry(repo.to_string())
            .or_default()
            .remove(user);
        Ok(())
    }

    async fn list_hooks(&self, repo: &str) -> ApiResult<Vec<Hook>> {
        self.enter("list_hooks", repo)?;
        let world = self.world.lock().unwrap();
        world.require_repo(repo)?;
        Ok(world.hooks.get(repo).cloned().unwrap_or_default())
    }

    async fn add_hook(&self, repo: &str, spec: &HookSpec) -> ApiResult<Hook> {
        self.enter("add_hook", repo)?;
        let mut world = self.world.lock().unwrap();
        world.require_repo(repo)?;
        let id = world.allocate_id();
        let created = hook(id, &spec.url);
        world
            .hooks
            .entry(repo.to_string())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn delete_hook(&self, repo: &str, hook_id: u64) -> ApiResult<()> {
        self.enter("delete_hook", format!("{repo}:{hook_id}"))?;
        let mut world = self.world.lock().unwrap();
        let hooks = world.hooks.entry(repo.to_string()).or_default();
        let before = hooks.len();
        hooks.retain(|hook| hook.id != hook_id);
        if hooks.len() == before {
            return Err(api_error(&format!("repos/{ORG}/{repo}/hooks/{hook_id}"), 404));
        }
        Ok(())
    }

    async fn start_import(&self, repo: &str, source_url: &str) -> ApiResult<ImportStatus> {
        self.enter("start_import", repo)?;
        let mut world = self.world.lock().unwrap();
        world.require_repo(repo)?;
        world
            .imports
            .push((repo.to_string(), source_url.to_string()));
        Ok(ImportStatus {
            status: "importing".to_string(),
            status_text: None,
        })
    }

    async fn list_commits(
        &self,
        repo: &str,
        until: Option<DateTime<Utc>>,
    ) -> ApiResult<Vec<Commit>> {
        self.enter("list_commits", repo)?;
        let world = self.world.lock().unwrap();
        world.require_repo(repo)?;
        let mut commits: Vec<Commit> = world
            .commits
            .get(repo)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|commit| {
                until.is_none_or(|until| commit.authored_at().is_none_or(|at| at <= until))
            })
            .collect();
        commits.sort_by_key(|commit| std::cmp::Reverse(commit.authored_at()));
        Ok(commits)
    }

    async fn post_commit_comment(
        &self,
        repo: &str,
        sha: &str,
        body: &str,
    ) -> ApiResult<CommitComment> {
        self.enter("post_commit_comment", format!("{repo}:{sha}"))?;
        let mut world = self.world.lock().unwrap();
        world.require_repo(repo)?;
        let id = world.allocate_id();
        world
            .comments
            .push((repo.to_string(), sha.to_string(), body.to_string()));
        Ok(CommitComment {
            id,
            html_url: format!("{WEB}/{ORG}/{repo}/commit/{sha}#commitcomment-{id}"),
            body: body.to_string(),
        })
    }
}

// =========================================================================
// Transplanter
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransplantCall {
    pub source: String,
    pub destination: String,
    pub pristine_only: bool,
}

#[derive(Default)]
pub struct FakeTransplanter {
    calls: Mutex<Vec<TransplantCall>>,
    fail_push: Mutex<bool>,
    has_work: Mutex<bool>,
}

impl FakeTransplanter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_push(&self, fail: bool) {
        *self.fail_push.lock().unwrap() = fail;
    }

    /// Make destinations look like students already pushed work.
    pub fn destinations_have_work(&self, has_work: bool) {
        *self.has_work.lock().unwrap() = has_work;
    }

    pub fn calls(&self) -> Vec<TransplantCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, source: &str, destination: &str, pristine_only: bool) {
        self.calls.lock().unwrap().push(TransplantCall {
            source: source.to_string(),
            destination: destination.to_string(),
            pristine_only,
        });
    }

    fn push_result(&self) -> Result<(), TransplantError> {
        if *self.fail_push.lock().unwrap() {
            return Err(TransplantError::Command {
                step: TransplantStep::Push,
                stderr: "remote rejected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transplanter for FakeTransplanter {
    async fn transplant(&self, source: &str, destination: &str) -> Result<(), TransplantError> {
        self.record(source, destination, false);
        self.push_result()
    }

    async fn transplant_if_pristine(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<TransplantOutcome, TransplantError> {
        self.record(source, destination, true);
        if *self.has_work.lock().unwrap() {
            return Ok(TransplantOutcome::Skipped);
        }
        self.push_result()?;
        Ok(TransplantOutcome::Applied)
    }
}

// =========================================================================
// Store
// =========================================================================

type SavePredicate = Box<dyn Fn(&PersistedProvisioningState) -> bool + Send + Sync>;

/// Memory store whose saves can be made to fail selectively.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryEntityStore,
    reject: Mutex<Option<SavePredicate>>,
    saves: Mutex<usize>,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reject every save of a state for which `predicate` holds.
    pub fn reject_saves_where(
        &self,
        predicate: impl Fn(&PersistedProvisioningState) -> bool + Send + Sync + 'static,
    ) {
        *self.reject.lock().unwrap() = Some(Box::new(predicate));
    }

    pub fn inner(&self) -> &MemoryEntityStore {
        &self.inner
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn load(&self, entity: &EntityRef) -> Result<PersistedProvisioningState, StoreError> {
        self.inner.load(entity).await
    }

    async fn save(
        &self,
        entity: &EntityRef,
        state: &PersistedProvisioningState,
    ) -> Result<(), StoreError> {
        *self.saves.lock().unwrap() += 1;
        let rejected = self
            .reject
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|predicate| predicate(state));
        if rejected {
            return Err(StoreError::Unavailable(format!("save of {entity} rejected")));
        }
        self.inner.save(entity, state).await
    }
}

// =========================================================================
// Fixtures
// =========================================================================

pub struct Harness {
    pub api: Arc<FakeHostingApi>,
    pub store: Arc<FlakyStore>,
    pub transplanter: Arc<FakeTransplanter>,
    pub provisioner: Provisioner,
    pub targets: ProvisionTargets,
}

impl Harness {
    pub fn new() -> Self {
        let api = FakeHostingApi::new();
        let store = FlakyStore::new();
        let transplanter = FakeTransplanter::new();
        let provisioner = Provisioner::new(api.clone(), store.clone(), transplanter.clone());
        Self {
            api,
            store,
            transplanter,
            provisioner,
            targets: targets(),
        }
    }

    pub fn state(&self, entity: &EntityRef) -> PersistedProvisioningState {
        self.store.inner().get(entity).unwrap_or_default()
    }

    pub fn set_state(&self, entity: &EntityRef, state: PersistedProvisioningState) {
        self.store.inner().insert(entity.clone(), state);
    }
}

pub fn targets() -> ProvisionTargets {
    ProvisionTargets::new(
        STARTER,
        StaffTeam::Name("staff".to_string()),
        HookSpec::push(HOOK_URL),
    )
}

pub fn group(index: usize, id: &str, members: &[&str]) -> GroupRepoDescription {
    GroupRepoDescription {
        index,
        members: members.iter().map(|m| m.to_string()).collect(),
        repo_name: format!("p_{id}"),
        team_name: format!("t_{id}"),
        assigned_repo_url: None,
        entity: EntityRef::team(id),
    }
}

pub fn project(index: usize, id: &str, student: &str) -> ProjectRepoDescription {
    ProjectRepoDescription {
        index,
        student: student.to_string(),
        repo_name: format!("d0_{student}"),
        entity: EntityRef::project(id),
    }
}
