//! Transplant via the git CLI.

use std::path::Path;

use async_trait::async_trait;
use git2::{ErrorCode, Repository};
use tokio::process::Command;
use tracing::{debug, info, instrument};
use url::Url;

use super::{ScratchSpace, TransplantError, TransplantOutcome, TransplantStep, Transplanter};

/// Message of the single commit created in the destination.
pub const STARTER_COMMIT_MESSAGE: &str = "Starter files";

/// Message of the commit the provider writes when a repository is auto-initialized.
const PROVIDER_INITIAL_MESSAGE: &str = "Initial commit";

/// Variables that would redirect git away from the scratch checkout.
const GIT_ENV_OVERRIDES: [&str; 4] = [
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
];

const STARTER_DIR: &str = "starter";
const DESTINATION_DIR: &str = "destination";

/// What the destination looked like before a pristine-only transplant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DestinationState {
    /// No commits at all.
    Empty,
    /// Exactly one commit, written by the provider or by an earlier transplant.
    Initial,
    /// Further history exists; members have started pushing.
    HasWork,
}

/// Transplanter shelling out to `git` with a token embedded in remote URLs.
#[derive(Debug, Clone)]
pub struct GitTransplanter {
    scratch: ScratchSpace,
    token: Option<String>,
    branch: String,
    author_name: String,
    author_email: String,
}

impl GitTransplanter {
    pub fn new(scratch: ScratchSpace) -> Self {
        Self {
            scratch,
            token: None,
            branch: "main".to_string(),
            author_name: "classforge".to_string(),
            author_email: "classforge@users.noreply.github.com".to_string(),
        }
    }

    /// Token embedded into http(s) remotes for clone and push.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.is_empty()).then_some(token);
        self
    }

    /// Branch the starter commit is pushed to.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    /// Steps 1-6: clone starter, drop its history, commit once, push.
    async fn apply(
        &self,
        workdir: &Path,
        source_url: &str,
        destination_url: &str,
        force: bool,
    ) -> Result<(), TransplantError> {
        let token = self.token.as_deref();
        let source = authenticated_url(source_url, token);
        let destination = authenticated_url(destination_url, token);
        let starter = workdir.join(STARTER_DIR);

        self.git(
            TransplantStep::CloneSource,
            workdir,
            &["clone", "--quiet", &source, STARTER_DIR],
        )
        .await?;

        tokio::fs::remove_dir_all(starter.join(".git"))
            .await
            .map_err(|source| TransplantError::Filesystem {
                step: TransplantStep::StripHistory,
                source,
            })?;

        self.git(TransplantStep::InitHistory, &starter, &["init", "--quiet"])
            .await?;
        self.git(
            TransplantStep::AddRemote,
            &starter,
            &["remote", "add", "origin", &destination],
        )
        .await?;
        self.git(
            TransplantStep::FetchRemote,
            &starter,
            &["fetch", "--quiet", "origin"],
        )
        .await?;
        self.git(TransplantStep::Stage, &starter, &["add", "--all"])
            .await?;

        let author_name = format!("user.name={}", self.author_name);
        let author_email = format!("user.email={}", self.author_email);
        self.git(
            TransplantStep::Commit,
            &starter,
            &[
                "-c",
                &author_name,
                "-c",
                &author_email,
                "commit",
                "--quiet",
                "-m",
                STARTER_COMMIT_MESSAGE,
            ],
        )
        .await?;

        let refspec = format!("HEAD:refs/heads/{}", self.branch);
        let mut push = vec!["push", "--quiet"];
        if force {
            push.push("--force");
        }
        push.extend(["origin", refspec.as_str()]);
        self.git(TransplantStep::Push, &starter, &push).await?;
        Ok(())
    }

    async fn git(
        &self,
        step: TransplantStep,
        cwd: &Path,
        args: &[&str],
    ) -> Result<String, TransplantError> {
        debug!(%step, "running git");
        let mut cmd = Command::new("git");
        for key in GIT_ENV_OVERRIDES {
            cmd.env_remove(key);
        }
        cmd.env("GIT_TERMINAL_PROMPT", "0")
            .args(args)
            .current_dir(cwd)
            .kill_on_drop(true);
        let output = cmd
            .output()
            .await
            .map_err(|source| TransplantError::Spawn { step, source })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransplantError::Command {
                step,
                stderr: redact(stderr.trim(), self.token.as_deref()),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Transplanter for GitTransplanter {
    #[instrument(skip(self))]
    async fn transplant(
        &self,
        source_url: &str,
        destination_url: &str,
    ) -> Result<(), TransplantError> {
        let workdir = self.scratch.allocate()?;
        self.apply(workdir.path(), source_url, destination_url, false)
            .await?;
        info!("starter content transplanted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn transplant_if_pristine(
        &self,
        source_url: &str,
        destination_url: &str,
    ) -> Result<TransplantOutcome, TransplantError> {
        let workdir = self.scratch.allocate()?;
        let destination = authenticated_url(destination_url, self.token.as_deref());
        self.git(
            TransplantStep::CloneDestination,
            workdir.path(),
            &["clone", "--quiet", &destination, DESTINATION_DIR],
        )
        .await?;

        let state = inspect_destination(&workdir.path().join(DESTINATION_DIR))?;
        debug!(?state, "inspected destination");
        let force = match state {
            DestinationState::Empty => false,
            // Replaces a generated root commit.
            DestinationState::Initial => true,
            DestinationState::HasWork => {
                info!("destination already has work; transplant skipped");
                return Ok(TransplantOutcome::Skipped);
            }
        };

        self.apply(workdir.path(), source_url, destination_url, force)
            .await?;
        info!("starter content transplanted");
        Ok(TransplantOutcome::Applied)
    }
}

fn inspect_destination(clone_dir: &Path) -> Result<DestinationState, git2::Error> {
    let repo = Repository::open(clone_dir)?;
    let head = match repo.head() {
        Ok(head) => head,
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            return Ok(DestinationState::Empty);
        }
        Err(err) => return Err(err),
    };
    let Some(tip) = head.target() else {
        return Ok(DestinationState::Empty);
    };
    let commit = repo.find_commit(tip)?;
    if commit.parent_count() > 0 {
        return Ok(DestinationState::HasWork);
    }
    Ok(if is_generated_message(commit.message().unwrap_or_default()) {
        DestinationState::Initial
    } else {
        DestinationState::HasWork
    })
}

/// Whether a root commit message marks content this system or the provider wrote.
fn is_generated_message(message: &str) -> bool {
    let message = message.trim();
    message == STARTER_COMMIT_MESSAGE || message == PROVIDER_INITIAL_MESSAGE
}

/// Embed `token` as basic-auth credentials into an http(s) remote URL.
///
/// Local paths, `file://` and ssh remotes are returned unchanged.
pub fn authenticated_url(raw: &str, token: Option<&str>) -> String {
    let Some(token) = token.filter(|token| !token.is_empty()) else {
        return raw.to_string();
    };
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    if !matches!(url.scheme(), "http" | "https") {
        return raw.to_string();
    }
    if url.set_username("x-access-token").is_err() || url.set_password(Some(token)).is_err() {
        return raw.to_string();
    }
    url.to_string()
}

/// Mask every occurrence of `secret` in `text`.
pub fn redact(text: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => text.replace(secret, "***"),
        _ => text.to_string(),
    }
}
