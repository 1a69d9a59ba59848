//! `git` CLI implementation of [`GitOps`]

use super::GitOps;
use crate::error::{Error, Result};
use crate::types::GitRemote;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// A git working copy driven through the `git` binary
pub struct GitRepo {
    path: PathBuf,
}

/// Author identity of a commit, replayed onto cherry-picked copies
struct Author {
    name: String,
    email: String,
    date: String,
}

impl GitRepo {
    /// Open the repository containing `path`
    pub fn open(path: &Path) -> Result<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(path)
            .output()
            .map_err(|e| Error::Git(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            return Err(Error::Git(format!(
                "{} is not inside a git repository",
                path.display()
            )));
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self {
            path: PathBuf::from(root),
        })
    }

    /// Root of the working tree
    pub fn workdir(&self) -> &Path {
        &self.path
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C");
        cmd
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(args = %args.join(" "), "running git");
        self.command(args)
            .output()
            .map_err(|e| Error::Git(format!("failed to run git: {e}")))
    }

    /// Run git and return stdout, classifying failures
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        Err(classify_failure(args, &output))
    }

    /// Run git and return trimmed stdout
    fn run_trimmed(&self, args: &[&str]) -> Result<String> {
        Ok(self.run(args)?.trim().to_string())
    }

    /// Run git with stdin and extra environment
    fn run_with_input(&self, args: &[&str], input: &str, env: &[(&str, &str)]) -> Result<String> {
        debug!(args = %args.join(" "), "running git");
        let mut cmd = self.command(args);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Git(format!("failed to run git: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .map_err(|e| Error::Git(format!("failed to write to git: {e}")))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| Error::Git(format!("failed to run git: {e}")))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(classify_failure(args, &output))
        }
    }

    fn status_ok(&self, args: &[&str]) -> Result<bool> {
        Ok(self.output(args)?.status.success())
    }

    fn author(&self, commit: &str) -> Result<Author> {
        let raw = self.run(&["show", "-s", "--format=%an%x00%ae%x00%aI", commit])?;
        let mut parts = raw.trim_end_matches('\n').splitn(3, '\0');
        let mut next = || parts.next().unwrap_or_default().to_string();
        Ok(Author {
            name: next(),
            email: next(),
            date: next(),
        })
    }

    fn update_branch_ref(&self, branch: &str, commit: &str) -> Result<()> {
        let full_ref = format!("refs/heads/{branch}");
        self.run(&["update-ref", &full_ref, commit])?;
        Ok(())
    }

    /// Copy `commit` onto `onto` without touching the working tree
    fn cherry_pick_onto(&self, onto: &str, commit: &str, parent: &str) -> Result<String> {
        let merge_base = format!("--merge-base={parent}");
        let output = self.output(&["merge-tree", "--write-tree", &merge_base, onto, commit])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        match output.status.code() {
            Some(0) => {}
            Some(1) => {
                return Err(Error::GitConflict(format!(
                    "cherry-picking {} onto {onto} conflicts",
                    short(commit)
                )));
            }
            _ => {
                return Err(classify_failure(&["merge-tree"], &output));
            }
        }
        let tree = stdout.lines().next().unwrap_or_default().trim().to_string();
        if tree.is_empty() {
            return Err(Error::Git("git merge-tree produced no tree".to_string()));
        }

        let message = self.commit_message(commit)?;
        let author = self.author(commit)?;
        self.run_with_input(
            &["commit-tree", &tree, "-p", onto, "-F", "-"],
            &message,
            &[
                ("GIT_AUTHOR_NAME", author.name.as_str()),
                ("GIT_AUTHOR_EMAIL", author.email.as_str()),
                ("GIT_AUTHOR_DATE", author.date.as_str()),
            ],
        )
    }

    fn rebase_in_progress(&self) -> Result<bool> {
        for dir in ["rebase-merge", "rebase-apply"] {
            let path = self.run_trimmed(&["rev-parse", "--git-path", dir])?;
            if self.path.join(path).exists() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn short(commit: &str) -> &str {
    &commit[..commit.len().min(7)]
}

/// Map a failed git invocation onto the error taxonomy
fn classify_failure(args: &[&str], output: &Output) -> Error {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = format!("{}\n{}", stderr.trim(), stdout.trim());
    let message = format!("git {} failed: {}", args.join(" "), text.trim());
    classify_message(&text, message)
}

fn classify_message(text: &str, message: String) -> Error {
    const CONFLICT: &[&str] = &["CONFLICT", "could not apply", "Resolve all conflicts"];
    const REMOTE: &[&str] = &[
        "[rejected]",
        "rejected",
        "non-fast-forward",
        "Could not read from remote",
        "Permission denied",
        "unable to access",
        "Authentication failed",
        "Could not resolve host",
        "failed to push",
        "does not appear to be a git repository",
    ];
    const NOT_FOUND: &[&str] = &[
        "unknown revision",
        "Needed a single revision",
        "not a valid",
        "bad revision",
        "couldn't find remote ref",
        "remote ref does not exist",
        "not found",
        "does not exist",
    ];

    if CONFLICT.iter().any(|p| text.contains(p)) {
        Error::GitConflict(message)
    } else if NOT_FOUND.iter().any(|p| text.contains(p)) {
        Error::GitNotFound(message)
    } else if REMOTE.iter().any(|p| text.contains(p)) {
        Error::GitRemote(message)
    } else {
        Error::Git(message)
    }
}

impl GitOps for GitRepo {
    fn current_branch(&self) -> Result<String> {
        self.run_trimmed(&["symbolic-ref", "--short", "HEAD"])
            .map_err(|_| Error::Git("HEAD is detached; check out a branch first".to_string()))
    }

    fn head_commit(&self) -> Result<String> {
        self.resolve_commit("HEAD")
    }

    fn resolve_commit(&self, rev: &str) -> Result<String> {
        let spec = format!("{rev}^{{commit}}");
        self.run_trimmed(&["rev-parse", "--verify", "--quiet", &spec])
            .map_err(|_| Error::GitNotFound(format!("unknown revision: {rev}")))
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        let base = self.run_trimmed(&["merge-base", a, b])?;
        if base.is_empty() {
            return Err(Error::GitNotFound(format!("no merge base between {a} and {b}")));
        }
        Ok(base)
    }

    fn rev_list(&self, base: &str, tip: &str) -> Result<Vec<String>> {
        let range = format!("{base}..{tip}");
        let out = self.run(&["rev-list", "--reverse", "--topo-order", &range])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    fn commit_message(&self, commit: &str) -> Result<String> {
        let raw = self.run(&["cat-file", "commit", commit])?;
        Ok(raw
            .split_once("\n\n")
            .map(|(_, message)| message.to_string())
            .unwrap_or_default())
    }

    fn commit_parents(&self, commit: &str) -> Result<Vec<String>> {
        let raw = self.run_trimmed(&["rev-list", "--parents", "-n", "1", commit])?;
        Ok(raw.split_whitespace().skip(1).map(ToString::to_string).collect())
    }

    fn is_clean(&self) -> Result<bool> {
        let out = self.run(&["status", "--porcelain", "--untracked-files=no"])?;
        Ok(out.trim().is_empty())
    }

    fn remotes(&self) -> Result<Vec<GitRemote>> {
        let out = self.run(&["remote", "-v"])?;
        let mut remotes: Vec<GitRemote> = Vec::new();
        for line in out.lines() {
            let mut parts = line.split_whitespace();
            let (Some(name), Some(url)) = (parts.next(), parts.next()) else {
                continue;
            };
            if !remotes.iter().any(|r| r.name == name) {
                remotes.push(GitRemote {
                    name: name.to_string(),
                    url: url.to_string(),
                });
            }
        }
        Ok(remotes)
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        let full_ref = format!("refs/heads/{name}");
        self.status_ok(&["show-ref", "--verify", "--quiet", &full_ref])
    }

    fn tracking_branches(&self, remote: &str, prefix: &str) -> Result<Vec<String>> {
        let namespace = format!("refs/remotes/{remote}/");
        let out = self.run(&["for-each-ref", "--format=%(refname)", &namespace])?;
        Ok(out
            .lines()
            .filter_map(|r| r.trim().strip_prefix(namespace.as_str()))
            .filter(|name| name.starts_with(prefix))
            .map(ToString::to_string)
            .collect())
    }

    fn remote_branches(&self, remote: &str, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("refs/heads/{prefix}*");
        let out = self.run(&["ls-remote", "--heads", remote, &pattern])?;
        Ok(out
            .lines()
            .filter_map(|line| line.split_once('\t'))
            .filter_map(|(_, r)| r.trim().strip_prefix("refs/heads/"))
            .filter(|name| name.starts_with(prefix))
            .map(ToString::to_string)
            .collect())
    }

    fn fetch(&self, remote: &str, refspec: &str) -> Result<()> {
        self.run(&["fetch", "--quiet", remote, refspec])?;
        Ok(())
    }

    fn rebase(&self, onto: &str) -> Result<()> {
        match self.run(&["rebase", onto]) {
            Ok(_) => Ok(()),
            // A rebase that stopped part-way is a conflict whatever git printed
            Err(Error::Git(message)) if self.rebase_in_progress().unwrap_or(false) => {
                Err(Error::GitConflict(message))
            }
            Err(e) => Err(e),
        }
    }

    fn abort_rebase(&self) -> Result<()> {
        if self.rebase_in_progress()? {
            self.run(&["rebase", "--abort"])?;
        }
        Ok(())
    }

    fn create_branch(&self, name: &str, from_ref: &str) -> Result<()> {
        let commit = self.resolve_commit(from_ref)?;
        self.update_branch_ref(name, &commit)
    }

    fn reset_to_commit(&self, branch: &str, commit: &str) -> Result<()> {
        let tip = self.resolve_commit(branch)?;
        let commit = self.resolve_commit(commit)?;
        let parents = self.commit_parents(&commit)?;
        let Some(parent) = parents.first() else {
            return Err(Error::Git(format!(
                "{} is a root commit and cannot be isolated",
                short(&commit)
            )));
        };

        if *parent == tip {
            debug!(branch, commit = short(&commit), "fast-forwarding temp branch");
            return self.update_branch_ref(branch, &commit);
        }

        debug!(branch, commit = short(&commit), "cherry-picking onto temp branch");
        let copied = self.cherry_pick_onto(&tip, &commit, parent)?;
        self.update_branch_ref(branch, &copied)
    }

    fn push(&self, remote: &str, branch: &str, force: bool) -> Result<()> {
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let mut args = vec!["push", "--quiet"];
        if force {
            args.push("--force");
        }
        args.push(remote);
        args.push(&refspec);
        match self.run(&args) {
            Ok(_) => Ok(()),
            Err(Error::Git(message)) => Err(Error::GitRemote(message)),
            Err(e) => Err(e),
        }
    }

    fn delete_branch(&self, remote: Option<&str>, name: &str) -> Result<()> {
        match remote {
            Some(remote) => {
                self.run(&["push", "--quiet", remote, "--delete", name])?;
            }
            None => {
                self.run(&["branch", "-D", name])?;
            }
        }
        Ok(())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", "--quiet", branch])?;
        Ok(())
    }

    fn hard_reset(&self, commit: &str) -> Result<()> {
        self.run(&["reset", "--quiet", "--hard", commit])?;
        Ok(())
    }
}
