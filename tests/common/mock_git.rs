//! In-memory git repository for orchestrator tests
//!
//! Models just enough of git to drive a landing run: a commit graph with
//! patch identities, local branches, remote repositories with
//! remote-tracking refs, and a rebase that drops commits whose patch is
//! already upstream (like `git rebase` skipping cherry-picks).

#![allow(dead_code)]

use land_stack::error::{Error, Result};
use land_stack::repo::GitOps;
use land_stack::types::GitRemote;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct Commit {
    parent: Option<String>,
    message: String,
    /// Identity of the change, shared by cherry-picks and squashes
    patch: String,
}

#[derive(Debug, Default)]
struct State {
    commits: HashMap<String, Commit>,
    next_id: u64,
    branches: HashMap<String, String>,
    head: String,
    /// remote name -> branch -> commit
    remotes: HashMap<String, HashMap<String, String>>,
    remote_urls: Vec<(String, String)>,
    /// (remote, branch) -> commit as of the last fetch
    tracking: HashMap<(String, String), String>,
    rebase_in_progress: bool,
    dirty: bool,
    rebase_calls: usize,
    push_calls: usize,
    conflict_on_rebase: Option<usize>,
    fail_push_on: Option<usize>,
    fail_fetch: Option<String>,
    /// Every mutating or network call, in order
    log: Vec<String>,
}

impl State {
    fn new_commit(&mut self, parent: Option<String>, message: &str, patch: &str) -> String {
        self.next_id += 1;
        let id = format!("{:07x}{}", self.next_id, "0".repeat(33));
        self.commits.insert(
            id.clone(),
            Commit {
                parent,
                message: message.to_string(),
                patch: patch.to_string(),
            },
        );
        id
    }

    fn resolve(&self, rev: &str) -> Result<String> {
        if rev == "HEAD" {
            return self
                .branches
                .get(&self.head)
                .cloned()
                .ok_or_else(|| Error::GitNotFound("HEAD".to_string()));
        }
        if self.commits.contains_key(rev) {
            return Ok(rev.to_string());
        }
        if let Some(id) = self.branches.get(rev) {
            return Ok(id.clone());
        }
        if let Some((remote, branch)) = rev.split_once('/')
            && let Some(id) = self.tracking.get(&(remote.to_string(), branch.to_string()))
        {
            return Ok(id.clone());
        }
        let mut matches = self.commits.keys().filter(|id| id.starts_with(rev));
        match (matches.next(), matches.next()) {
            (Some(id), None) if rev.len() >= 4 => Ok(id.clone()),
            _ => Err(Error::GitNotFound(format!("unknown revision {rev}"))),
        }
    }

    /// Commit ids from `id` back to the root
    fn ancestry(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = Some(id.to_string());
        while let Some(c) = current {
            current = self.commits.get(&c).and_then(|commit| commit.parent.clone());
            out.push(c);
        }
        out
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        let a_side: HashSet<String> = self.ancestry(a).into_iter().collect();
        self.ancestry(b)
            .into_iter()
            .find(|c| a_side.contains(c))
            .ok_or_else(|| Error::Git(format!("no merge base between {a} and {b}")))
    }

    /// `base..tip`, oldest first
    fn range(&self, base: &str, tip: &str) -> Vec<String> {
        let excluded: HashSet<String> = self.ancestry(base).into_iter().collect();
        let mut out: Vec<String> = self
            .ancestry(tip)
            .into_iter()
            .take_while(|c| !excluded.contains(c))
            .collect();
        out.reverse();
        out
    }

    fn patches_in(&self, tip: &str) -> HashSet<String> {
        self.ancestry(tip)
            .iter()
            .filter_map(|c| self.commits.get(c))
            .map(|c| c.patch.clone())
            .collect()
    }

    fn apply_on(&mut self, onto: &str, commit: &str) -> String {
        let original = self.commits[commit].clone();
        self.new_commit(Some(onto.to_string()), &original.message, &original.patch)
    }
}

/// In-memory [`GitOps`] implementation
pub struct MockGit {
    state: Mutex<State>,
    fork_remote: String,
    upstream_remote: String,
    base: String,
}

/// `title` or `title\n\nbody\n` as git would store it
pub fn message(title: &str, body: &str) -> String {
    if body.is_empty() {
        format!("{title}\n")
    } else {
        format!("{title}\n\n{body}\n")
    }
}

impl MockGit {
    /// Repository where `upstream` owns `main` and `origin` is the fork
    ///
    /// The checked-out branch `feature` carries `stack` (title, body) on
    /// top of the upstream base, and the tracking refs are current.
    pub fn with_stack(stack: &[(&str, &str)]) -> Self {
        Self::build("origin", "upstream", "feature", stack)
    }

    /// Same as [`with_stack`](Self::with_stack) with a custom branch name
    pub fn on_branch(branch: &str, stack: &[(&str, &str)]) -> Self {
        Self::build("origin", "upstream", branch, stack)
    }

    /// Repository whose only remote `origin` is both fork and upstream
    pub fn single_remote(stack: &[(&str, &str)]) -> Self {
        Self::build("origin", "origin", "feature", stack)
    }

    fn build(fork: &str, upstream: &str, branch: &str, stack: &[(&str, &str)]) -> Self {
        let mut state = State::default();
        let root = state.new_commit(None, "Initial commit\n", "root");

        let mut tip = root.clone();
        for (i, (title, body)) in stack.iter().enumerate() {
            tip = state.new_commit(Some(tip), &message(title, body), &format!("patch-{i}"));
        }

        state.branches.insert("main".to_string(), root.clone());
        state.branches.insert(branch.to_string(), tip);
        state.head = branch.to_string();

        state
            .remotes
            .entry(upstream.to_string())
            .or_default()
            .insert("main".to_string(), root.clone());
        state.remotes.entry(fork.to_string()).or_default();
        state
            .tracking
            .insert((upstream.to_string(), "main".to_string()), root);

        state.remote_urls.push((
            fork.to_string(),
            "https://github.com/alice/widgets.git".to_string(),
        ));
        if fork != upstream {
            state.remote_urls.push((
                upstream.to_string(),
                "https://github.com/acme/widgets.git".to_string(),
            ));
        }

        Self {
            state: Mutex::new(state),
            fork_remote: fork.to_string(),
            upstream_remote: upstream.to_string(),
            base: "main".to_string(),
        }
    }

    // === Scenario setup ===

    /// Leave uncommitted changes in the working tree
    pub fn set_dirty(&self) {
        self.state.lock().unwrap().dirty = true;
    }

    /// Make the nth `rebase` call (1-based) stop with a conflict
    pub fn conflict_on_rebase(&self, nth: usize) {
        self.state.lock().unwrap().conflict_on_rebase = Some(nth);
    }

    /// Make the nth `push` call (1-based) get rejected
    pub fn fail_push_on(&self, nth: usize) {
        self.state.lock().unwrap().fail_push_on = Some(nth);
    }

    /// Make every `fetch` fail
    pub fn fail_fetch(&self, msg: &str) {
        self.state.lock().unwrap().fail_fetch = Some(msg.to_string());
    }

    /// Put a branch on the fork remote, as left by an earlier run
    pub fn add_fork_branch(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        let root = state.resolve("main").unwrap();
        let fork = self.fork_remote.clone();
        state
            .remotes
            .entry(fork.clone())
            .or_default()
            .insert(name.to_string(), root.clone());
        state.tracking.insert((fork, name.to_string()), root);
    }

    /// Add a local branch
    pub fn add_local_branch(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        let root = state.resolve("main").unwrap();
        state.branches.insert(name.to_string(), root);
    }

    /// Someone else lands a commit on the upstream base
    pub fn push_upstream(&self, title: &str, patch: &str) {
        let mut state = self.state.lock().unwrap();
        let upstream = self.upstream_remote.clone();
        let tip = state.remotes[&upstream][&self.base].clone();
        let id = state.new_commit(Some(tip), &message(title, ""), patch);
        state
            .remotes
            .get_mut(&upstream)
            .unwrap()
            .insert(self.base.clone(), id);
    }

    /// Squash-merge the fork branch `head` into the upstream base
    ///
    /// The squash carries the branch tip's patch, so a later rebase of the
    /// stack drops the local copy. Hook this into the platform mock's merge.
    pub fn squash_merge(&self, head: &str, title: &str, body: &str) {
        let mut state = self.state.lock().unwrap();
        let fork = self.fork_remote.clone();
        let upstream = self.upstream_remote.clone();
        let head_commit = state.remotes[&fork][head].clone();
        let patch = state.commits[&head_commit].patch.clone();
        let tip = state.remotes[&upstream][&self.base].clone();
        let id = state.new_commit(Some(tip), &message(title, body), &patch);
        state
            .remotes
            .get_mut(&upstream)
            .unwrap()
            .insert(self.base.clone(), id);
    }

    // === Inspection ===

    /// Every mutating or network call, in order
    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    /// Tip of a local branch
    pub fn branch_tip(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().branches.get(name).cloned()
    }

    /// Local branch names
    pub fn local_branches(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().unwrap().branches.keys().cloned().collect();
        names.sort();
        names
    }

    /// Branch names on the fork remote
    pub fn fork_branches(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .remotes
            .get(&self.fork_remote)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default();
        names.retain(|n| !(self.fork_remote == self.upstream_remote && *n == self.base));
        names.sort();
        names
    }

    /// Messages on the upstream base after the initial commit, oldest first
    pub fn upstream_messages(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let tip = state.remotes[&self.upstream_remote][&self.base].clone();
        let mut messages: Vec<String> = state
            .ancestry(&tip)
            .iter()
            .map(|c| state.commits[c].message.clone())
            .collect();
        messages.reverse();
        messages.remove(0);
        messages
    }

    /// Whether a rebase was left in progress
    pub fn rebase_in_progress(&self) -> bool {
        self.state.lock().unwrap().rebase_in_progress
    }

    /// Message of the commit a fork branch points at
    pub fn fork_branch_message(&self, name: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let id = state.remotes.get(&self.fork_remote)?.get(name)?;
        Some(state.commits[id].message.clone())
    }

    fn logged(&self, entry: String) {
        self.state.lock().unwrap().log.push(entry);
    }
}

impl GitOps for MockGit {
    fn current_branch(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().head.clone())
    }

    fn head_commit(&self) -> Result<String> {
        self.state.lock().unwrap().resolve("HEAD")
    }

    fn resolve_commit(&self, rev: &str) -> Result<String> {
        self.state.lock().unwrap().resolve(rev)
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        let a = state.resolve(a)?;
        let b = state.resolve(b)?;
        state.merge_base(&a, &b)
    }

    fn rev_list(&self, base: &str, tip: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        let base = state.resolve(base)?;
        let tip = state.resolve(tip)?;
        Ok(state.range(&base, &tip))
    }

    fn commit_message(&self, commit: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        let id = state.resolve(commit)?;
        Ok(state.commits[&id].message.clone())
    }

    fn commit_parents(&self, commit: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        let id = state.resolve(commit)?;
        Ok(state.commits[&id].parent.iter().cloned().collect())
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(!self.state.lock().unwrap().dirty)
    }

    fn remotes(&self) -> Result<Vec<GitRemote>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .remote_urls
            .iter()
            .map(|(name, url)| GitRemote {
                name: name.clone(),
                url: url.clone(),
            })
            .collect())
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().branches.contains_key(name))
    }

    fn tracking_branches(&self, remote: &str, prefix: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .tracking
            .keys()
            .filter(|(r, b)| r == remote && b.starts_with(prefix))
            .map(|(_, b)| b.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn remote_branches(&self, remote: &str, prefix: &str) -> Result<Vec<String>> {
        self.logged(format!("ls-remote {remote} {prefix}"));
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .remotes
            .get(remote)
            .ok_or_else(|| Error::RemoteNotFound(remote.to_string()))?
            .keys()
            .filter(|b| b.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    fn fetch(&self, remote: &str, refspec: &str) -> Result<()> {
        self.logged(format!("fetch {remote} {refspec}"));
        let mut state = self.state.lock().unwrap();
        if let Some(ref msg) = state.fail_fetch {
            return Err(Error::GitRemote(msg.clone()));
        }
        let id = state
            .remotes
            .get(remote)
            .and_then(|branches| branches.get(refspec))
            .cloned()
            .ok_or_else(|| Error::GitNotFound(format!("couldn't find remote ref {refspec}")))?;
        state
            .tracking
            .insert((remote.to_string(), refspec.to_string()), id);
        Ok(())
    }

    fn rebase(&self, onto: &str) -> Result<()> {
        self.logged(format!("rebase {onto}"));
        let mut state = self.state.lock().unwrap();
        state.rebase_calls += 1;
        if state.conflict_on_rebase == Some(state.rebase_calls) {
            state.rebase_in_progress = true;
            return Err(Error::GitConflict(
                "CONFLICT (content): Merge conflict in src/lib.rs".to_string(),
            ));
        }

        let onto_id = state.resolve(onto)?;
        let head_id = state.resolve("HEAD")?;
        let base = state.merge_base(&head_id, &onto_id)?;
        if base == onto_id {
            // Already up to date
            return Ok(());
        }
        let landed = state.patches_in(&onto_id);

        let mut tip = onto_id;
        for commit in state.range(&base, &head_id) {
            if landed.contains(&state.commits[&commit].patch) {
                continue;
            }
            tip = state.apply_on(&tip, &commit);
        }
        let head = state.head.clone();
        state.branches.insert(head, tip);
        Ok(())
    }

    fn abort_rebase(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.rebase_in_progress {
            state.log.push("rebase --abort".to_string());
            state.rebase_in_progress = false;
        }
        Ok(())
    }

    fn create_branch(&self, name: &str, from_ref: &str) -> Result<()> {
        self.logged(format!("branch {name} {from_ref}"));
        let mut state = self.state.lock().unwrap();
        let id = state.resolve(from_ref)?;
        state.branches.insert(name.to_string(), id);
        Ok(())
    }

    fn reset_to_commit(&self, branch: &str, commit: &str) -> Result<()> {
        self.logged(format!("reset-to-commit {branch} {commit}"));
        let mut state = self.state.lock().unwrap();
        let tip = state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| Error::GitNotFound(branch.to_string()))?;
        let commit = state.resolve(commit)?;
        let id = if state.commits[&commit].parent.as_deref() == Some(tip.as_str()) {
            commit
        } else {
            state.apply_on(&tip, &commit)
        };
        state.branches.insert(branch.to_string(), id);
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str, force: bool) -> Result<()> {
        self.logged(format!("push {remote} {branch} force={force}"));
        let mut state = self.state.lock().unwrap();
        state.push_calls += 1;
        if state.fail_push_on == Some(state.push_calls) {
            return Err(Error::GitRemote(format!(
                "! [remote rejected] {branch} -> {branch} (pre-receive hook declined)"
            )));
        }

        let id = state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| Error::GitNotFound(branch.to_string()))?;
        let existing = state
            .remotes
            .get(remote)
            .ok_or_else(|| Error::RemoteNotFound(remote.to_string()))?
            .get(branch)
            .cloned();
        if let Some(existing) = existing
            && !force
            && !state.ancestry(&id).contains(&existing)
        {
            return Err(Error::GitRemote(format!(
                "! [rejected] {branch} -> {branch} (non-fast-forward)"
            )));
        }

        state
            .remotes
            .get_mut(remote)
            .unwrap()
            .insert(branch.to_string(), id.clone());
        state
            .tracking
            .insert((remote.to_string(), branch.to_string()), id);
        Ok(())
    }

    fn delete_branch(&self, remote: Option<&str>, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match remote {
            Some(remote) => {
                state.log.push(format!("push {remote} --delete {name}"));
                state
                    .remotes
                    .get_mut(remote)
                    .and_then(|branches| branches.remove(name))
                    .ok_or_else(|| Error::GitNotFound(format!("remote ref {name}")))?;
                state.tracking.remove(&(remote.to_string(), name.to_string()));
            }
            None => {
                state.log.push(format!("branch -D {name}"));
                if state.head == name {
                    return Err(Error::Git(format!(
                        "cannot delete branch '{name}' checked out"
                    )));
                }
                state
                    .branches
                    .remove(name)
                    .ok_or_else(|| Error::GitNotFound(format!("branch '{name}'")))?;
            }
        }
        Ok(())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.logged(format!("checkout {branch}"));
        let mut state = self.state.lock().unwrap();
        if !state.branches.contains_key(branch) {
            return Err(Error::GitNotFound(branch.to_string()));
        }
        state.head = branch.to_string();
        Ok(())
    }

    fn hard_reset(&self, commit: &str) -> Result<()> {
        self.logged(format!("reset --hard {commit}"));
        let mut state = self.state.lock().unwrap();
        let id = state.resolve(commit)?;
        let head = state.head.clone();
        state.branches.insert(head, id);
        Ok(())
    }
}
