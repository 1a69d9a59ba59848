//! Temporary branch naming
//!
//! Names look like `<prefix><stem>-<counter>`. The stem is the current
//! branch, or a slug of the first commit title when landing straight from
//! the base branch. Counters continue from whatever the fork remote already
//! has, so re-runs never reuse a live name.

use crate::types::CommitRecord;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Longest slug produced from a commit title
pub const MAX_SLUG_LEN: usize = 50;

/// Slug used when a title has no usable characters
pub const FALLBACK_SLUG: &str = "auto-pr";

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Turn arbitrary text into a branch-name-safe slug
///
/// Lowercased, runs of non-alphanumerics collapsed to one `-`, trimmed and
/// truncated to [`MAX_SLUG_LEN`].
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    let collapsed = NON_ALNUM.replace_all(&lower, "-");
    let trimmed = collapsed.trim_matches('-');
    let truncated: String = trimmed.chars().take(MAX_SLUG_LEN).collect();
    let slug = truncated.trim_end_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Whether `branch` is the base branch (or a conventional trunk name)
pub fn is_base_branch(branch: &str, base: &str) -> bool {
    branch == base || matches!(branch, "main" | "master")
}

/// Stem shared by every temp branch of a run
pub fn branch_stem(current_branch: &str, base: &str, first_commit: &CommitRecord) -> String {
    if is_base_branch(current_branch, base) {
        slugify(&first_commit.title)
    } else {
        current_branch.to_string()
    }
}

/// `<prefix><stem>-<counter>`
pub fn branch_name(prefix: &str, stem: &str, counter: u32) -> String {
    format!("{prefix}{stem}-{counter}")
}

/// Hands out collision-free temp branch names for one run
#[derive(Debug, Clone)]
pub struct BranchNamer {
    prefix: String,
    stem: String,
    next: u32,
    taken: HashSet<String>,
}

impl BranchNamer {
    /// Create a namer; `existing` are the fork's branches under the prefix
    ///
    /// Only names shaped like this run's own seed the counter. Every name in
    /// `existing` is still treated as taken.
    pub fn new(prefix: &str, stem: &str, existing: &[String]) -> Self {
        let mut namer = Self {
            prefix: prefix.to_string(),
            stem: stem.to_string(),
            next: 1,
            taken: existing.iter().cloned().collect(),
        };
        let highest = existing
            .iter()
            .filter_map(|name| namer.run_counter(name))
            .max()
            .unwrap_or(0);
        namer.next = highest + 1;
        namer
    }

    /// Prefix every name of this run starts with, e.g. `dev/foo-`
    pub fn run_prefix(&self) -> String {
        format!("{}{}-", self.prefix, self.stem)
    }

    /// Whether `name` is `<prefix><stem>-N` or `<prefix><stem>-N-<commit id>`
    pub fn is_run_branch(&self, name: &str) -> bool {
        self.run_counter(name).is_some()
    }

    fn run_counter(&self, name: &str) -> Option<u32> {
        let rest = name.strip_prefix(self.run_prefix().as_str())?;
        let (counter, suffix) = match rest.split_once('-') {
            Some((counter, suffix)) => (counter, Some(suffix)),
            None => (rest, None),
        };
        if counter.is_empty() || !counter.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if let Some(id) = suffix {
            let is_short_id = (7..=12).contains(&id.len())
                && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
            if !is_short_id {
                return None;
            }
        }
        counter.parse().ok()
    }

    /// Counter the next claimed name will use
    pub const fn next_counter(&self) -> u32 {
        self.next
    }

    /// Name for `commit` at `counter`, without claiming it
    ///
    /// Deterministic for the same inputs and known refs. A name that is
    /// already taken gets the short commit id appended.
    pub fn name(&self, commit: &CommitRecord, counter: u32) -> String {
        self.name_avoiding(commit, counter, |_| false)
    }

    fn name_avoiding(
        &self,
        commit: &CommitRecord,
        counter: u32,
        is_taken: impl Fn(&str) -> bool,
    ) -> String {
        let taken = |name: &str| self.taken.contains(name) || is_taken(name);
        let base = branch_name(&self.prefix, &self.stem, counter);
        if !taken(&base) {
            return base;
        }
        let short = format!("{base}-{}", commit.short_id());
        if !taken(&short) {
            return short;
        }
        format!("{base}-{}", &commit.id[..commit.id.len().min(12)])
    }

    /// Claim the next name for `commit` and advance the counter
    ///
    /// `is_taken` reports refs the namer cannot know about (e.g. local
    /// branches).
    pub fn claim(&mut self, commit: &CommitRecord, is_taken: impl Fn(&str) -> bool) -> String {
        let name = self.name_avoiding(commit, self.next, is_taken);
        self.taken.insert(name.clone());
        self.next += 1;
        name
    }
}
