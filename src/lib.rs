//! land-stack - Land a stack of commits as individual pull requests
//!
//! This library turns a linear stack of local commits into one pull request
//! per commit and merges them onto a protected base branch in order, keeping
//! every commit's title and message intact through the squash merge.
//!
//! # Architecture
//!
//! The orchestrator in [`land`] only reaches the outside world through two
//! traits:
//! - [`repo::GitOps`] for the local repository and its remotes
//! - [`platform::PlatformService`] for the hosting provider
//!
//! Both ship with real implementations (`git` CLI, GitHub) and dry-run
//! wrappers. Configuration is passed explicitly (no globals).

pub mod auth;
pub mod config;
pub mod error;
pub mod land;
pub mod naming;
pub mod platform;
pub mod repo;
pub mod stack;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
