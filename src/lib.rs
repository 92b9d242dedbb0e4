//! # plugsync Library
//!
//! This library provides the update engine of a plugin manager: it keeps a
//! directory of git checkouts in sync with a list of declared plugins. It is
//! designed to be used by the `plugsync` command-line tool but can also be
//! embedded in editors or other tools that manage git-based plugins.
//!
//! ## Quick Example
//!
//! ```
//! use plugsync::config;
//! use plugsync::spec::{normalize, SpecOptions};
//! use std::path::Path;
//!
//! // Normalize a plugin declaration
//! let spec = normalize("user/repo", SpecOptions::default(), Path::new("/plugins")).unwrap();
//! assert_eq!(spec.source, "https://github.com/user/repo");
//! assert_eq!(spec.name, "repo");
//!
//! // Parse a manifest
//! let manifest = config::parse("plugins:\n  - user/repo\n  - source: ./local\n    name: local\n").unwrap();
//! assert_eq!(manifest.plugins.len(), 2);
//! ```
//!
//! ## Core Concepts
//!
//! - **Specs (`spec`)**: Normalized plugin declarations plus the state the
//!   update pipeline computes for each of them.
//! - **Jobs and the Scheduler (`job`, `scheduler`)**: One git command per
//!   plugin, run with bounded concurrency and a batch timeout. Failures are
//!   recorded on the job and make later stages skip that plugin.
//! - **Phases (`phases`)**: The five-stage update pipeline.
//! - **Snapshots and Checkout (`snapshot`, `checkout`)**: Recording and
//!   restoring the commit of every plugin, with an automatic rollback
//!   snapshot before each checkout.
//! - **Sessions (`session`)**: The registry of plugins one invocation works
//!   on, with install, update, checkout, remove and clean.
//!
//! ## Execution Flow
//!
//! An update runs these stages over every installed plugin:
//!
//! 1.  **Prepare**: Point the remote at the declared source.
//! 2.  **Preprocess**: Record HEAD, the default branch and the track branch.
//! 3.  **Download**: Fetch branches and tags.
//! 4.  **Process**: Resolve the checkout target and compute commit logs.
//! 5.  **Checkout**: Move plugins whose target commit differs from HEAD.
//!
//! Every stage is fail-soft per plugin: partial success is normal, and
//! callers inspect each spec's state afterwards.

pub mod checkout;
pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod hooks;
pub mod job;
pub mod notify;
pub mod output;
pub mod phases;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod spec;
pub mod suggestions;

#[cfg(test)]
mod spec_proptest;
