//! # Sessions
//!
//! A [`Session`] is the registry of plugins one invocation works on, plus
//! the directories and scheduler the operations share. Plugins keep their
//! registration order; every batch operation and every hook batch follows it.
//!
//! ```rust,ignore
//! let mut session = Session::new(plugin_root, rollback_dir, scheduler);
//! session.add("user/repo", SpecOptions::default())?;
//! session.install().await?;
//! session.update(&[], UpdateOptions::default()).await?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use crate::checkout::{self, CheckoutReport, CheckoutRequest};
use crate::config::Manifest;
use crate::error::{Error, Result};
use crate::git;
use crate::hooks::{fire, fire_all, HookKind};
use crate::job::{clean_all, Job};
use crate::notify::{Level, Notifier};
use crate::phases::{self, UpdateOptions};
use crate::scheduler::Scheduler;
use crate::snapshot::{self, Snapshot};
use crate::spec::{normalize, CheckoutTarget, PluginSpec, SpecOptions};

/// Registered plugins and shared settings.
#[derive(Debug)]
pub struct Session {
    specs: Vec<PluginSpec>,
    plugin_root: PathBuf,
    rollback_dir: PathBuf,
    scheduler: Scheduler,
}

impl Session {
    pub fn new(plugin_root: PathBuf, rollback_dir: PathBuf, scheduler: Scheduler) -> Self {
        Self {
            specs: Vec::new(),
            plugin_root,
            rollback_dir,
            scheduler,
        }
    }

    /// Build a session from a manifest, registering every plugin in order.
    pub fn from_manifest(manifest: &Manifest, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let scheduler = Scheduler::new(manifest.settings.scheduler_settings(), notifier);
        let mut session = Self::new(
            manifest.settings.plugin_dir(),
            manifest.settings.rollback_dir(),
            scheduler,
        );
        for entry in &manifest.plugins {
            session.add(&entry.source, entry.options.clone())?;
        }
        Ok(session)
    }

    /// Normalize and register a plugin.
    ///
    /// The first registration of a name wins; later ones are ignored and the
    /// existing spec is returned.
    pub fn add(&mut self, source: &str, options: SpecOptions) -> Result<&PluginSpec> {
        let spec = normalize(source, options, &self.plugin_root)?;
        let index = match self.position(&spec.name) {
            Some(index) => {
                debug!("Plugin '{}' is already registered", spec.name);
                index
            }
            None => {
                self.specs.push(spec);
                self.specs.len() - 1
            }
        };
        Ok(&self.specs[index])
    }

    pub fn get(&self, name: &str) -> Option<&PluginSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    /// Registered plugins in registration order.
    pub fn specs(&self) -> &[PluginSpec] {
        &self.specs
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|spec| spec.name.as_str()).collect()
    }

    pub fn plugin_root(&self) -> &Path {
        &self.plugin_root
    }

    pub fn rollback_dir(&self) -> &Path {
        &self.rollback_dir
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|spec| spec.name == name)
    }

    fn require(&self, names: &[String]) -> Result<()> {
        match names.iter().find(|name| self.position(name).is_none()) {
            Some(name) => Err(Error::UnknownPlugin { name: name.clone() }),
            None => Ok(()),
        }
    }

    /// Clone every registered plugin whose directory does not exist yet.
    ///
    /// Fires `pre_create` for all of them, clones, checks out explicit
    /// targets, then fires `post_create` for those where both steps worked.
    /// Returns the names that were installed; failures land in
    /// `state.error`.
    pub async fn install(&mut self) -> Result<Vec<String>> {
        let missing: Vec<usize> = (0..self.specs.len())
            .filter(|&index| !self.specs[index].path.exists())
            .collect();
        if missing.is_empty() {
            return Ok(Vec::new());
        }
        fs::create_dir_all(&self.plugin_root)?;

        let notifier = self.scheduler.notifier();
        fire_all(
            missing.iter().map(|&index| &self.specs[index]),
            HookKind::PreCreate,
            notifier,
        );

        let mut jobs: Vec<Job> = missing
            .iter()
            .map(|&index| {
                let spec = &self.specs[index];
                let mut job =
                    Job::with_command(&self.plugin_root, git::clone(&spec.source, &spec.path));
                job.exit_message = Some(format!("Installed '{}'", spec.name));
                job
            })
            .collect();
        self.scheduler.run(&mut jobs).await;

        clean_all(&mut jobs);
        for (&index, job) in missing.iter().zip(jobs.iter_mut()) {
            job.working_dir = self.specs[index].path.clone();
            if let Some(CheckoutTarget::Ref(target)) = &self.specs[index].checkout {
                job.set_command(git::checkout(target));
            }
        }
        self.scheduler.run(&mut jobs).await;

        let mut installed = Vec::new();
        for (&index, job) in missing.iter().zip(&jobs) {
            let spec = &mut self.specs[index];
            if let Some(error) = &job.error {
                spec.state.error = Some(error.to_string());
                continue;
            }
            fire(spec, HookKind::PostCreate, notifier);
            installed.push(spec.name.clone());
        }
        info!("Installed {} of {} missing plugins", installed.len(), missing.len());
        Ok(installed)
    }

    /// Run the update pipeline on installed plugins.
    ///
    /// `names` restricts the run; empty means every plugin. Plugins that are
    /// not installed are reported and skipped.
    pub async fn update(&mut self, names: &[String], options: UpdateOptions) -> Result<()> {
        self.require(names)?;
        let mut selected: Vec<PluginSpec> = Vec::new();
        for spec in &self.specs {
            if !names.is_empty() && !names.contains(&spec.name) {
                continue;
            }
            if spec.is_installed() {
                selected.push(spec.clone());
            } else {
                self.scheduler.notify(
                    &format!("Plugin '{}' is not installed; skipping", spec.name),
                    Level::Warning,
                );
            }
        }

        phases::execute_update(&mut selected, &self.scheduler, options).await;
        self.merge_back(selected);
        Ok(())
    }

    /// Run the checkout stage for the last update, after confirmation.
    pub async fn apply_updates(&mut self) {
        phases::checkout::execute(&mut self.specs, &self.scheduler).await;
    }

    fn merge_back(&mut self, updated: Vec<PluginSpec>) {
        for spec in updated {
            if let Some(index) = self.position(&spec.name) {
                self.specs[index] = spec;
            }
        }
    }

    /// Current commit of every installed plugin.
    pub async fn snapshot(&self) -> Snapshot {
        snapshot::snapshot(&self.specs, &self.scheduler).await
    }

    /// Check out `request`. See [`checkout::apply_checkout`].
    pub async fn checkout(&mut self, request: CheckoutRequest) -> Result<CheckoutReport> {
        checkout::apply_checkout(&mut self.specs, request, &self.scheduler, &self.rollback_dir).await
    }

    /// Delete a plugin's directory and unregister it.
    pub fn remove(&mut self, name: &str) -> Result<PluginSpec> {
        let index = self.position(name).ok_or_else(|| Error::UnknownPlugin {
            name: name.to_string(),
        })?;
        let notifier = self.scheduler.notifier();

        fire(&self.specs[index], HookKind::PreDelete, notifier);
        let path = &self.specs[index].path;
        if path.exists() {
            fs::remove_dir_all(path)?;
        }
        let spec = self.specs.remove(index);
        fire(&spec, HookKind::PostDelete, notifier);
        info!("Removed '{}'", spec.name);
        Ok(spec)
    }

    /// Directories under the plugin root that belong to no registered plugin.
    pub fn clean_candidates(&self) -> Result<Vec<PathBuf>> {
        if !self.plugin_root.is_dir() {
            return Ok(Vec::new());
        }
        let mut candidates = Vec::new();
        for entry in fs::read_dir(&self.plugin_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if self.position(&name.to_string_lossy()).is_none() {
                candidates.push(entry.path());
            }
        }
        candidates.sort();
        Ok(candidates)
    }

    /// Delete every clean candidate. Returns what was deleted.
    pub fn clean(&self) -> Result<Vec<PathBuf>> {
        let candidates = self.clean_candidates()?;
        for path in &candidates {
            fs::remove_dir_all(path)?;
            debug!("Deleted {}", path.display());
        }
        Ok(candidates)
    }
}
