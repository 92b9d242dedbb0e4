//! Plugin lifecycle hooks.
//!
//! Each plugin may declare six hooks around creation, change (checkout) and
//! deletion. A hook is either a Rust callback or an argv command from the
//! manifest. Hooks run synchronously; a failing or panicking hook is
//! reported at warning level and never aborts the surrounding operation.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use log::debug;

use crate::error::Error;
use crate::notify::{Level, Notifier};
use crate::spec::PluginSpec;

type Callback = dyn Fn() -> std::result::Result<(), String> + Send + Sync;

/// One lifecycle hook.
#[derive(Clone)]
pub enum Hook {
    /// Zero-argument callback.
    Callback(Arc<Callback>),
    /// Program and arguments, run in the plugin directory.
    Command(Vec<String>),
}

impl Hook {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Hook::Callback(Arc::new(f))
    }

    /// Run the hook. Commands run in `working_dir`.
    pub fn invoke(&self, working_dir: &Path) -> std::result::Result<(), String> {
        match self {
            Hook::Callback(f) => match catch_unwind(AssertUnwindSafe(|| (**f)())) {
                Ok(result) => result,
                Err(payload) => Err(panic_message(payload.as_ref())),
            },
            Hook::Command(argv) => {
                let Some((program, args)) = argv.split_first() else {
                    return Ok(());
                };
                let output = Command::new(program)
                    .args(args)
                    .current_dir(working_dir)
                    .output()
                    .map_err(|e| e.to_string())?;
                if output.status.success() {
                    Ok(())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(format!("{} {}", output.status, stderr.trim()).trim().to_string())
                }
            }
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Callback(_) => f.write_str("Hook::Callback(..)"),
            Hook::Command(argv) => f.debug_tuple("Hook::Command").field(argv).finish(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Which lifecycle point a hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    PreCreate,
    PostCreate,
    PreChange,
    PostChange,
    PreDelete,
    PostDelete,
}

impl HookKind {
    pub const ALL: [HookKind; 6] = [
        HookKind::PreCreate,
        HookKind::PostCreate,
        HookKind::PreChange,
        HookKind::PostChange,
        HookKind::PreDelete,
        HookKind::PostDelete,
    ];

    /// Field name used in manifests and error messages.
    pub fn name(self) -> &'static str {
        match self {
            HookKind::PreCreate => "pre_create",
            HookKind::PostCreate => "post_create",
            HookKind::PreChange => "pre_change",
            HookKind::PostChange => "post_change",
            HookKind::PreDelete => "pre_delete",
            HookKind::PostDelete => "post_delete",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The six optional hooks of a plugin.
#[derive(Clone, Default)]
pub struct Hooks {
    pub pre_create: Option<Hook>,
    pub post_create: Option<Hook>,
    pub pre_change: Option<Hook>,
    pub post_change: Option<Hook>,
    pub pre_delete: Option<Hook>,
    pub post_delete: Option<Hook>,
}

impl Hooks {
    pub fn get(&self, kind: HookKind) -> Option<&Hook> {
        match kind {
            HookKind::PreCreate => self.pre_create.as_ref(),
            HookKind::PostCreate => self.post_create.as_ref(),
            HookKind::PreChange => self.pre_change.as_ref(),
            HookKind::PostChange => self.post_change.as_ref(),
            HookKind::PreDelete => self.pre_delete.as_ref(),
            HookKind::PostDelete => self.post_delete.as_ref(),
        }
    }

    pub fn set(&mut self, kind: HookKind, hook: Hook) {
        let slot = match kind {
            HookKind::PreCreate => &mut self.pre_create,
            HookKind::PostCreate => &mut self.post_create,
            HookKind::PreChange => &mut self.pre_change,
            HookKind::PostChange => &mut self.post_change,
            HookKind::PreDelete => &mut self.pre_delete,
            HookKind::PostDelete => &mut self.post_delete,
        };
        *slot = Some(hook);
    }

    pub fn with(mut self, kind: HookKind, hook: Hook) -> Self {
        self.set(kind, hook);
        self
    }

    pub fn is_empty(&self) -> bool {
        HookKind::ALL.iter().all(|k| self.get(*k).is_none())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let declared: Vec<_> = HookKind::ALL
            .iter()
            .filter(|k| self.get(**k).is_some())
            .map(|k| k.name())
            .collect();
        f.debug_tuple("Hooks").field(&declared).finish()
    }
}

/// Fire `kind` for `spec` if declared. Returns `false` when the hook failed.
///
/// Command hooks run in the plugin directory, or in its parent when the
/// directory does not exist (before creation, after deletion).
pub fn fire(spec: &PluginSpec, kind: HookKind, notifier: &dyn Notifier) -> bool {
    let Some(hook) = spec.hooks.get(kind) else {
        return true;
    };

    let working_dir = if spec.path.is_dir() {
        spec.path.as_path()
    } else {
        spec.path.parent().unwrap_or(spec.path.as_path())
    };

    debug!("Firing {} hook of '{}'", kind, spec.name);
    match hook.invoke(working_dir) {
        Ok(()) => true,
        Err(message) => {
            let error = Error::Hook {
                plugin: spec.name.clone(),
                hook: kind.name().to_string(),
                message,
            };
            notifier.notify(&error.to_string(), Level::Warning);
            false
        }
    }
}

/// Fire `kind` for every spec in order.
pub fn fire_all<'a, I>(specs: I, kind: HookKind, notifier: &dyn Notifier)
where
    I: IntoIterator<Item = &'a PluginSpec>,
{
    for spec in specs {
        fire(spec, kind, notifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::spec::{normalize, SpecOptions};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn spec_with(hooks: Hooks, root: &Path) -> PluginSpec {
        normalize(
            "user/repo",
            SpecOptions {
                hooks,
                ..Default::default()
            },
            root,
        )
        .unwrap()
    }

    #[test]
    fn test_hook_kind_names_round_trip() {
        for kind in HookKind::ALL {
            assert_eq!(HookKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(HookKind::from_name("post_update"), None);
    }

    #[test]
    fn test_hooks_get_set() {
        let mut hooks = Hooks::default();
        assert!(hooks.is_empty());
        hooks.set(HookKind::PostChange, Hook::new(|| Ok(())));
        assert!(!hooks.is_empty());
        assert!(hooks.get(HookKind::PostChange).is_some());
        assert!(hooks.get(HookKind::PreChange).is_none());
        assert_eq!(format!("{:?}", hooks), "Hooks([\"post_change\"])");
    }

    #[test]
    fn test_fire_runs_callback() {
        let temp = TempDir::new().unwrap();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let hooks = Hooks::default().with(
            HookKind::PreChange,
            Hook::new(move || {
                *counter.lock().unwrap() += 1;
                Ok(())
            }),
        );
        let spec = spec_with(hooks, temp.path());
        let notifier = RecordingNotifier::new();

        assert!(fire(&spec, HookKind::PreChange, &notifier));
        assert!(fire(&spec, HookKind::PostChange, &notifier));
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn test_failing_hook_is_reported_as_warning() {
        let temp = TempDir::new().unwrap();
        let hooks = Hooks::default().with(
            HookKind::PostChange,
            Hook::new(|| Err("build failed".to_string())),
        );
        let spec = spec_with(hooks, temp.path());
        let notifier = RecordingNotifier::new();

        assert!(!fire(&spec, HookKind::PostChange, &notifier));
        let warnings = notifier.at_level(Level::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("post_change"));
        assert!(warnings[0].contains("build failed"));
    }

    #[test]
    fn test_panicking_hook_is_caught() {
        let temp = TempDir::new().unwrap();
        let hooks = Hooks::default().with(HookKind::PreDelete, Hook::new(|| panic!("boom")));
        let spec = spec_with(hooks, temp.path());
        let notifier = RecordingNotifier::new();

        assert!(!fire(&spec, HookKind::PreDelete, &notifier));
        assert!(notifier.at_level(Level::Warning)[0].contains("boom"));
    }

    #[test]
    fn test_command_hook_runs_in_plugin_dir() {
        let temp = TempDir::new().unwrap();
        let hooks = Hooks::default().with(
            HookKind::PostCreate,
            Hook::Command(vec![
                "sh".to_string(),
                "-c".to_string(),
                "touch built.txt".to_string(),
            ]),
        );
        let spec = spec_with(hooks, temp.path());
        std::fs::create_dir_all(&spec.path).unwrap();
        let notifier = RecordingNotifier::new();

        assert!(fire(&spec, HookKind::PostCreate, &notifier));
        assert!(spec.path.join("built.txt").exists());
    }

    #[test]
    fn test_command_hook_failure_reports_status() {
        let temp = TempDir::new().unwrap();
        let hooks = Hooks::default().with(
            HookKind::PreCreate,
            Hook::Command(vec!["sh".to_string(), "-c".to_string(), "exit 4".to_string()]),
        );
        // Plugin directory does not exist yet, so the hook runs in the root
        let spec = spec_with(hooks, temp.path());
        let notifier = RecordingNotifier::new();

        assert!(!fire(&spec, HookKind::PreCreate, &notifier));
        assert!(notifier.at_level(Level::Warning)[0].contains("pre_create"));
    }
}
