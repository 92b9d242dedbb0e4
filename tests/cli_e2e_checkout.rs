//! End-to-end tests for the `checkout`, `remove` and `clean` commands that
//! need no git repository.

#[allow(dead_code)]
mod common;
use common::prelude::*;

fn manifest(temp: &assert_fs::TempDir) -> assert_fs::fixture::ChildPath {
    let manifest = temp.child("plugsync.yaml");
    manifest
        .write_str(&format!(
            "settings:\n  plugin_dir: {}\n  rollback_dir: {}\nplugins:\n  - user/telescope\n  - user/lualine\n",
            temp.child("plugins").path().display(),
            temp.child("rollback").path().display()
        ))
        .unwrap();
    manifest
}

#[test]
fn test_checkout_unusable_snapshot_has_hints() {
    let temp = assert_fs::TempDir::new().unwrap();
    let manifest = manifest(&temp);
    let snapshot = temp.child("lock.json");
    snapshot.write_str("[\"not\", \"an\", \"object\"]").unwrap();

    cargo_bin_cmd!("plugsync")
        .arg("checkout")
        .arg(snapshot.path())
        .arg("--config")
        .arg(manifest.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot check out from"))
        .stderr(predicate::str::contains("expected a JSON object"))
        .stderr(predicate::str::contains("hint: Run 'plugsync snapshot"));
}

#[test]
fn test_checkout_rollback_without_snapshots() {
    let temp = assert_fs::TempDir::new().unwrap();
    let manifest = manifest(&temp);

    cargo_bin_cmd!("plugsync")
        .arg("checkout")
        .arg("--rollback")
        .arg("--config")
        .arg(manifest.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No rollback snapshots"));
}

#[test]
fn test_checkout_set_unknown_plugin_suggests_name() {
    let temp = assert_fs::TempDir::new().unwrap();
    let manifest = manifest(&temp);

    cargo_bin_cmd!("plugsync")
        .arg("checkout")
        .arg("--set")
        .arg("telescop=v1")
        .arg("--config")
        .arg(manifest.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown plugin: telescop"))
        .stderr(predicate::str::contains("Did you mean 'telescope'?"));
}

#[test]
fn test_remove_unknown_plugin() {
    let temp = assert_fs::TempDir::new().unwrap();
    let manifest = manifest(&temp);

    cargo_bin_cmd!("plugsync")
        .arg("remove")
        .arg("lualin")
        .arg("--config")
        .arg(manifest.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Did you mean 'lualine'?"));
}

#[test]
fn test_remove_deletes_plugin_directory() {
    let temp = assert_fs::TempDir::new().unwrap();
    let manifest = manifest(&temp);
    temp.child("plugins/lualine/.git").create_dir_all().unwrap();

    cargo_bin_cmd!("plugsync")
        .arg("remove")
        .arg("lualine")
        .arg("--config")
        .arg(manifest.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed lualine"));

    temp.child("plugins/lualine").assert(predicate::path::missing());
}

#[test]
fn test_clean_dry_run_lists_without_deleting() {
    let temp = assert_fs::TempDir::new().unwrap();
    let manifest = manifest(&temp);
    temp.child("plugins/telescope/.git").create_dir_all().unwrap();
    temp.child("plugins/stale").create_dir_all().unwrap();

    cargo_bin_cmd!("plugsync")
        .arg("clean")
        .arg("--dry-run")
        .arg("--config")
        .arg(manifest.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("stale"))
        .stdout(predicate::str::contains("telescope").not());

    temp.child("plugins/stale").assert(predicate::path::exists());
}

#[test]
fn test_clean_without_terminal_needs_force() {
    let temp = assert_fs::TempDir::new().unwrap();
    let manifest = manifest(&temp);
    temp.child("plugins/stale").create_dir_all().unwrap();

    cargo_bin_cmd!("plugsync")
        .arg("clean")
        .arg("--config")
        .arg(manifest.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("hint: Use --force"));

    temp.child("plugins/stale").assert(predicate::path::exists());

    cargo_bin_cmd!("plugsync")
        .arg("clean")
        .arg("--force")
        .arg("--config")
        .arg(manifest.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 directories"));

    temp.child("plugins/stale").assert(predicate::path::missing());
}

#[test]
fn test_clean_nothing_to_do() {
    let temp = assert_fs::TempDir::new().unwrap();
    let manifest = manifest(&temp);

    cargo_bin_cmd!("plugsync")
        .arg("clean")
        .arg("--config")
        .arg(manifest.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to clean"));
}
