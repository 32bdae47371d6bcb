//! End-to-end discovery-pass tests over real package trees in tempdirs,
//! using an in-memory host collaborator.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;

use plugin_host::deploy::DEPLOY_PLACEHOLDER;
use plugin_host::{
    Error, ManagerConfig, ModuleHandle, ModuleHost, ModuleLoadFailure, PluginManager,
    RegisteredModule,
};
use plugin_manifest::MANIFEST_FILENAME;

/// Fake host registry: records registrations, derives entry-point names
/// from artifact stems, and can be told to fail a specific artifact.
struct RecordingHost {
    version: String,
    base_libraries: HashSet<String>,
    registered: Vec<PathBuf>,
    fail_on: Option<String>,
}

impl RecordingHost {
    fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            base_libraries: HashSet::new(),
            registered: Vec::new(),
            fail_on: None,
        }
    }

    fn with_base_library(mut self, logical_name: &str) -> Self {
        self.base_libraries.insert(logical_name.to_string());
        self
    }

    fn failing_on(mut self, file_name: &str) -> Self {
        self.fail_on = Some(file_name.to_string());
        self
    }

    fn registered_file_names(&self) -> Vec<String> {
        self.registered
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect()
    }
}

impl ModuleHost for RecordingHost {
    fn current_version(&self) -> String {
        self.version.clone()
    }

    fn register_module(
        &mut self,
        artifact: &Path,
    ) -> Result<RegisteredModule, ModuleLoadFailure> {
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_on.as_deref() == Some(file_name.as_str()) {
            return Err(ModuleLoadFailure::new("simulated loader fault"));
        }

        self.registered.push(artifact.to_path_buf());
        let stem = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(RegisteredModule {
            handle: ModuleHandle(self.registered.len() as u64),
            entry_point: Some(format!("EntryPoint.{stem}")),
        })
    }

    fn is_module_loaded(&self, logical_name: &str) -> bool {
        self.registered
            .iter()
            .any(|p| plugin_host::deploy::logical_name(p) == logical_name)
    }

    fn has_base_library(&self, logical_name: &str) -> bool {
        self.base_libraries.contains(logical_name)
    }
}

fn lib(stem: &str) -> String {
    format!("{stem}.{}", std::env::consts::DLL_EXTENSION)
}

fn write_package(packages_root: &Path, dir_name: &str, manifest: &str, artifacts: &[&str]) {
    let package_dir = packages_root.join(dir_name);
    fs::create_dir_all(&package_dir).unwrap();
    fs::write(package_dir.join(MANIFEST_FILENAME), manifest).unwrap();
    for artifact in artifacts {
        fs::write(package_dir.join(artifact), format!("bin:{artifact}")).unwrap();
    }
}

fn manager_in(dir: &tempfile::TempDir) -> (PluginManager, ManagerConfig) {
    let config = ManagerConfig::under_root(dir.path());
    fs::create_dir_all(&config.packages_root).unwrap();
    (PluginManager::new(config.clone()), config)
}

#[test]
fn accepted_list_is_ordered_by_display_order_with_stable_ties() {
    let dir = tempfile::TempDir::new().unwrap();
    let (manager, config) = manager_in(&dir);
    // Discovery order is directory-name order: alpha, bravo, charlie.
    write_package(
        &config.packages_root,
        "alpha",
        "system_name = \"Alpha\"\ndisplay_order = 10\n",
        &[],
    );
    write_package(
        &config.packages_root,
        "bravo",
        "system_name = \"Bravo\"\ndisplay_order = 10\n",
        &[],
    );
    write_package(
        &config.packages_root,
        "charlie",
        "system_name = \"Charlie\"\ndisplay_order = 5\n",
        &[],
    );

    let mut host = RecordingHost::new("2.00");
    manager.initialize(&mut host).unwrap();

    let snapshot = manager.snapshot();
    let names: Vec<&str> = snapshot.accepted.iter().map(|d| d.system_name()).collect();
    assert_eq!(names, vec!["Charlie", "Alpha", "Bravo"]);
}

#[test]
fn incompatible_package_is_routed_and_never_deployed() {
    let dir = tempfile::TempDir::new().unwrap();
    let (manager, config) = manager_in(&dir);
    let artifact = lib("legacy_widget");
    write_package(
        &config.packages_root,
        "legacy",
        &format!(
            "system_name = \"Legacy\"\nsupported_host_versions = [\"1.00\"]\nmain_artifact_file_name = \"{artifact}\"\n"
        ),
        &[&artifact],
    );

    let mut host = RecordingHost::new("2.00");
    manager.initialize(&mut host).unwrap();

    assert!(manager.accepted_packages().is_empty());
    assert_eq!(manager.incompatible_package_names(), vec!["Legacy"]);
    assert!(!config.deployment_dir.join(&artifact).exists());
    assert!(host.registered.is_empty());
}

#[test]
fn duplicate_system_name_aborts_and_keeps_previous_snapshot() {
    let dir = tempfile::TempDir::new().unwrap();
    let (manager, config) = manager_in(&dir);
    write_package(
        &config.packages_root,
        "first",
        "system_name = \"Widgets\"\nfriendly_name = \"First Widgets\"\n",
        &[],
    );

    let mut host = RecordingHost::new("2.00");
    manager.initialize(&mut host).unwrap();
    assert_eq!(manager.accepted_packages().len(), 1);

    write_package(
        &config.packages_root,
        "second",
        "system_name = \"Widgets\"\nfriendly_name = \"Second Widgets\"\nversion = \"2.0\"\n",
        &[],
    );
    let err = manager.initialize(&mut host).unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("Second Widgets"), "{msg}");
    assert!(msg.contains("duplicate system name"), "{msg}");
    // The prior snapshot stays published.
    assert_eq!(manager.accepted_packages().len(), 1);
    assert_eq!(
        manager.accepted_packages()[0].manifest.friendly_name,
        "First Widgets"
    );
}

#[test]
fn empty_system_name_fails_validation() {
    let dir = tempfile::TempDir::new().unwrap();
    let (manager, config) = manager_in(&dir);
    // An empty manifest parses into a degenerate descriptor that is
    // rejected once it reaches the accepted-processing stage.
    write_package(&config.packages_root, "anonymous", "", &[]);

    let mut host = RecordingHost::new("2.00");
    let err = manager.initialize(&mut host).unwrap_err();
    assert!(err.to_string().contains("missing system name"), "{err}");
    assert!(manager.accepted_packages().is_empty());
}

#[test]
fn malformed_manifest_aborts_pass_with_directory_context() {
    let dir = tempfile::TempDir::new().unwrap();
    let (manager, config) = manager_in(&dir);
    write_package(&config.packages_root, "broken", "system_name = [oops", &[]);

    let mut host = RecordingHost::new("2.00");
    let err = manager.initialize(&mut host).unwrap_err();
    assert!(matches!(err, Error::Package { .. }), "{err:?}");
    assert!(err.to_string().contains("broken"), "{err}");
}

#[test]
fn installed_flag_is_annotated_from_registry() {
    let dir = tempfile::TempDir::new().unwrap();
    let (manager, config) = manager_in(&dir);
    write_package(&config.packages_root, "a", "system_name = \"A\"\n", &[]);
    write_package(&config.packages_root, "b", "system_name = \"B\"\n", &[]);

    manager.mark_installed("A").unwrap();

    let mut host = RecordingHost::new("2.00");
    manager.initialize(&mut host).unwrap();

    let accepted = manager.accepted_packages();
    assert!(accepted.iter().find(|d| d.system_name() == "A").unwrap().installed);
    assert!(!accepted.iter().find(|d| d.system_name() == "B").unwrap().installed);
}

#[test]
fn deploys_main_and_auxiliary_and_binds_entry_point() {
    let dir = tempfile::TempDir::new().unwrap();
    let (manager, config) = manager_in(&dir);
    let main = lib("widgets_main");
    let helper = lib("widgets_helper");
    write_package(
        &config.packages_root,
        "widgets",
        &format!("system_name = \"Widgets\"\nmain_artifact_file_name = \"{main}\"\n"),
        &[&main, &helper],
    );

    let mut host = RecordingHost::new("2.00");
    manager.initialize(&mut host).unwrap();

    // Both artifacts shadow-copied; only the main one registered.
    assert!(config.deployment_dir.join(&main).exists());
    assert!(config.deployment_dir.join(&helper).exists());
    assert_eq!(host.registered_file_names(), vec![main.clone()]);

    let descriptor = manager
        .find_package_by_entry_point("EntryPoint.widgets_main")
        .unwrap();
    assert_eq!(descriptor.system_name(), "Widgets");
    assert!(descriptor.module.is_some());
    assert_eq!(
        descriptor.original_artifact_path,
        Some(config.packages_root.join("widgets").join(&main))
    );
}

#[test]
fn auxiliary_matching_base_library_is_skipped() {
    let dir = tempfile::TempDir::new().unwrap();
    let (manager, config) = manager_in(&dir);
    let main = lib("widgets_main");
    let shared = lib("common_shared");
    write_package(
        &config.packages_root,
        "widgets",
        &format!("system_name = \"Widgets\"\nmain_artifact_file_name = \"{main}\"\n"),
        &[&main, &shared],
    );

    let mut host = RecordingHost::new("2.00").with_base_library("common_shared");
    manager.initialize(&mut host).unwrap();

    assert!(config.deployment_dir.join(&main).exists());
    assert!(
        !config.deployment_dir.join(&shared).exists(),
        "shared dependency must not be double-deployed"
    );
}

#[test]
fn discovery_only_package_is_accepted_without_loading() {
    let dir = tempfile::TempDir::new().unwrap();
    let (manager, config) = manager_in(&dir);
    write_package(
        &config.packages_root,
        "docs",
        "system_name = \"Docs\"\nfriendly_name = \"Docs Pack\"\n",
        &[],
    );

    let mut host = RecordingHost::new("2.00");
    manager.initialize(&mut host).unwrap();

    let accepted = manager.accepted_packages();
    assert_eq!(accepted.len(), 1);
    assert!(accepted[0].module.is_none());
    assert!(accepted[0].entry_point.is_none());
    assert!(host.registered.is_empty());
}

#[test]
fn missing_declared_main_artifact_is_fatal() {
    let dir = tempfile::TempDir::new().unwrap();
    let (manager, config) = manager_in(&dir);
    write_package(
        &config.packages_root,
        "ghost",
        &format!(
            "system_name = \"Ghost\"\nfriendly_name = \"Ghost\"\nmain_artifact_file_name = \"{}\"\n",
            lib("ghost")
        ),
        &[],
    );

    let mut host = RecordingHost::new("2.00");
    let err = manager.initialize(&mut host).unwrap_err();
    assert!(err.to_string().contains("main artifact not found"), "{err}");
}

#[test]
fn failing_load_aborts_pass_without_rolling_back_earlier_registrations() {
    let dir = tempfile::TempDir::new().unwrap();
    let (manager, config) = manager_in(&dir);
    let good = lib("good_widget");
    let bad = lib("bad_widget");
    write_package(
        &config.packages_root,
        "good",
        &format!(
            "system_name = \"Good\"\ndisplay_order = 1\nmain_artifact_file_name = \"{good}\"\n"
        ),
        &[&good],
    );
    write_package(
        &config.packages_root,
        "bad",
        &format!(
            "system_name = \"Bad\"\nfriendly_name = \"Bad Widgets\"\nversion = \"0.9\"\ndisplay_order = 2\nmain_artifact_file_name = \"{bad}\"\n"
        ),
        &[&bad],
    );

    let mut host = RecordingHost::new("2.00").failing_on(&bad);
    let err = manager.initialize(&mut host).unwrap_err();

    // The failure carries the package context and the loader's causes.
    let msg = err.to_string();
    assert!(msg.contains("Bad Widgets 0.9"), "{msg}");
    assert!(msg.contains("simulated loader fault"), "{msg}");

    // Nothing published; the earlier registration is not rolled back.
    assert!(manager.accepted_packages().is_empty());
    assert_eq!(host.registered_file_names(), vec![good]);
}

#[test]
fn clear_deployment_dir_on_startup_keeps_placeholder() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = ManagerConfig::under_root(dir.path());
    config.clear_deployment_dir_on_startup = true;
    fs::create_dir_all(&config.packages_root).unwrap();
    fs::create_dir_all(&config.deployment_dir).unwrap();
    fs::write(config.deployment_dir.join(DEPLOY_PLACEHOLDER), "keep").unwrap();
    fs::write(config.deployment_dir.join(lib("stale")), "old").unwrap();

    let manager = PluginManager::new(config.clone());
    let mut host = RecordingHost::new("2.00");
    manager.initialize(&mut host).unwrap();

    assert!(config.deployment_dir.join(DEPLOY_PLACEHOLDER).exists());
    assert!(!config.deployment_dir.join(lib("stale")).exists());
}

#[test]
fn second_initialize_skips_unchanged_artifacts() {
    let dir = tempfile::TempDir::new().unwrap();
    let (manager, config) = manager_in(&dir);
    let main = lib("widgets_main");
    write_package(
        &config.packages_root,
        "widgets",
        &format!("system_name = \"Widgets\"\nmain_artifact_file_name = \"{main}\"\n"),
        &[&main],
    );

    let mut host = RecordingHost::new("2.00");
    manager.initialize(&mut host).unwrap();

    // Scribble on the deployed copy; an actual re-copy would undo this.
    let deployed = config.deployment_dir.join(&main);
    fs::write(&deployed, "sentinel").unwrap();

    manager.initialize(&mut host).unwrap();
    assert_eq!(fs::read_to_string(&deployed).unwrap(), "sentinel");
    assert_eq!(manager.accepted_packages().len(), 1);
}
