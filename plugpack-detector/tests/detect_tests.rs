//! Tool probing and gate tests for `plugpack-detector`.
//!
//! Every test builds a private `PATH` out of `TempDir`s; the host `PATH` is
//! never consulted.

#![cfg(unix)]

use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use plugpack_core::{PlugpackConfig, ToolAvailability};
use plugpack_detector::{
    check_gate, find_executable, probe_tools_at, GateError, GateNotice,
};
use rstest::rstest;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_dir() -> TempDir {
    TempDir::new().expect("tempdir")
}

fn install_tool(dir: &Path, name: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(&path, "#!/bin/sh\nexit 0\n").expect("write tool");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
}

fn search_path(dirs: &[&Path]) -> OsString {
    std::env::join_paths(dirs).expect("join paths")
}

// ---------------------------------------------------------------------------
// Probing
// ---------------------------------------------------------------------------

#[test]
fn empty_project_and_path_finds_nothing() {
    let project = make_dir();
    let tools = probe_tools_at(project.path(), &OsString::new(), &PlugpackConfig::default());
    assert_eq!(tools, ToolAvailability::default());
}

#[test]
fn tools_on_path_are_found() {
    let project = make_dir();
    let bin = make_dir();
    for tool in ["grunt", "wp", "composer", "npm"] {
        install_tool(bin.path(), tool);
    }
    let tools = probe_tools_at(
        project.path(),
        &search_path(&[bin.path()]),
        &PlugpackConfig::default(),
    );
    assert_eq!(tools.task_runner, Some(bin.path().join("grunt")));
    assert_eq!(tools.translation_tool, Some(bin.path().join("wp")));
    assert_eq!(tools.php_dependency_manager, Some(bin.path().join("composer")));
    assert_eq!(tools.node_dependency_manager, Some(bin.path().join("npm")));
}

#[test]
fn project_local_task_runner_takes_priority() {
    let project = make_dir();
    let bin = make_dir();
    install_tool(bin.path(), "grunt");
    install_tool(&project.path().join("node_modules/.bin"), "grunt");

    let tools = probe_tools_at(
        project.path(),
        &search_path(&[bin.path()]),
        &PlugpackConfig::default(),
    );
    assert_eq!(
        tools.task_runner,
        Some(project.path().join("node_modules/.bin/grunt"))
    );
}

#[test]
fn non_executable_file_is_not_a_tool() {
    let bin = make_dir();
    fs::write(bin.path().join("wp"), "not executable").expect("write");
    assert!(find_executable("wp", &search_path(&[bin.path()])).is_none());
}

#[test]
fn directory_named_like_tool_is_not_a_tool() {
    let bin = make_dir();
    fs::create_dir_all(bin.path().join("composer")).expect("mkdir");
    assert!(find_executable("composer", &search_path(&[bin.path()])).is_none());
}

#[test]
fn archiver_plugin_and_manifests_are_detected() {
    let project = make_dir();
    fs::create_dir_all(project.path().join("node_modules/grunt-contrib-compress"))
        .expect("mkdir");
    fs::write(project.path().join("composer.json"), "{}").expect("write");
    fs::write(project.path().join("package.json"), "{}").expect("write");
    install_tool(project.path(), "bin/validate-build.sh");

    let tools = probe_tools_at(project.path(), &OsString::new(), &PlugpackConfig::default());
    assert!(tools.archiver_plugin);
    assert!(tools.needs_php_dependencies);
    assert!(tools.needs_node_dependencies);
    assert_eq!(
        tools.validation_script,
        Some(project.path().join("bin/validate-build.sh"))
    );
}

#[test]
fn configured_tool_names_are_honoured() {
    let project = make_dir();
    let bin = make_dir();
    install_tool(bin.path(), "gulp");
    let config = PlugpackConfig {
        task_runner: "gulp".to_string(),
        ..PlugpackConfig::default()
    };
    let tools = probe_tools_at(project.path(), &search_path(&[bin.path()]), &config);
    assert_eq!(tools.task_runner, Some(bin.path().join("gulp")));
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

#[test]
fn composer_manifest_without_composer_is_fatal() {
    let tools = ToolAvailability {
        needs_php_dependencies: true,
        ..ToolAvailability::default()
    };
    let err = check_gate(&tools, &PlugpackConfig::default()).unwrap_err();
    let GateError::MissingTool { tool, hint } = err;
    assert_eq!(tool, "composer");
    assert!(hint.contains("composer.json"));
}

#[test]
fn composer_missing_without_manifest_is_fine() {
    let tools = ToolAvailability::default();
    assert!(check_gate(&tools, &PlugpackConfig::default()).is_ok());
}

#[rstest]
#[case::translation(
    |t: &mut ToolAvailability| t.translation_tool = None,
    GateNotice::TranslationToolMissing { tool: "wp".into() }
)]
#[case::archiver(
    |t: &mut ToolAvailability| t.archiver_plugin = false,
    GateNotice::ArchiverPluginMissing { plugin: "grunt-contrib-compress".into() }
)]
#[case::runner(
    |t: &mut ToolAvailability| t.task_runner = None,
    GateNotice::TaskRunnerMissing { tool: "grunt".into() }
)]
#[case::npm(
    |t: &mut ToolAvailability| t.node_dependency_manager = None,
    GateNotice::NodeManagerMissing
)]
fn optional_tools_degrade_with_notice(
    #[case] remove: fn(&mut ToolAvailability),
    #[case] expected: GateNotice,
) {
    let mut tools = full_toolset();
    remove(&mut tools);
    let notices = check_gate(&tools, &PlugpackConfig::default()).expect("gate");
    assert_eq!(notices, vec![expected]);
}

#[test]
fn full_toolset_has_no_notices() {
    let notices = check_gate(&full_toolset(), &PlugpackConfig::default()).expect("gate");
    assert!(notices.is_empty());
}

#[test]
fn missing_validation_script_is_noted_only_when_configured() {
    let tools = ToolAvailability {
        validation_script: None,
        ..full_toolset()
    };
    let notices = check_gate(&tools, &PlugpackConfig::default()).expect("gate");
    assert_eq!(
        notices,
        vec![GateNotice::ValidationScriptMissing {
            path: PathBuf::from("bin/validate-build.sh")
        }]
    );

    let unconfigured = PlugpackConfig {
        validation_script: PathBuf::new(),
        ..PlugpackConfig::default()
    };
    assert!(check_gate(&tools, &unconfigured).expect("gate").is_empty());
}

#[test]
fn archiver_notice_is_informational() {
    let notice = GateNotice::ArchiverPluginMissing {
        plugin: "grunt-contrib-compress".into(),
    };
    assert!(!notice.is_warning());
    assert!(GateNotice::NodeManagerMissing.is_warning());
}

fn full_toolset() -> ToolAvailability {
    ToolAvailability {
        task_runner: Some("/bin/grunt".into()),
        archiver_plugin: true,
        translation_tool: Some("/bin/wp".into()),
        php_dependency_manager: Some("/bin/composer".into()),
        node_dependency_manager: Some("/bin/npm".into()),
        validation_script: Some("/project/bin/validate-build.sh".into()),
        needs_php_dependencies: true,
        needs_node_dependencies: true,
    }
}
