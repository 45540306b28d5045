//! Bootstrap stage against on-disk fixtures.

mod common;

use std::fs;

use common::{FakeNetwork, FakeProbe, RecordingExecutor, ScriptedTerminal};
use tempfile::TempDir;
use wsl_oobe::bootstrap::{Step, parse_supported, resolve_locale};
use wsl_oobe::{Bootstrapper, FileEdit, OobeConfig};

fn config_in(dir: &TempDir) -> OobeConfig {
    let mut config = OobeConfig::default();
    config.paths.repos_conf_dir = dir.path().join("repos.conf");
    config.paths.machine_id = dir.path().join("machine-id");
    config.paths.locale_gen = dir.path().join("locale.gen");
    config.paths.locale_conf = dir.path().join("locale.conf");
    config.paths.supported_locales = dir.path().join("SUPPORTED");
    config.paths.systemd_runtime_dir = dir.path().join("no-systemd");
    config.repository.location = dir.path().join("gentoo");
    config
}

#[test]
fn stale_snapshot_is_replaced_by_git_registration() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    fs::create_dir_all(config.repository.location.join("sys-apps")).unwrap();
    fs::create_dir_all(&config.paths.repos_conf_dir).unwrap();
    let conf = config.paths.repos_conf_dir.join("gentoo.conf");
    fs::write(&conf, "[gentoo]\nsync-type = rsync\n").unwrap();

    let exec = RecordingExecutor::applying_edits();
    let mut term = ScriptedTerminal::new(["n"]);
    let report = Bootstrapper::new(&exec, &config).run(&mut term, &FakeProbe::healthy(), &FakeNetwork::up());

    assert!(report.repository_synced);
    assert!(!config.repository.location.exists());
    let written = fs::read_to_string(&conf).unwrap();
    assert!(written.contains("sync-type = git"));
    assert!(!written.contains("rsync"));

    let edits = exec.edits.borrow();
    assert!(matches!(edits[0], FileEdit::Remove { .. }));
    assert!(matches!(edits[1], FileEdit::RemoveTree { .. }));
    assert!(matches!(edits[2], FileEdit::Write { .. }));
}

#[test]
fn git_checkout_is_kept() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    fs::create_dir_all(config.repository.location.join(".git")).unwrap();

    let exec = RecordingExecutor::applying_edits();
    let mut term = ScriptedTerminal::new(["n"]);
    Bootstrapper::new(&exec, &config).run(&mut term, &FakeProbe::healthy(), &FakeNetwork::up());

    assert!(config.repository.location.join(".git").exists());
    assert!(!exec.edits.borrow().iter().any(|e| matches!(e, FileEdit::RemoveTree { .. })));
}

#[test]
fn keyring_failure_does_not_stop_sync() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let exec = RecordingExecutor::new();
    exec.fail("getuto");

    let mut term = ScriptedTerminal::new(["n"]);
    let report = Bootstrapper::new(&exec, &config).run(&mut term, &FakeProbe::healthy(), &FakeNetwork::up());

    assert_eq!(report.warnings_for(Step::Keyring).count(), 1);
    assert_eq!(exec.ran("emaint"), 1);
    assert!(report.repository_synced);
}

#[test]
fn missing_systemctl_skips_masking() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.paths.systemd_runtime_dir = dir.path().to_path_buf();
    let exec = RecordingExecutor::new();

    let mut term = ScriptedTerminal::new(["n"]);
    let report = Bootstrapper::new(&exec, &config).run(
        &mut term,
        &FakeProbe::without("systemctl"),
        &FakeNetwork::down(),
    );

    assert_eq!(exec.ran("systemctl"), 0);
    assert!(!report.restart_required);
}

#[test]
fn unreadable_locale_list_is_a_warning() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let exec = RecordingExecutor::new();

    let mut term = ScriptedTerminal::new(["y"]);
    let report = Bootstrapper::new(&exec, &config).run(&mut term, &FakeProbe::healthy(), &FakeNetwork::down());

    assert_eq!(report.warnings_for(Step::Locale).count(), 1);
    assert_eq!(exec.ran("locale-gen"), 0);
}

#[test]
fn closed_input_during_locale_setup_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let exec = RecordingExecutor::new();

    let mut term = ScriptedTerminal::default().then_eof();
    let report = Bootstrapper::new(&exec, &config).run(&mut term, &FakeProbe::healthy(), &FakeNetwork::down());

    assert_eq!(report.warnings_for(Step::Locale).count(), 1);
    assert_eq!(report.warnings_for(Step::Network).count(), 1);
}

#[test]
fn locale_generation_failure_skips_lang() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    fs::write(&config.paths.supported_locales, "en_US.UTF-8 UTF-8\n").unwrap();
    let exec = RecordingExecutor::applying_edits();
    exec.fail("locale-gen");

    let mut term = ScriptedTerminal::new(["y", "en_US", ""]);
    let report = Bootstrapper::new(&exec, &config).run(&mut term, &FakeProbe::healthy(), &FakeNetwork::down());

    assert_eq!(report.warnings_for(Step::Locale).count(), 1);
    assert!(config.paths.locale_gen.exists());
    assert!(!config.paths.locale_conf.exists());
}

#[test]
fn existing_lang_is_left_alone() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    fs::write(&config.paths.supported_locales, "en_US.UTF-8 UTF-8\n").unwrap();
    fs::write(&config.paths.locale_conf, "LANG=C.UTF-8\n").unwrap();
    let exec = RecordingExecutor::applying_edits();

    let mut term = ScriptedTerminal::new(["y", "en_US", ""]);
    Bootstrapper::new(&exec, &config).run(&mut term, &FakeProbe::healthy(), &FakeNetwork::down());

    assert_eq!(fs::read_to_string(&config.paths.locale_conf).unwrap(), "LANG=C.UTF-8\n");
}

#[test]
fn en_us_resolution_order() {
    let utf8_present = parse_supported("en_US ISO-8859-1\nen_US.UTF-8 UTF-8\n");
    assert_eq!(
        resolve_locale("en_US", &utf8_present).unwrap().gen_line(),
        "en_US.UTF-8 UTF-8"
    );

    let utf8_absent = parse_supported("en_GB.UTF-8 UTF-8\nen_US ISO-8859-1\n");
    assert_eq!(
        resolve_locale("en_US", &utf8_absent).unwrap().gen_line(),
        "en_US ISO-8859-1"
    );

    let none = parse_supported("de_DE.UTF-8 UTF-8\n");
    assert!(resolve_locale("en_US", &none).is_none());

    let mixed = parse_supported(
        "en_GB.UTF-8 UTF-8\nen_US ISO-8859-1\nen_US.UTF-8 UTF-8\nde_DE@euro ISO-8859-15\n",
    );
    for partial in ["e", "en", "en_U", "d", "de_D"] {
        assert!(
            resolve_locale(partial, &mixed).is_none(),
            "{partial:?} must not match a longer locale name"
        );
    }
    assert_eq!(
        resolve_locale("de_DE", &mixed).unwrap().gen_line(),
        "de_DE@euro ISO-8859-15"
    );
}
