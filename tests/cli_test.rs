use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FAKE_CMT: &str = r#"#!/bin/sh
if [ "$1" = "-quiet" ]; then
@TEMPNAME@
fi
printf '%s\n' "$@" > "@ARGS@"
if [ "$1" = "setup" ]; then
  echo 'FOO=bar; export FOO'
  echo 'unset BAZ'
  echo 'FOO_ROOT="${CMTROOT}/foo"; export FOO_ROOT'
else
  echo 'unsetenv FOO'
  echo 'unsetenv FOO_ROOT'
fi
exit @CODE@
"#;

/// A fake CMT installation whose `mgr/cmt` records its arguments
struct FakeCmt {
    root: TempDir,
    scratch: TempDir,
}

impl FakeCmt {
    fn new(temp_name_ok: bool, exit_code: i32) -> Self {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let temp_name = if temp_name_ok {
            format!("  echo \"{}/staged.$$\"\n  exit 0", scratch.path().display())
        } else {
            "  exit 1".to_string()
        };
        let script = FAKE_CMT
            .replace("@TEMPNAME@", &temp_name)
            .replace("@ARGS@", &root.path().join("args").display().to_string())
            .replace("@CODE@", &exit_code.to_string());

        let mgr = root.path().join("mgr");
        fs::create_dir_all(&mgr).unwrap();
        let program = mgr.join("cmt");
        fs::write(&program, script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();
        }

        Self { root, scratch }
    }

    fn root(&self) -> &Path {
        self.root.path()
    }

    fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.root.path().join("args"))
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    fn scratch_is_empty(&self) -> bool {
        fs::read_dir(self.scratch.path()).unwrap().next().is_none()
    }

    fn config_file(&self) -> PathBuf {
        let path = self.root.path().join("cmtenv.toml");
        fs::write(
            &path,
            format!(
                "[tool]\nscratch_dir = \"{}\"\n\n[package]\nname = \"Foo\"\nversion = \"v1r2\"\npath = \"/work/packages\"\n",
                self.scratch.path().display()
            ),
        )
        .unwrap();
        path
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("cmtenv").unwrap();
        cmd.current_dir(self.root.path())
            .env("XDG_CONFIG_HOME", self.root.path().join("xdg"))
            .env_remove("CMTENV_CONFIG")
            .env_remove("CMTROOT")
            .env_remove("RUST_LOG")
            .env("BAZ", "stale");
        cmd
    }
}

#[test]
fn test_help_output() {
    let mut cmd = Command::cargo_bin("cmtenv").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("CMT environment bootstrapper"));
}

#[test]
fn test_setup_help() {
    let mut cmd = Command::cargo_bin("cmtenv").unwrap();
    cmd.arg("setup")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("auto-detects from $SHELL"));
}

#[cfg(unix)]
#[test]
fn test_setup_prints_statements_and_forwards_args() {
    let cmt = FakeCmt::new(true, 0);
    let root = cmt.root().display().to_string();

    cmt.command()
        .args(["setup", "--shell", "sh", "--root", &root])
        .args(["--pack", "Foo", "--pack-version", "v1r2", "--path", "/work/packages"])
        .args(["--", "-tag=opt", "second"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "CMTROOT='{root}'; export CMTROOT"
        )))
        .stdout(predicate::str::contains("FOO='bar'; export FOO"))
        .stdout(predicate::str::contains("unset BAZ"))
        .stdout(predicate::str::contains(format!(
            "FOO_ROOT='{root}/foo'; export FOO_ROOT"
        )));

    assert_eq!(
        cmt.recorded_args(),
        vec![
            "setup",
            "-sh",
            "-pack=Foo",
            "-version=v1r2",
            "-path=/work/packages",
            "-no_cleanup",
            "-tag=opt",
            "second",
        ]
    );
    assert!(cmt.scratch_is_empty());
}

#[cfg(unix)]
#[test]
fn test_preset_cmtroot_wins_over_default() {
    let cmt = FakeCmt::new(true, 0);
    let root = cmt.root().display().to_string();

    cmt.command()
        .env("CMTROOT", &root)
        .args(["setup", "--shell", "sh", "--root", "/nonexistent/CMT"])
        .assert()
        .success()
        .stdout(predicate::str::contains("export CMTROOT").not())
        .stdout(predicate::str::contains(format!("FOO_ROOT='{root}/foo'")));
}

#[cfg(unix)]
#[test]
fn test_temp_name_failure_uses_scratch_fallback() {
    let cmt = FakeCmt::new(false, 0);
    let config = cmt.config_file();
    let root = cmt.root().display().to_string();

    cmt.command()
        .env("CMTROOT", &root)
        .arg("--config")
        .arg(&config)
        .args(["setup", "--shell", "sh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FOO='bar'; export FOO"));

    assert_eq!(cmt.recorded_args()[2], "-pack=Foo");
    assert!(cmt.scratch_is_empty());
}

#[cfg(unix)]
#[test]
fn test_cleanup_csh() {
    let cmt = FakeCmt::new(true, 0);
    let root = cmt.root().display().to_string();

    cmt.command()
        .env("CMTROOT", &root)
        .args(["cleanup", "--shell", "csh", "--pack", "Foo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unsetenv FOO;"))
        .stdout(predicate::str::contains("unsetenv FOO_ROOT;"));

    let args = cmt.recorded_args();
    assert_eq!(args[0], "cleanup");
    assert_eq!(args[1], "-csh");
    assert!(!args.contains(&"-no_cleanup".to_string()));
}

#[cfg(unix)]
#[test]
fn test_tool_failure_is_applied_by_default() {
    let cmt = FakeCmt::new(true, 2);
    let root = cmt.root().display().to_string();

    cmt.command()
        .env("CMTROOT", &root)
        .args(["setup", "--shell", "sh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FOO='bar'; export FOO"))
        .stderr(predicate::str::contains("exited with status 2"));

    assert!(cmt.scratch_is_empty());
}

#[cfg(unix)]
#[test]
fn test_tool_failure_with_strict() {
    let cmt = FakeCmt::new(true, 2);
    let root = cmt.root().display().to_string();

    cmt.command()
        .env("CMTROOT", &root)
        .args(["setup", "--shell", "sh", "--strict", "--pack", "Foo"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("failed for package 'Foo'"));

    assert!(cmt.scratch_is_empty());
}

#[test]
fn test_show_resolved_configuration() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("cmtenv.toml");
    fs::write(
        &config,
        "shell = \"csh\"\n[tool]\nroot = \"/opt/CMT/v1r20\"\n[package]\nname = \"Foo\"\n",
    )
    .unwrap();

    Command::cargo_bin("cmtenv")
        .unwrap()
        .current_dir(temp.path())
        .env_remove("CMTROOT")
        .env_remove("CMTENV_CONFIG")
        .args(["show", "--pack-version", "v3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# config file: cmtenv.toml"))
        .stdout(predicate::str::contains("/opt/CMT/v1r20 (default)"))
        .stdout(predicate::str::contains("package_name = \"Foo\""))
        .stdout(predicate::str::contains("package_version = \"v3\""))
        .stdout(predicate::str::contains("shell = \"csh\""));
}

#[test]
fn test_show_config_from_environment_variable() {
    let cwd = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let config = elsewhere.path().join("site.toml");
    fs::write(&config, "[package]\nname = \"Bar\"\n").unwrap();

    Command::cargo_bin("cmtenv")
        .unwrap()
        .current_dir(cwd.path())
        .env_remove("CMTROOT")
        .env("CMTENV_CONFIG", &config)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "# config file: {}",
            config.display()
        )))
        .stdout(predicate::str::contains("package_name = \"Bar\""));
}

#[test]
fn test_show_unknown_shell_fails() {
    let temp = TempDir::new().unwrap();

    Command::cargo_bin("cmtenv")
        .unwrap()
        .current_dir(temp.path())
        .env("XDG_CONFIG_HOME", temp.path())
        .env_remove("CMTENV_CONFIG")
        .args(["show", "--shell", "fish"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported shell 'fish'"));
}

#[test]
fn test_init_writes_config_once() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("cmtenv.toml");

    Command::cargo_bin("cmtenv")
        .unwrap()
        .current_dir(temp.path())
        .env("XDG_CONFIG_HOME", temp.path().join("xdg"))
        .env_remove("CMTENV_CONFIG")
        .args(["init", "--shell", "tcsh", "--root", "/opt/CMT", "--pack", "Foo"])
        .assert()
        .success();

    let contents = fs::read_to_string(&output).unwrap();
    assert!(contents.contains("shell = \"csh\""));
    assert!(contents.contains("root = \"/opt/CMT\""));
    assert!(contents.contains("name = \"Foo\""));

    Command::cargo_bin("cmtenv")
        .unwrap()
        .current_dir(temp.path())
        .env_remove("CMTENV_CONFIG")
        .args(["init", "--pack", "Bar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    Command::cargo_bin("cmtenv")
        .unwrap()
        .current_dir(temp.path())
        .env_remove("CMTENV_CONFIG")
        .args(["init", "--pack", "Bar", "--force"])
        .assert()
        .success();

    let contents = fs::read_to_string(&output).unwrap();
    assert!(contents.contains("name = \"Bar\""));
    assert!(contents.contains("root = \"/opt/CMT\""));
}

#[test]
fn test_script_generates_wrapper() {
    let temp = TempDir::new().unwrap();

    Command::cargo_bin("cmtenv")
        .unwrap()
        .current_dir(temp.path())
        .env("XDG_CONFIG_HOME", temp.path())
        .env_remove("CMTENV_CONFIG")
        .args(["script", "--mode", "cleanup", "--shell", "sh"])
        .args(["--root", "/opt/CMT", "--pack", "Foo", "--pack-version", "v1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# cleanup script for package Foo v1"))
        .stdout(predicate::str::contains("cleanup --shell sh --root '/opt/CMT'"))
        .stdout(predicate::str::contains("-- \"$@\")\""));
}
