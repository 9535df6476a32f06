//! Integration tests for rustcargo

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Key for toolchain 1.75.0/abc123, no lockfile, release profile
    const NO_LOCKFILE_DIGEST: &str = "d07ec96639e643499c8944840faaaeb02d0ed09f";

    const INHERITED_ENV: &[&str] = &[
        "RUSTCARGO_CONFIG",
        "RUSTCARGO_CACHE",
        "RUSTCARGO_CACHE_TARGET",
        "RUSTCARGO_TARGET_DIRS",
        "RUSTCARGO_JOB_ID",
        "RUSTCARGO_CACHE_BASE",
        "RUSTCARGO_STATE_FILE",
        "RUSTCARGO_CACHE_COMMAND",
        "GITHUB_BASE_REF",
        "GITHUB_WORKSPACE",
        "GITHUB_OUTPUT",
        "GITHUB_RUN_ID",
        "GITHUB_RUN_ATTEMPT",
        "CARGO_HOME",
        "RUST_LOG",
    ];

    fn rustcargo() -> Command {
        let mut cmd = cargo_bin_cmd!("rustcargo");
        for var in INHERITED_ENV {
            cmd.env_remove(var);
        }
        cmd
    }

    struct Workspace {
        temp: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            fs::create_dir_all(temp.path().join("work")).unwrap();
            fs::write(
                temp.path().join("state.json"),
                r#"{"rust-hash":"abc123","rust-version":"1.75.0"}"#,
            )
            .unwrap();
            Self { temp }
        }

        fn root(&self) -> PathBuf {
            self.temp.path().join("work")
        }

        fn output_file(&self) -> PathBuf {
            self.temp.path().join("outputs")
        }

        fn touch(path: &Path) {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"x").unwrap();
        }

        /// Command with every input pinned to this workspace
        fn cmd(&self, subcommand: &str) -> Command {
            let mut cmd = rustcargo();
            cmd.current_dir(self.temp.path()).args([
                subcommand,
                "--workspace",
                self.root().to_str().unwrap(),
                "--cargo-home",
                self.temp.path().join("cargo").to_str().unwrap(),
                "--state-file",
                self.temp.path().join("state.json").to_str().unwrap(),
                "--target-profile",
                "release",
            ]);
            cmd
        }
    }

    #[test]
    fn help_displays() {
        rustcargo()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Rust build caching"));
    }

    #[test]
    fn version_displays() {
        rustcargo()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("rustcargo"));
    }

    #[test]
    fn key_is_deterministic() {
        let ws = Workspace::new();
        let expected = format!(
            "setup-rustcargo-v1-{}-{}\n",
            std::env::consts::OS,
            NO_LOCKFILE_DIGEST
        );

        ws.cmd("key").assert().success().stdout(expected.clone());
        ws.cmd("key").assert().success().stdout(expected);
    }

    #[test]
    fn key_tracks_lockfile_and_job() {
        let ws = Workspace::new();
        let plain = ws.cmd("key").output().unwrap().stdout;

        let with_job = ws.cmd("key").args(["--job-id", "matrix-2"]).output().unwrap().stdout;
        assert_ne!(plain, with_job);

        fs::write(ws.root().join("Cargo.lock"), "version = 3\n").unwrap();
        let with_lock = ws.cmd("key").output().unwrap().stdout;
        assert_ne!(plain, with_lock);
    }

    #[test]
    fn key_json_lists_prefixes_and_paths() {
        let ws = Workspace::new();
        ws.cmd("key")
            .args(["--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("restore_prefixes"))
            .stdout(predicate::str::contains("\"setup-rustcargo-v1\""))
            .stdout(predicate::str::contains("registry"));
    }

    #[test]
    fn empty_target_dirs_fail_with_hint() {
        let ws = Workspace::new();
        ws.cmd("key")
            .args(["--target-dirs", " , "])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn invalid_config_file_is_rejected() {
        let ws = Workspace::new();
        let config = ws.temp.path().join("rustcargo.toml");
        fs::write(&config, "[cache\nenabled = ").unwrap();

        ws.cmd("key")
            .args(["--config", config.to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("rustcargo.toml"));
    }

    #[test]
    fn config_file_supplies_defaults() {
        let ws = Workspace::new();
        fs::write(
            ws.temp.path().join("rustcargo.toml"),
            "[cache]\njob_id = \"from-config\"\n",
        )
        .unwrap();

        // Picked up from the working directory
        let from_file = ws.cmd("key").output().unwrap().stdout;
        let from_flag = ws
            .cmd("key")
            .args(["--job-id", "from-config"])
            .output()
            .unwrap()
            .stdout;
        assert_eq!(from_file, from_flag);
    }

    #[test]
    fn disabled_restore_emits_nothing() {
        let ws = Workspace::new();
        ws.cmd("restore")
            .args(["--cache", "false"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn save_without_paths_skips() {
        let ws = Workspace::new();
        ws.cmd("save")
            .args(["--cache-command", "rustcargo-helper-that-does-not-exist"])
            .assert()
            .success()
            .stderr(predicate::str::contains("nothing to save"));
    }

    #[cfg(unix)]
    #[test]
    fn restore_miss_writes_outputs() {
        let ws = Workspace::new();
        ws.cmd("restore")
            .args(["--cache-command", "true"])
            .arg("--output-file")
            .arg(ws.output_file())
            .assert()
            .success();

        let outputs = fs::read_to_string(ws.output_file()).unwrap();
        let key_line = format!("cache-key=setup-rustcargo-v1-{}-", std::env::consts::OS);
        assert!(outputs.contains(&key_line));
        assert!(outputs.contains("cache-hit=false"));
    }

    #[cfg(unix)]
    #[test]
    fn broken_helper_does_not_fail_save() {
        let ws = Workspace::new();
        Workspace::touch(&ws.root().join("target").join("release").join("incremental").join("s"));

        ws.cmd("save")
            .args(["--cache-command", "false"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Could not save cache"));

        assert!(!ws.root().join("target/release/incremental").exists());
    }

    #[test]
    fn identify_records_active_toolchain() {
        let ws = Workspace::new();
        fs::remove_file(ws.temp.path().join("state.json")).unwrap();

        // Empty channel queries whichever rustc is on PATH
        ws.cmd("identify")
            .arg("--toolchain=")
            .arg("--output-file")
            .arg(ws.output_file())
            .assert()
            .success();

        let outputs = fs::read_to_string(ws.output_file()).unwrap();
        assert!(outputs.contains("rust-version="));
        assert!(outputs.contains("rust-hash="));

        let state = fs::read_to_string(ws.temp.path().join("state.json")).unwrap();
        assert!(state.contains("rust-version"));
    }

    #[test]
    fn restore_with_toolchain_replaces_recorded_identity() {
        let ws = Workspace::new();
        let state_file = ws.temp.path().join("state.json");
        fs::write(
            &state_file,
            r#"{"rust-hash":"0000000","rust-version":"0.0.0-stale"}"#,
        )
        .unwrap();

        ws.cmd("restore")
            .args(["--toolchain=", "--cache", "false"])
            .arg("--output-file")
            .arg(ws.output_file())
            .assert()
            .success();

        let state = fs::read_to_string(&state_file).unwrap();
        assert!(state.contains("rust-version"));
        assert!(!state.contains("0.0.0-stale"));

        let outputs = fs::read_to_string(ws.output_file()).unwrap();
        assert!(outputs.contains("rust-version="));
        assert!(!outputs.contains("0.0.0-stale"));
    }

    #[test]
    fn prune_with_nothing_on_disk() {
        let ws = Workspace::new();
        ws.cmd("prune")
            .assert()
            .success()
            .stderr(predicate::str::contains("nothing to prune"));
    }
}
