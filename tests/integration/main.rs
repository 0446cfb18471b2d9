//! Integration tests for setup-vapoursynth

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated from the user's config and Actions inputs
    fn setup_vs(config_dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("setup-vapoursynth");
        cmd.env("SETUP_VS_CONFIG", config_dir.join("config.toml"))
            .env_remove("INPUT_VERSION")
            .env_remove("INPUT_CACHE")
            .env_remove("GITHUB_OUTPUT")
            .env_remove("GITHUB_PATH")
            .env_remove("GITHUB_ENV");
        cmd
    }

    fn write_config(dir: &Path) {
        let cache_dir = dir.join("cache");
        std::fs::write(
            dir.join("config.toml"),
            format!("[cache]\ndir = {:?}\n", cache_dir.display().to_string()),
        )
        .unwrap();
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        setup_vs(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Provision VapourSynth"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        setup_vs(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("setup-vapoursynth"));
    }

    #[test]
    fn versions_lists_catalog() {
        let temp = TempDir::new().unwrap();
        setup_vs(temp.path())
            .args(["versions", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("R72"));
    }

    #[test]
    fn versions_json_is_valid() {
        let temp = TempDir::new().unwrap();
        let output = setup_vs(temp.path())
            .args(["versions", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert!(rows
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r["name"] == "R72" && r["zimg_ref"] == "release-3.0.5"));
    }

    #[test]
    fn unknown_version_fails_before_doing_anything() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path());
        setup_vs(temp.path())
            .args(["install", "R1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown version R1"))
            .stderr(predicate::str::contains("setup-vapoursynth versions"));

        assert!(!temp.path().join("cache").exists());
    }

    #[test]
    fn cache_keys_most_specific_first() {
        let temp = TempDir::new().unwrap();
        let output = setup_vs(temp.path())
            .args(["cache", "keys", "R72"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        let keys: Vec<&str> = stdout.lines().collect();
        assert!(keys.len() >= 2);
        assert_eq!(keys.last(), Some(&"vapoursynth-R72-zimg-release-3.0.5"));
        assert!(keys.iter().all(|k| k.starts_with("vapoursynth-R72-zimg-release-3.0.5")));
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path());
        setup_vs(temp.path())
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn cache_clear_missing_key() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path());
        setup_vs(temp.path())
            .args(["cache", "clear", "vapoursynth-R1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entry"));
    }

    #[test]
    fn config_path_follows_flag() {
        let temp = TempDir::new().unwrap();
        setup_vs(temp.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let temp = TempDir::new().unwrap();
        setup_vs(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[build]"))
            .stdout(predicate::str::contains("sekrit-twc/zimg"));
    }

    #[test]
    fn config_init_writes_file() {
        let temp = TempDir::new().unwrap();
        setup_vs(temp.path())
            .args(["config", "init"])
            .assert()
            .success();
        assert!(temp.path().join("config.toml").exists());
    }

    #[test]
    fn invalid_config_reports_path() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[build]\njobs = \"many\"\n").unwrap();
        setup_vs(temp.path())
            .arg("versions")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }
}
