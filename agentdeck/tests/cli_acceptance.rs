use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("agentdeck");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("agentdeck"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute agentdeck: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "agentdeck {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn config_reports_defaults_without_config_file() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["config"]);
    assert_success(&["config"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("not found, using defaults"), "stdout:\n{stdout}");
    assert!(stdout.contains("http://localhost:8000"));
    assert!(stdout.contains("ws://localhost:8000/api/agents/ws"));
    assert!(stdout.contains("1000ms doubling to 30000ms"));

    assert!(
        env.xdg_state.join("agentdeck").exists(),
        "log directory should be created under XDG_STATE_HOME"
    );
}

#[test]
fn config_points_at_the_log_file_actually_written() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["config"]);
    assert_success(&["config"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let log_line = stdout
        .lines()
        .find(|line| line.starts_with("Log file:"))
        .unwrap_or_else(|| panic!("no log file line in:\n{stdout}"));
    let path = log_line
        .trim_start_matches("Log file:")
        .trim()
        .trim_end_matches("(rotated daily)")
        .trim();

    let path = PathBuf::from(path);
    assert!(path.starts_with(env.xdg_state.join("agentdeck")), "{}", path.display());
    assert!(path.exists(), "printed log file {} does not exist", path.display());
}

#[test]
fn config_file_and_server_flag_override_defaults() {
    let env = CliTestEnv::new();
    env.write_config(
        r#"
[server]
base_url = "https://dash.example.com/"

[stores]
max_thoughts = 42
"#,
    );

    let output = run_bin(&env, &["config"]);
    assert_success(&["config"], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("wss://dash.example.com/api/agents/ws"), "stdout:\n{stdout}");
    assert!(stdout.contains("42 thoughts"));

    let args = ["--server", "http://10.0.0.5:9000", "config"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ws://10.0.0.5:9000/api/agents/ws"), "stdout:\n{stdout}");
}

#[test]
fn invalid_config_is_rejected() {
    let env = CliTestEnv::new();
    env.write_config(
        r#"
[connection]
reconnect_base_ms = 60000
reconnect_max_ms = 1000
"#,
    );

    let output = run_bin(&env, &["config"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load configuration"), "stderr:\n{stderr}");
}

#[test]
fn send_to_unreachable_server_fails_with_context() {
    let env = CliTestEnv::new();
    env.write_config(
        r#"
[server]
base_url = "http://127.0.0.1:9"
timeout_secs = 2
max_retries = 0
"#,
    );

    let output = run_bin(&env, &["send", "worker-1", "hello", "there"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to send message to worker-1"), "stderr:\n{stderr}");
}

#[test]
fn help_lists_subcommands() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["--help"]);
    assert_success(&["--help"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["watch", "timeline", "send", "interrupt", "compact", "terminal", "config"] {
        assert!(stdout.contains(command), "missing {command} in:\n{stdout}");
    }
}
