use sipsafe_core::Database;
use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("sipsafe/sipsafe.db")
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("sipsafe");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }
}

fn command(env: &CliTestEnv, args: &[&str]) -> Command {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("sipsafe"));

    let mut cmd = Command::new(bin_path);
    cmd.args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG");
    cmd
}

fn run(env: &CliTestEnv, args: &[&str]) -> Output {
    command(env, args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute sipsafe: {e}"))
}

fn spawn(env: &CliTestEnv, args: &[&str]) -> Child {
    command(env, args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("failed to spawn sipsafe: {e}"))
}

fn run_ok(env: &CliTestEnv, args: &[&str]) -> String {
    let output = run(env, args);
    if !output.status.success() {
        panic!(
            "sipsafe {} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn status_json(env: &CliTestEnv) -> serde_json::Value {
    let stdout = run_ok(env, &["status", "--json"]);
    serde_json::from_str(&stdout).expect("status --json should print JSON")
}

#[test]
fn presets_lists_every_quick_log_drink() {
    let env = CliTestEnv::new();
    let stdout = run_ok(&env, &["presets"]);
    for label in ["BEER", "WINE", "SHOT", "COCKTAIL", "SELTZER", "CIDER"] {
        assert!(stdout.contains(label), "missing {label} in:\n{stdout}");
    }
}

#[test]
fn session_persists_between_invocations() {
    let env = CliTestEnv::new();

    let stdout = run_ok(&env, &["start"]);
    assert!(stdout.contains("Session started"));

    run_ok(&env, &["log", "BEER"]);
    run_ok(&env, &["log", "wine"]);
    let third = run_ok(&env, &["log", "Margarita", "--spirit", "tequila", "--strength", "strong"]);
    assert!(
        third.contains("glass of water"),
        "third drink should nudge, got:\n{third}"
    );

    let status = status_json(&env);
    assert_eq!(status["drink_count"], 3);
    assert!(status["bac"].as_f64().unwrap() > 0.0);
    assert_eq!(status["drinks"][0]["label"], "Margarita");

    // Every logged drink also lands in the history table
    let db = Database::open(&env.db_path()).expect("failed to open db");
    db.migrate().expect("failed to migrate db");
    assert_eq!(db.count_drink_logs().unwrap(), 3);
    let logs = db.list_drink_logs(10, None).unwrap();
    assert!(logs.iter().all(|l| l.volume_ml.is_some() && l.abv_percent.is_some()));
}

#[test]
fn remove_by_prefix_and_reject_unknown() {
    let env = CliTestEnv::new();
    run_ok(&env, &["start"]);
    run_ok(&env, &["log", "SHOT"]);

    let status = status_json(&env);
    let id = status["drinks"][0]["id"].as_str().unwrap().to_string();

    let missing = run(&env, &["remove", "does-not-exist"]);
    assert!(!missing.status.success());

    run_ok(&env, &["remove", &id[..8]]);
    let status = status_json(&env);
    assert_eq!(status["drink_count"], 0);
    assert_eq!(status["zone"], "SOBER");
}

#[test]
fn end_resets_the_session() {
    let env = CliTestEnv::new();
    run_ok(&env, &["log", "COCKTAIL"]);
    let stdout = run_ok(&env, &["end"]);
    assert!(stdout.contains("Session ended"));
    assert_eq!(status_json(&env)["drink_count"], 0);
}

#[test]
fn log_rejects_invalid_amounts() {
    let env = CliTestEnv::new();
    assert!(!run(&env, &["log", "BEER", "--std", "0"]).status.success());
    assert!(!run(&env, &["log", "BEER", "--volume-ml", "-3"]).status.success());
    assert!(!run(&env, &["log", "BEER", "--std", "1", "--volume-ml", "300"])
        .status
        .success());
}

#[test]
fn photo_verification_requires_backend() {
    let env = CliTestEnv::new();
    let photo = env.home.join("drink.jpg");
    fs::write(&photo, b"not really a jpeg").unwrap();

    let output = run(&env, &["log", "BEER", "--photo", photo.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("backend"));
    assert_eq!(status_json(&env)["drink_count"], 0);
}

#[test]
fn analytics_computes_locally_without_backend() {
    let env = CliTestEnv::new();
    run_ok(&env, &["log", "BEER"]);
    run_ok(&env, &["log", "CIDER"]);

    let stdout = run_ok(&env, &["analytics", "--range", "1d", "--json"]);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["origin"], "local");
    assert_eq!(report["range"], "1d");
    assert_eq!(report["buckets"].as_array().unwrap().len(), 24);
    assert_eq!(report["totals"]["totalDrinks"], 2);

    let text = run_ok(&env, &["analytics"]);
    assert!(text.contains("Total drinks:"));

    assert!(!run(&env, &["analytics", "--range", "2w"]).status.success());
}

#[test]
fn alert_needs_contacts_and_prints_gateways_without_backend() {
    let env = CliTestEnv::new();
    assert!(!run(&env, &["alert"]).status.success());

    env.write_config(
        r#"
[profile]
weight_lbs = 180.0
sex = "male"

[[contacts]]
label = "Mom"
phone = "(555) 123-4567"
carrier = "verizon"
"#,
    );
    let stdout = run_ok(&env, &["alert"]);
    assert!(stdout.contains("5551234567@vtext.com"), "got:\n{stdout}");
    assert!(stdout.contains("SipSafe alert"));
}

#[cfg(unix)]
#[test]
fn watch_never_clobbers_drinks_logged_while_it_runs() {
    let env = CliTestEnv::new();
    run_ok(&env, &["start"]);

    let watcher = spawn(&env, &["watch", "--interval", "1"]);
    thread::sleep(Duration::from_millis(1500));

    // Default profile reaches DANGER on the fifth shot
    let outputs: Vec<String> = (0..6).map(|_| run_ok(&env, &["log", "SHOT"])).collect();
    let alerts = outputs.iter().filter(|out| out.contains("DANGER:")).count();
    assert_eq!(alerts, 1, "expected one emergency alert, got:\n{}", outputs.join("\n"));

    // Let the watcher pick up the new drinks before stopping it
    thread::sleep(Duration::from_millis(2500));
    let interrupted = Command::new("kill")
        .args(["-INT", &watcher.id().to_string()])
        .status()
        .expect("failed to send SIGINT");
    assert!(interrupted.success());

    let output = watcher.wait_with_output().expect("watch did not exit");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "watch failed:\n{stdout}");
    assert!(stdout.contains("6 drinks"), "watch never saw the new drinks:\n{stdout}");
    assert!(stdout.contains("Stopped watching"));

    let status = status_json(&env);
    assert_eq!(status["drink_count"], 6);
    assert_eq!(status["zone"], "DANGER");

    let db = Database::open(&env.db_path()).expect("failed to open db");
    db.migrate().expect("failed to migrate db");
    let state = db.load_session().unwrap().expect("session persisted");
    assert_eq!(state.drinks.len(), 6);
    assert!(state.auto_alert_sent);

    let seventh = run_ok(&env, &["log", "SHOT"]);
    assert!(!seventh.contains("DANGER:"), "alert fired twice:\n{seventh}");
}

#[test]
fn status_does_not_write_the_session() {
    let env = CliTestEnv::new();
    run_ok(&env, &["log", "BEER"]);

    let db = Database::open(&env.db_path()).expect("failed to open db");
    db.migrate().expect("failed to migrate db");
    let before = db.load_session().unwrap().expect("session persisted");

    thread::sleep(Duration::from_millis(1100));
    let text = run_ok(&env, &["status"]);
    assert!(text.contains("Logs:"));
    status_json(&env);

    assert_eq!(db.load_session().unwrap(), Some(before));
}
