//! Integration tests for the docker CLI engine.
//!
//! These require a running Docker daemon and pull `alpine:3.20`, so they are
//! marked `#[ignore]`.
//! Run with: `cargo test -- --ignored`

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use simulator::config::RunConfig;
use simulator::container::{RunError, Runner};
use simulator::docker::{
    AttachOptions, CancelToken, Connector, ContainerSpec, DockerConnector, Engine,
};

const IMAGE: &str = "alpine:3.20";

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A workspace with the directories the runner mounts, plus a fake home
/// holding an `.aws` directory.
fn setup_workspace() -> (tempfile::TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let base = dir.path().join("ws");
    let home = dir.path().join("user");
    for sub in ["home", "scenarios", "packer", "terraform"] {
        std::fs::create_dir_all(base.join(sub)).unwrap();
    }
    std::fs::create_dir_all(home.join(".aws")).unwrap();
    (dir, base, home)
}

fn runner(base: PathBuf, home: PathBuf, dev: bool) -> Runner<DockerConnector> {
    let config = RunConfig {
        base_dir: base,
        dev,
        image: IMAGE.into(),
        stop_timeout: Some(std::time::Duration::from_secs(1)),
    };
    Runner::new(config, DockerConnector::from_env())
        .with_env(vec!["SIMULATOR_TEST=1".into()])
        .with_home_resolver(move || Some(home.clone()))
}

fn cmd(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn container_exists(name_filter: &str) -> bool {
    let out = std::process::Command::new("docker")
        .args(["ps", "-aq", "--filter", name_filter])
        .output()
        .expect("failed to run docker ps");
    !String::from_utf8_lossy(&out.stdout).trim().is_empty()
}

#[test]
#[ignore]
fn run_streams_output_to_sink() {
    let (_dir, base, home) = setup_workspace();
    let out = SharedBuf::default();
    let sink = out.clone();

    runner(base, home, false)
        .with_output(move || sink.clone())
        .run(
            &CancelToken::new(),
            &cmd(&["sh", "-c", "echo out; echo err >&2; echo env=$SIMULATOR_TEST"]),
        )
        .expect("run failed");

    let text = String::from_utf8_lossy(&out.0.lock().unwrap()).to_string();
    assert!(text.contains("out"), "missing stdout: {text:?}");
    assert!(text.contains("err"), "missing stderr: {text:?}");
    assert!(text.contains("env=1"), "env not forwarded: {text:?}");
}

#[test]
#[ignore]
fn dev_mode_mounts_are_visible() {
    let (_dir, base, home) = setup_workspace();
    std::fs::write(base.join("scenarios").join("marker"), "scenario").unwrap();
    let out = SharedBuf::default();
    let sink = out.clone();

    runner(base, home, true)
        .with_output(move || sink.clone())
        .run(
            &CancelToken::new(),
            &cmd(&["cat", "/simulator/scenarios/marker"]),
        )
        .expect("run failed");

    let text = String::from_utf8_lossy(&out.0.lock().unwrap()).to_string();
    assert!(text.contains("scenario"));
}

#[test]
#[ignore]
fn missing_dev_directory_surfaces_as_create_failure() {
    let (_dir, base, home) = setup_workspace();
    std::fs::remove_dir_all(base.join("terraform")).unwrap();

    let result = runner(base, home, true).run(&CancelToken::new(), &cmd(&["true"]));
    assert!(matches!(result, Err(RunError::CreateFailed(_))), "{result:?}");
}

#[test]
#[ignore]
fn engine_lifecycle_removes_container() {
    let engine = DockerConnector::from_env().connect().expect("docker unavailable");
    let cancel = CancelToken::new();
    let spec = ContainerSpec {
        image: IMAGE.into(),
        env: vec![],
        cmd: vec!["sleep".into(), "30".into()],
        tty: true,
        attach_stdout: true,
        attach_stderr: true,
        mounts: vec![],
    };

    let id = engine.create(&spec, &cancel).expect("create failed");
    let filter = format!("id={id}");
    assert!(container_exists(&filter));

    let _stream = engine
        .attach(&id, AttachOptions::combined(), &cancel)
        .expect("attach failed");
    engine.start(&id, &cancel).expect("start failed");
    engine
        .stop(&id, Some(std::time::Duration::from_secs(1)), &cancel)
        .expect("stop failed");
    engine.remove(&id, &cancel).expect("remove failed");

    assert!(!container_exists(&filter));
}
