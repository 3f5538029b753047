//! Run controller behaviour over in-process stub modules.

use std::time::Duration;

use charlie_core::parse_config;
use charlie_host::{RunError, RunEvent, RunPhase, SimRun};
use charlie_test_utils::{read_run_log, run_config, stub_host, wait_until, STUB_CONFIG};

const WAIT: Duration = Duration::from_secs(10);

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[test]
fn stub_config_parses_and_sync_steps_complete() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("stub");
    let instance = host.spawn().unwrap();

    let config = instance.config().unwrap().unwrap();
    assert_eq!(config, STUB_CONFIG);
    let map = parse_config(&config);
    assert_eq!(map.get("X").map(String::as_str), Some("1"));
    assert_eq!(map.get("Y").map(String::as_str), Some("2"));
    assert_eq!(map.len(), 2);

    let run = SimRun::new(instance, run_config(root.path())).unwrap();
    assert!(run.init(&config));
    assert!(run.update_sync(5));
    assert_eq!(run.iteration(), 5);
    assert!(!run.is_running());
    assert!(!run.is_started());
    assert!(run.end());

    let log = read_run_log(&run.log_dir().unwrap()).unwrap();
    assert!(log.contains("<iteration n=\"0\">X=1;Y=2 steps=0 delta=0</iteration>"));
    assert!(log.contains("<iteration n=\"5\">X=1;Y=2 steps=5 delta=20</iteration>"));
}

#[test]
fn failing_updates_are_logged_and_counted() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("failing");
    let run = SimRun::new(host.spawn().unwrap(), run_config(root.path())).unwrap();
    let events = run.subscribe();

    assert!(run.init(""));
    assert!(run.update_steps(10));
    assert_eq!(
        events.recv_timeout(WAIT).unwrap(),
        RunEvent::Updated { iteration: 10 }
    );
    assert!(wait_until(WAIT, || !run.is_running()));
    assert_eq!(run.iteration(), 10);
    assert!(run.end());

    let log = read_run_log(&run.log_dir().unwrap()).unwrap();
    assert_eq!(count(&log, "<error iteration="), 10);
    assert!(log.contains("<error iteration=\"1\">step 1 diverged\ncell 7 is not finite</error>"));
    // The init entry plus the one written after the segment.
    assert_eq!(count(&log, "<iteration n="), 2);
    assert!(log.contains("<iteration n=\"10\">attempts=10</iteration>"));
    assert!(!log.contains("protocol"));
}

#[test]
fn continuous_failures_are_logged_every_cycle() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("failing");
    let run = SimRun::new(host.spawn().unwrap(), run_config(root.path())).unwrap();
    let events = run.subscribe();

    assert!(run.init(""));
    assert!(run.update());
    for expected in 1..=3 {
        assert_eq!(
            events.recv_timeout(WAIT).unwrap(),
            RunEvent::Updated { iteration: expected }
        );
    }
    run.stop();
    run.join();
    assert!(!run.is_running());
    assert!(run.end());

    let cycles = run.stats().iteration;
    assert!(cycles >= 3);
    let log = read_run_log(&run.log_dir().unwrap()).unwrap();
    assert_eq!(count(&log, "<error iteration="), cycles as usize);
    // The init entry plus one per cycle.
    assert_eq!(count(&log, "<iteration n="), cycles as usize + 1);
    for k in 1..=cycles {
        assert!(log.contains(&format!(
            "<error iteration=\"{k}\">step {k} diverged\ncell 7 is not finite</error>\n<iteration n=\"{k}\">attempts={k}</iteration>"
        )));
    }
}

#[test]
fn stop_then_reinit_resets_the_iteration() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("stub");
    let run = SimRun::new(host.spawn().unwrap(), run_config(root.path())).unwrap();

    assert!(run.init(STUB_CONFIG));
    assert_eq!(run.initializations(), 1);
    assert!(run.update());
    assert!(wait_until(WAIT, || run.iteration() >= 3));
    assert_eq!(run.phase(), RunPhase::Running);

    run.stop();
    assert!(wait_until(WAIT, || !run.is_running()));
    assert_eq!(run.phase(), RunPhase::Idle);

    assert!(run.init(STUB_CONFIG));
    assert_eq!(run.iteration(), 0);
    assert_eq!(run.initializations(), 2);
}

#[test]
fn continuous_mode_passes_the_previous_cycle_duration() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("stub");
    let run = SimRun::new(host.spawn().unwrap(), run_config(root.path())).unwrap();
    let events = run.subscribe();

    run.init("");
    run.update();
    for expected in 1..=3 {
        assert_eq!(
            events.recv_timeout(WAIT).unwrap(),
            RunEvent::Updated {
                iteration: expected
            }
        );
    }
    run.stop();
    run.join();
    assert!(run.end());

    let log = read_run_log(&run.log_dir().unwrap()).unwrap();
    // The first cycle has no predecessor.
    assert!(log.contains("<iteration n=\"1\"> steps=1 delta=0</iteration>"));
    assert!(run.stats().elapsed_ms >= 1);
}

#[test]
fn default_config_round_trips_through_init() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("stub");
    let instance = host.spawn().unwrap();
    let defaults = instance.config().unwrap().unwrap_or_default();
    let run = SimRun::new(instance, run_config(root.path())).unwrap();
    assert!(run.init(&defaults));
    assert!(run.end());
    let log = read_run_log(&run.log_dir().unwrap()).unwrap();
    assert_eq!(count(&log, "<error"), 0);
    assert!(log.contains("  <config>\n    X=1\n    Y=2\n  </config>\n"));
}

#[test]
fn save_image_while_running_writes_nothing() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("stub");
    let run = SimRun::new(host.spawn().unwrap(), run_config(root.path())).unwrap();
    run.init("");
    run.update();
    assert!(wait_until(WAIT, || run.iteration() >= 1));
    assert_eq!(run.save_image(), None);
    run.stop();
    run.join();

    let dir = run.log_dir().unwrap();
    let pngs = std::fs::read_dir(&dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .path()
                .extension()
                .is_some_and(|x| x == "png")
        })
        .count();
    assert_eq!(pngs, 0);

    let saved = run.save_image().unwrap();
    let name = saved.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("render-Stub-"), "{name}");
    assert!(name.ends_with(".png"));
    assert_eq!(saved.parent(), Some(dir.as_path()));
}

#[test]
fn usage_errors_are_no_ops() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("stub");
    let run = SimRun::new(host.spawn().unwrap(), run_config(root.path())).unwrap();

    assert_eq!(run.phase(), RunPhase::Uninitialized);
    assert!(!run.end());
    assert!(!run.update_sync(3));
    assert_eq!(run.save_image(), None);
    assert_eq!(run.abort(), Err(RunError::NotImplemented { operation: "abort" }));

    run.init("");
    run.update();
    assert!(!run.update());
    assert!(!run.update_steps(2));
    assert!(!run.init(""));
    assert!(!run.end());
    run.stop();
    run.join();

    assert!(run.end());
    assert_eq!(run.phase(), RunPhase::Ended);
    assert!(!run.end());
    assert!(!run.update());
}

#[test]
fn end_writes_footer_and_notifies() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("stub");
    let run = SimRun::new(host.spawn().unwrap(), run_config(root.path())).unwrap();
    let events = run.subscribe();
    run.init("X=7");
    run.update_sync(4);
    run.end();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            RunEvent::Updated { iteration: 4 },
            RunEvent::Ended { iterations: 4 }
        ]
    );

    let log = read_run_log(&run.log_dir().unwrap()).unwrap();
    assert!(log.starts_with("<run>\n<header>\n"));
    assert!(log.contains("  <title>Stub</title>\n  <meta>stub meta</meta>\n"));
    assert!(log.contains("<footer>\n  <iterations>4</iterations>\n"));
    assert!(log.ends_with("</footer>\n</run>\n"));
}

#[test]
fn plugin_panics_are_contained() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("panicking");
    let run = SimRun::new(host.spawn().unwrap(), run_config(root.path())).unwrap();
    run.init("panic=true");
    assert!(run.update_sync(3));
    assert_eq!(run.iteration(), 3);
    assert!(run.end());
    assert!(host.is_connected());

    let log = read_run_log(&run.log_dir().unwrap()).unwrap();
    assert_eq!(count(&log, "panic: armed stub exploded"), 3);
    assert_eq!(count(&log, "panic: end is not survivable"), 1);
    assert!(log.ends_with("</run>\n"));
}

#[test]
fn silent_plugin_leaves_no_frame_or_entries() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("silent");
    let run = SimRun::new(host.spawn().unwrap(), run_config(root.path())).unwrap();
    run.init("");
    run.update_sync(2);
    assert_eq!(run.frame(), None);
    assert_eq!(run.save_image(), None);
    run.end();
    let log = read_run_log(&run.log_dir().unwrap()).unwrap();
    assert!(log.contains("  <title></title>\n"));
    assert_eq!(count(&log, "<iteration n="), 0);
    assert!(log.contains("<iterations>2</iterations>"));
}

#[test]
fn batch_runs_save_one_image_each() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("stub");
    let run = SimRun::new(host.spawn().unwrap(), run_config(root.path())).unwrap();
    let images = run.run_batch(STUB_CONFIG, 3, 5);
    assert_eq!(images.len(), 3);
    for image in &images {
        assert!(image.is_file());
    }
    assert_eq!(run.initializations(), 3);
    assert_eq!(run.phase(), RunPhase::Ended);
}

#[test]
fn small_logs_rotate_and_reassemble() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("stub");
    let mut config = run_config(root.path());
    config.max_file_len = 200;
    config.max_buffer_len = 50;
    let run = SimRun::new(host.spawn().unwrap(), config).unwrap();
    run.init(STUB_CONFIG);
    for _ in 0..10 {
        run.update_sync(1);
    }
    run.end();

    let dir = run.log_dir().unwrap();
    let parts = std::fs::read_dir(&dir).unwrap().count();
    assert!(parts > 1, "expected rotation, found {parts} file(s)");
    let log = read_run_log(&dir).unwrap();
    assert!(log.starts_with("<run>\n"));
    assert!(log.ends_with("</run>\n"));
    assert_eq!(count(&log, "<iteration n="), 11);
}

#[test]
fn runs_over_one_host_proceed_concurrently() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("stub");
    let runs: Vec<SimRun> = (0..3)
        .map(|_| SimRun::new(host.spawn().unwrap(), run_config(root.path())).unwrap())
        .collect();
    for run in &runs {
        run.init("");
        run.update_steps(50);
    }
    for run in &runs {
        assert!(wait_until(WAIT, || !run.is_running()));
        assert_eq!(run.iteration(), 50);
        run.end();
    }
}

#[test]
fn calls_after_unload_fail_but_the_run_survives() {
    let root = tempfile::tempdir().unwrap();
    let host = stub_host("stub");
    let run = SimRun::new(host.spawn().unwrap(), run_config(root.path())).unwrap();
    run.init("");
    host.unload();
    assert!(run.update_sync(3));
    assert!(run.end());
    let log = read_run_log(&run.log_dir().unwrap()).unwrap();
    assert!(log.contains("plugin module disconnected"));
}
