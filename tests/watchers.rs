//! Watcher behaviour: timing, hiccup tolerance, single emission

mod common;

use axum::{
    http::StatusCode,
    routing::{get, put},
    Router,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{timeout, Instant};

use common::{FakeServer, ScriptedNotice};
use spotwarden::cloud::MetadataClient;
use spotwarden::event::{self, Event, ExitInfo};
use spotwarden::persistence::{RestoreOrigin, WorkingDirectory};
use spotwarden::server::kill_channel;
use spotwarden::watch::{self, IdleWatcher, PreemptionWatcher, ProcessExitWatcher};
use spotwarden::{WardenConfig, WardenError};

fn stale_file(dir: &std::path::Path, age: Duration) -> std::path::PathBuf {
    let path = dir.join("playerdata");
    let file = std::fs::File::create(&path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
    path
}

#[tokio::test]
async fn idle_fires_within_one_sample_period() {
    let dir = tempfile::tempdir().unwrap();
    stale_file(dir.path(), Duration::from_secs(3600));

    let config = WardenConfig {
        max_idle: Duration::from_millis(240),
        idle_watch_grace: Duration::from_millis(30),
        idle_watch_path: "playerdata".into(),
        ..Default::default()
    };
    let period = config.idle_sample_period();
    assert_eq!(period, Duration::from_millis(20));

    let (emitter, mut rx) = event::channel();
    let start = Instant::now();
    let task = tokio::spawn(IdleWatcher::new(&config, dir.path()).run(emitter));

    let event = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert_eq!(event, Some(Event::IdleTimeoutReached));
    assert!(start.elapsed() >= config.idle_watch_grace);
    assert!(start.elapsed() < config.idle_watch_grace + period + Duration::from_millis(200));

    assert!(task.await.unwrap());
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn idle_stays_quiet_while_players_active() {
    let dir = tempfile::tempdir().unwrap();
    let path = stale_file(dir.path(), Duration::ZERO);

    let watcher = IdleWatcher::with_timing(
        path.clone(),
        Duration::from_millis(150),
        Duration::ZERO,
        Duration::from_millis(10),
    );
    let (emitter, mut rx) = event::channel();
    let task = tokio::spawn(watcher.run(emitter));

    // Keep touching the file faster than the idle limit
    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now())
            .unwrap();
    }
    assert!(rx.try_recv().is_err());

    // Then go quiet
    let event = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert_eq!(event, Some(Event::IdleTimeoutReached));
    assert!(task.await.unwrap());
}

#[tokio::test]
async fn preemption_ignores_poll_errors() {
    let notice = Arc::new(ScriptedNotice::new(vec![
        Ok(false),
        Err(WardenError::Metadata {
            path: "/latest/meta-data/spot/termination-time".into(),
            reason: "connection reset".into(),
        }),
        Ok(false),
        Ok(true),
    ]));
    let (emitter, mut rx) = event::channel();
    let fired = PreemptionWatcher::new(notice.clone(), Duration::from_millis(5))
        .run(emitter)
        .await;

    assert!(fired);
    assert_eq!(notice.polls(), 4);
    assert_eq!(rx.recv().await, Some(Event::PreemptionNoticed));
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn preemption_reads_metadata_status() {
    let polls = Arc::new(AtomicU32::new(0));
    let counter = polls.clone();
    let app = Router::new().route(
        "/latest/meta-data/spot/termination-time",
        get(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    (StatusCode::NOT_FOUND, String::new())
                } else {
                    (StatusCode::OK, "2026-10-17T12:00:00Z".to_string())
                }
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let metadata = MetadataClient::with_base_url(format!("http://{addr}")).unwrap();
    let (emitter, mut rx) = event::channel();
    let fired = timeout(
        Duration::from_secs(5),
        PreemptionWatcher::new(Arc::new(metadata), Duration::from_millis(10)).run(emitter),
    )
    .await
    .unwrap();

    assert!(fired);
    assert_eq!(polls.load(Ordering::SeqCst), 3);
    assert_eq!(rx.recv().await, Some(Event::PreemptionNoticed));
}

#[tokio::test]
async fn metadata_error_statuses_are_not_a_notice() {
    // Token endpoint down, so polls go out without a session token and are refused
    let polls = Arc::new(AtomicU32::new(0));
    let counter = polls.clone();
    let app = Router::new()
        .route(
            "/latest/api/token",
            put(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        )
        .route(
            "/latest/meta-data/spot/termination-time",
            get(move || {
                let counter = counter.clone();
                async move {
                    match counter.fetch_add(1, Ordering::SeqCst) {
                        0 | 1 => StatusCode::UNAUTHORIZED,
                        2 => StatusCode::SERVICE_UNAVAILABLE,
                        _ => StatusCode::OK,
                    }
                }
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let metadata = MetadataClient::with_base_url(format!("http://{addr}")).unwrap();
    assert!(matches!(
        metadata.termination_scheduled().await,
        Err(WardenError::Metadata { .. })
    ));

    let (emitter, mut rx) = event::channel();
    let fired = timeout(
        Duration::from_secs(5),
        PreemptionWatcher::new(Arc::new(metadata), Duration::from_millis(10)).run(emitter),
    )
    .await
    .unwrap();

    // One 401 above, then 401 and 503 skipped by the watcher before the 200
    assert!(fired);
    assert_eq!(polls.load(Ordering::SeqCst), 4);
    assert_eq!(rx.recv().await, Some(Event::PreemptionNoticed));
}

#[tokio::test]
async fn unreachable_metadata_is_not_a_notice() {
    // Bind then drop to get a port with nothing listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let metadata = MetadataClient::with_base_url(format!("http://{addr}")).unwrap();
    assert!(metadata.termination_scheduled().await.is_err());

    let (emitter, mut rx) = event::channel();
    let task = tokio::spawn(
        PreemptionWatcher::new(Arc::new(metadata), Duration::from_millis(10)).run(emitter),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
    assert!(!task.is_finished());
    task.abort();
}

#[tokio::test]
async fn process_exit_reports_once_and_services_kills() {
    let server = FakeServer::new(None, Duration::from_millis(20));
    let kills = server.kill_counter();
    let (switch, requests) = kill_channel();
    let (emitter, mut rx) = event::channel();

    let task = tokio::spawn(ProcessExitWatcher::new(Box::new(server), requests).run(emitter));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(rx.try_recv().is_err());

    assert!(switch.request_kill());
    let event = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert_eq!(event, Some(Event::ChildProcessExited(ExitInfo::signaled(9))));
    assert!(task.await.unwrap());
    assert_eq!(kills.load(Ordering::SeqCst), 1);
    assert_eq!(rx.recv().await, None);

    // Owner gone: further requests report non-delivery
    assert!(!switch.request_kill());
}

#[tokio::test]
async fn spawned_watchers_each_emit_at_most_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = WardenConfig {
        max_uptime: Duration::from_millis(30),
        max_idle: Duration::from_secs(3600),
        idle_watch_grace: Duration::from_secs(3600),
        preemption_poll_interval: Duration::from_millis(5),
        ..Default::default()
    };
    let workdir = WorkingDirectory::new(dir.path().to_path_buf(), RestoreOrigin::Seed);
    let notice = Arc::new(ScriptedNotice::new(vec![Ok(false), Ok(true)]));
    let server = FakeServer::new(Some(Duration::from_millis(60)), Duration::ZERO);
    let (_switch, requests) = kill_channel();

    let (emitter, mut rx) = event::channel();
    let watchers = watch::spawn_all(
        &config,
        &workdir,
        notice,
        Box::new(server),
        requests,
        async { Ok::<_, std::io::Error>("SIGTERM") },
        &emitter,
    );
    drop(emitter);
    assert_eq!(watchers.len(), 5);

    let mut seen = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_millis(300), rx.recv()).await {
        seen.push(event.as_label());
    }
    watchers.abort_all();

    seen.sort_unstable();
    assert_eq!(
        seen,
        vec![
            "child_exited",
            "external_termination",
            "preemption_noticed",
            "uptime_exceeded"
        ]
    );
}
