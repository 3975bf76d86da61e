//! Restore and snapshot behaviour against an in-memory blob store

mod common;

use std::sync::Arc;

use common::MemoryStore;
use spotwarden::persistence::{
    ArchiveCodec, CompressionLevel, Persistence, PersistenceConfig, RestoreOrigin, TarGzCodec,
};
use spotwarden::WardenError;

const DATA_URL: &str = "mem://bucket/data.tgz";
const SEED_URL: &str = "mem://bucket/eula.txt";
const JAR_URL: &str = "mem://bucket/server.jar";

fn config(work_root: &std::path::Path) -> PersistenceConfig {
    PersistenceConfig {
        data_url: DATA_URL.into(),
        seed_url: SEED_URL.into(),
        seed_file_name: "eula.txt".into(),
        server_jar_url: JAR_URL.into(),
        work_root: work_root.to_path_buf(),
    }
}

fn persistence(store: Arc<MemoryStore>, work_root: &std::path::Path) -> Persistence {
    Persistence::new(
        store,
        Arc::new(TarGzCodec::new(CompressionLevel::FAST)),
        config(work_root),
    )
}

#[tokio::test]
async fn first_run_contains_only_seed() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default().with_object(SEED_URL, "eula=true\n"));

    let workdir = persistence(store, root.path()).restore().await.unwrap();

    assert_eq!(workdir.origin(), RestoreOrigin::Seed);
    let entries: Vec<_> = std::fs::read_dir(workdir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("eula.txt")]);
    assert_eq!(
        std::fs::read(workdir.path().join("eula.txt")).unwrap(),
        b"eula=true\n"
    );
}

#[tokio::test]
async fn first_run_without_seed_fails() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());

    let err = persistence(store, root.path()).restore().await.unwrap_err();
    assert!(matches!(err, WardenError::SeedUnavailable { .. }));
}

#[tokio::test]
async fn resume_unpacks_previous_snapshot() {
    let root = tempfile::tempdir().unwrap();

    let world = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(world.path().join("world/playerdata")).unwrap();
    std::fs::write(world.path().join("world/level.dat"), b"level").unwrap();
    std::fs::write(world.path().join("eula.txt"), b"eula=true\n").unwrap();
    let archive = root.path().join("prev.tgz");
    TarGzCodec::default().pack(world.path(), &archive).unwrap();

    let store = Arc::new(
        MemoryStore::default()
            .with_object(DATA_URL, std::fs::read(&archive).unwrap())
            .with_object(SEED_URL, "unused"),
    );

    let workdir = persistence(store, root.path()).restore().await.unwrap();
    assert_eq!(workdir.origin(), RestoreOrigin::Snapshot);
    assert_eq!(
        std::fs::read(workdir.path().join("world/level.dat")).unwrap(),
        b"level"
    );
    assert!(workdir.path().join("world/playerdata").is_dir());
}

#[tokio::test]
async fn unreadable_snapshot_falls_back_to_seed() {
    let root = tempfile::tempdir().unwrap();

    // A real archive cut off partway through an incompressible entry
    let world = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(world.path().join("world")).unwrap();
    std::fs::write(world.path().join("world/level.dat"), b"level").unwrap();
    let mut state = 0x2545_f491_u32;
    let noise: Vec<u8> = (0..256 * 1024)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect();
    std::fs::write(world.path().join("world/region.mca"), &noise).unwrap();
    let archive = root.path().join("prev.tgz");
    TarGzCodec::new(CompressionLevel::FAST)
        .pack(world.path(), &archive)
        .unwrap();
    let mut truncated = std::fs::read(&archive).unwrap();
    truncated.truncate(truncated.len() / 2);

    for bad in [b"not an archive".to_vec(), truncated] {
        let store = Arc::new(
            MemoryStore::default()
                .with_object(DATA_URL, bad)
                .with_object(SEED_URL, "eula=true\n"),
        );

        let workdir = persistence(store, root.path()).restore().await.unwrap();
        assert_eq!(workdir.origin(), RestoreOrigin::Seed);
        let entries: Vec<_> = std::fs::read_dir(workdir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("eula.txt")]);
    }
}

#[tokio::test]
async fn unreadable_snapshot_without_seed_fails() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default().with_object(DATA_URL, "not an archive"));

    let err = persistence(store, root.path()).restore().await.unwrap_err();
    assert!(matches!(err, WardenError::SeedUnavailable { .. }));
}

#[tokio::test]
async fn snapshot_stores_archive_with_checksum() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default().with_object(SEED_URL, "eula=true\n"));
    let persistence = persistence(store.clone(), root.path());

    let workdir = persistence.restore().await.unwrap();
    std::fs::create_dir_all(workdir.path().join("world")).unwrap();
    std::fs::write(workdir.path().join("world/level.dat"), b"level").unwrap();

    let info = persistence.snapshot(&workdir).await.unwrap();
    let stored = store.object(DATA_URL).unwrap();
    assert_eq!(info.bytes, stored.len() as u64);
    assert_eq!(info.crc32c, crc32c::crc32c(&stored));

    // Next boot resumes from what was stored
    let resumed = persistence.restore().await.unwrap();
    assert_eq!(resumed.origin(), RestoreOrigin::Snapshot);
    assert_ne!(resumed.path(), workdir.path());
    assert_eq!(
        std::fs::read(resumed.path().join("world/level.dat")).unwrap(),
        b"level"
    );
}

#[tokio::test]
async fn snapshot_of_missing_directory_reports_failure() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());
    let persistence = persistence(store.clone(), root.path());

    let gone = spotwarden::persistence::WorkingDirectory::new(
        root.path().join("vanished"),
        RestoreOrigin::Seed,
    );
    let err = persistence.snapshot(&gone).await.unwrap_err();
    assert!(matches!(err, WardenError::SnapshotFailed { .. }));
    assert!(store.object(DATA_URL).is_none());
}

#[tokio::test]
async fn server_binary_lands_in_scratch_dir() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default().with_object(JAR_URL, "PK\x03\x04"));

    let jar = persistence(store, root.path())
        .fetch_server_binary()
        .await
        .unwrap();
    assert!(jar.starts_with(root.path()));
    assert_eq!(jar.file_name().unwrap(), "server.jar");
    assert_eq!(std::fs::read(&jar).unwrap(), b"PK\x03\x04");
}
