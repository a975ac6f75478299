//! Rebuild orchestration against recording collaborators.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use medley_library::{
    ArtworkEnricher, Catalog, ChangeRequest, LibraryError, LibraryWatcher, LoadReport,
    MemoryCatalog, MemorySettingsStore, RebuildOrchestrator, RebuildPipeline, RebuildStep,
    Result, RootDirSettings, RootDirectory, RootDirectorySet, StepResult,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Purge(Vec<PathBuf>),
    LoadStart(Vec<PathBuf>),
    LoadEnd,
    Folders,
    Albums,
    Artists,
    Restart(Vec<PathBuf>),
}

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<Call>>,
}

impl Recorder {
    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

struct RecordingCatalog {
    recorder: Arc<Recorder>,
    load_delay: Duration,
    fail_albums: bool,
}

#[async_trait]
impl Catalog for RecordingCatalog {
    async fn remove_tracks_under_dirs(&self, dirs: &[PathBuf]) -> Result<usize> {
        self.recorder.push(Call::Purge(dirs.to_vec()));
        Ok(dirs.len())
    }

    async fn load_all_tracks(&self, roots: &[PathBuf]) -> Result<LoadReport> {
        self.recorder.push(Call::LoadStart(roots.to_vec()));
        tokio::time::sleep(self.load_delay).await;
        self.recorder.push(Call::LoadEnd);
        Ok(LoadReport {
            roots_scanned: roots.len(),
            ..LoadReport::default()
        })
    }

    async fn process_folders(&self) -> Result<usize> {
        self.recorder.push(Call::Folders);
        Ok(0)
    }

    async fn load_albums(&self) -> Result<usize> {
        self.recorder.push(Call::Albums);
        if self.fail_albums {
            return Err(LibraryError::step(RebuildStep::LoadAlbums, "album table locked"));
        }
        Ok(0)
    }

    async fn load_artists(&self) -> Result<usize> {
        self.recorder.push(Call::Artists);
        Ok(0)
    }
}

struct RecordingWatcher {
    recorder: Arc<Recorder>,
}

#[async_trait]
impl LibraryWatcher for RecordingWatcher {
    async fn restart(&self, roots: &[PathBuf]) -> Result<()> {
        self.recorder.push(Call::Restart(roots.to_vec()));
        Ok(())
    }
}

struct Harness {
    recorder: Arc<Recorder>,
    settings: Arc<RootDirSettings>,
    orchestrator: RebuildOrchestrator,
}

fn harness(initial: Vec<RootDirectory>, load_delay: Duration, fail_albums: bool) -> Harness {
    let recorder = Arc::new(Recorder::default());
    let settings = Arc::new(RootDirSettings::new(Arc::new(MemorySettingsStore::with_dirs(
        initial,
    ))));
    let catalog = Arc::new(RecordingCatalog {
        recorder: recorder.clone(),
        load_delay,
        fail_albums,
    });
    let watcher = Arc::new(RecordingWatcher {
        recorder: recorder.clone(),
    });

    let pipeline =
        RebuildPipeline::new(settings.clone(), catalog, "/home/op").with_watcher(watcher);
    Harness {
        recorder,
        settings,
        orchestrator: RebuildOrchestrator::spawn(pipeline),
    }
}

fn paths(raw: &[&str]) -> Vec<PathBuf> {
    raw.iter().map(PathBuf::from).collect()
}

fn one_run(roots: &[&str], purged: &[&str]) -> Vec<Call> {
    vec![
        Call::Purge(paths(purged)),
        Call::LoadStart(paths(roots)),
        Call::LoadEnd,
        Call::Folders,
        Call::Albums,
        Call::Artists,
        Call::Restart(paths(roots)),
    ]
}

#[tokio::test]
async fn test_steps_run_in_order_against_resolved_roots() {
    let h = harness(vec![RootDirectory::path("/music")], Duration::ZERO, false);

    let result = h
        .settings
        .apply(&ChangeRequest::from_raw(["$home"], Vec::<String>::new()))
        .await
        .unwrap();
    let ticket = h
        .orchestrator
        .trigger(result.purge_dirs.clone(), result.final_dirs.clone());
    let report = h.orchestrator.wait_for(ticket).await.unwrap();

    assert_eq!(h.recorder.calls(), one_run(&["/home/op"], &["/music"]));
    assert!(report.is_clean());
    assert_eq!(report.roots, RootDirectorySet::home());
    assert_eq!(report.purged, vec![RootDirectory::path("/music")]);
    assert_eq!(
        report.steps.iter().map(|s| s.step).collect::<Vec<_>>(),
        vec![
            RebuildStep::Purge,
            RebuildStep::LoadTracks,
            RebuildStep::ProcessFolders,
            RebuildStep::LoadAlbums,
            RebuildStep::LoadArtists,
            RebuildStep::RestartWatcher,
        ]
    );
}

#[tokio::test]
async fn test_trigger_returns_before_rebuild_finishes() {
    let h = harness(vec![RootDirectory::path("/music")], Duration::from_millis(200), false);

    let ticket = h.orchestrator.trigger(Vec::new(), RootDirectorySet::new());
    assert!(h.orchestrator.status().processed < ticket);

    h.orchestrator.wait_for(ticket).await.unwrap();
    assert_eq!(h.orchestrator.status().processed, ticket);
    assert!(!h.orchestrator.status().running);
}

#[tokio::test]
async fn test_overlapping_triggers_never_interleave() {
    let h = harness(vec![RootDirectory::path("/a")], Duration::from_millis(100), false);

    let first = h.orchestrator.trigger(Vec::new(), RootDirectorySet::new());
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = h.orchestrator.trigger(Vec::new(), RootDirectorySet::new());
    h.orchestrator.wait_for(second).await.unwrap();
    assert!(first < second);

    let calls = h.recorder.calls();
    let mut in_flight = false;
    for call in &calls {
        match call {
            Call::Purge(_) => {
                assert!(!in_flight, "a rebuild started while another was running");
                in_flight = true;
            }
            Call::Restart(_) => in_flight = false,
            _ => assert!(in_flight),
        }
    }
    assert!(!in_flight);
    assert_eq!(calls.len() % 7, 0);
}

#[tokio::test]
async fn test_queued_triggers_coalesce_onto_latest_settings() {
    let h = harness(vec![RootDirectory::path("/a")], Duration::from_millis(150), false);

    let first = h.orchestrator.trigger(Vec::new(), RootDirectorySet::new());
    tokio::time::sleep(Duration::from_millis(30)).await;

    let mut last = first;
    for (add, remove) in [("/b", "/a"), ("/c", "/b")] {
        let result = h
            .settings
            .apply(&ChangeRequest::from_raw([add], [remove]))
            .await
            .unwrap();
        last = h
            .orchestrator
            .trigger(result.purge_dirs.clone(), result.final_dirs.clone());
    }

    let report = h.orchestrator.wait_for(last).await.unwrap();
    assert_eq!(report.ticket, last);
    assert_eq!(report.roots, RootDirectorySet::from_dirs([RootDirectory::path("/c")]));

    let mut expected = one_run(&["/a"], &[]);
    expected.extend(one_run(&["/c"], &["/a", "/b"]));
    assert_eq!(h.recorder.calls(), expected);
}

#[tokio::test]
async fn test_failed_step_does_not_stop_the_rebuild() {
    let h = harness(vec![RootDirectory::path("/a")], Duration::ZERO, true);

    let ticket = h.orchestrator.trigger(Vec::new(), RootDirectorySet::new());
    let report = h.orchestrator.wait_for(ticket).await.unwrap();

    assert_eq!(h.recorder.calls(), one_run(&["/a"], &[]));
    let failures: Vec<_> = report.failures().map(|s| s.step).collect();
    assert_eq!(failures, vec![RebuildStep::LoadAlbums]);
    assert!(matches!(
        &report.steps[3].result,
        StepResult::Failed { message } if message.contains("album table locked")
    ));
}

#[tokio::test]
async fn test_library_lock_excludes_running_rebuild() {
    let h = harness(vec![RootDirectory::path("/a")], Duration::from_millis(100), false);

    let ticket = h.orchestrator.trigger(Vec::new(), RootDirectorySet::new());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let lock = h.orchestrator.library_lock();
    let _guard = lock.lock().await;
    assert_eq!(h.orchestrator.status().processed, ticket);
    assert_eq!(h.recorder.calls().len(), 7);
}

fn write_track(root: &Path, relative: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(path).unwrap();
}

#[tokio::test]
async fn test_end_to_end_reconfiguration() {
    let home = TempDir::new().unwrap();
    let music = home.path().join("Music");
    let podcasts = home.path().join("Podcasts");
    write_track(&music, "Low/Secret Name/01 - Starfire.flac");
    write_track(&music, "Low/Secret Name/02 - Weight of Water.flac");
    write_track(&music, "Low/Secret Name/cover.jpg");
    write_track(&podcasts, "Show/Season 1/ep1.mp3");

    let settings = Arc::new(RootDirSettings::new(Arc::new(MemorySettingsStore::new())));
    let catalog = Arc::new(MemoryCatalog::new());
    let pipeline = RebuildPipeline::new(settings.clone(), catalog.clone(), home.path())
        .with_enricher(Arc::new(ArtworkEnricher::new(catalog.clone())));
    let orchestrator = RebuildOrchestrator::spawn(pipeline);

    let music_raw = music.to_string_lossy().into_owned();
    let podcasts_raw = podcasts.to_string_lossy().into_owned();

    let result = settings
        .apply(&ChangeRequest::from_raw([music_raw.as_str()], Vec::<String>::new()))
        .await
        .unwrap();
    let ticket = orchestrator.trigger(result.purge_dirs, result.final_dirs);
    let report = orchestrator.wait_for(ticket).await.unwrap();
    assert!(report.is_clean());

    let stats = catalog.stats().await;
    assert_eq!((stats.tracks, stats.albums, stats.artists), (2, 1, 1));
    let starfire = catalog
        .track(&music.join("Low/Secret Name/01 - Starfire.flac"))
        .await
        .unwrap();
    assert_eq!(starfire.title, "Starfire");
    assert_eq!(starfire.artwork, Some(music.join("Low/Secret Name/cover.jpg")));

    let result = settings
        .apply(&ChangeRequest::from_raw(
            [podcasts_raw.as_str()],
            [music_raw.as_str()],
        ))
        .await
        .unwrap();
    assert_eq!(result.purge_dirs, vec![RootDirectory::path(&music)]);
    let ticket = orchestrator.trigger(result.purge_dirs, result.final_dirs);
    orchestrator.wait_for(ticket).await.unwrap();

    let tracks = catalog.tracks().await;
    assert_eq!(tracks.len(), 1);
    assert!(tracks[0].is_under(&podcasts));

    let result = settings
        .apply(&ChangeRequest::from_raw(["$home"], Vec::<String>::new()))
        .await
        .unwrap();
    let ticket = orchestrator.trigger(result.purge_dirs, result.final_dirs);
    let report = orchestrator.wait_for(ticket).await.unwrap();

    assert_eq!(report.roots, RootDirectorySet::home());
    assert_eq!(catalog.stats().await.tracks, 3);
}
