use super::*;
use crate::finalizer::ContentSniffer;
use crate::item::PartFile;
use crate::tracker::MemoryTracker;
use crate::types::{ItemId, MessageId, State};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Sink that keeps every event in memory
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }

    fn events_for(&self, id: u64) -> Vec<LifecycleEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.id == ItemId(id))
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &LifecycleEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Destination whose close can be made to fail
struct FakeDest {
    path: PathBuf,
    close_error: Option<&'static str>,
}

#[async_trait]
impl Destination for FakeDest {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn close(&mut self) -> std::io::Result<()> {
        match self.close_error.take() {
            Some(msg) => Err(std::io::Error::other(msg)),
            None => Ok(()),
        }
    }
}

struct FakeElem {
    id: u64,
    size: u64,
    dest: FakeDest,
}

impl TransferElem for FakeElem {
    type Dest = FakeDest;

    fn id(&self) -> ItemId {
        ItemId(self.id)
    }
    fn url(&self) -> &str {
        "https://t.me/c/100/7"
    }
    fn message_id(&self) -> MessageId {
        MessageId(7)
    }
    fn size(&self) -> u64 {
        self.size
    }
    fn into_destination(self) -> FakeDest {
        self.dest
    }
}

struct FailingSniffer;

#[async_trait]
impl ContentSniffer for FailingSniffer {
    async fn detect(&self, _path: &Path) -> std::io::Result<String> {
        Err(std::io::Error::other("unsupported"))
    }
}

struct Harness {
    observer: Arc<TransferObserver>,
    sink: Arc<RecordingSink>,
    tracker: Arc<MemoryTracker>,
    temp_dir: TempDir,
}

impl Harness {
    fn new(config: Config) -> Self {
        let finalizer = Finalizer::new(&config);
        Self::with_finalizer(config, finalizer)
    }

    fn with_finalizer(config: Config, finalizer: Finalizer) -> Self {
        let sink = Arc::new(RecordingSink::default());
        let tracker = Arc::new(MemoryTracker::new());
        let observer =
            TransferObserver::with_finalizer(config, sink.clone(), tracker.clone(), finalizer)
                .unwrap();

        Self {
            observer: Arc::new(observer),
            sink,
            tracker,
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Write a temporary file and build an item pointing at it
    async fn item(&self, id: u64, size: u64, name: &str) -> FakeElem {
        let path = self.temp_dir.path().join(format!("{name}.tmp"));
        tokio::fs::write(&path, vec![0u8; size as usize]).await.unwrap();

        FakeElem {
            id,
            size,
            dest: FakeDest {
                path,
                close_error: None,
            },
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}

/// Check `start (downloading)* (done|fail)?` and `downloaded <= total`
fn assert_valid_sequence(events: &[LifecycleEvent]) {
    let states: Vec<State> = events.iter().map(|e| e.state()).collect();
    assert_eq!(states.first(), Some(&State::Start), "sequence {states:?}");

    for (i, state) in states.iter().enumerate().skip(1) {
        match state {
            State::Downloading => {}
            State::Done | State::Fail => {
                assert_eq!(i, states.len() - 1, "terminal event not last: {states:?}")
            }
            State::Start => panic!("repeated start: {states:?}"),
        }
    }

    for event in events {
        if let Some(downloaded) = event.downloaded() {
            assert!(downloaded <= event.total(), "{event:?}");
        }
    }
}

#[tokio::test]
async fn test_successful_transfer_scenario() {
    let h = Harness::new(Config::default());
    let elem = h.item(1, 1024, "video.mp4").await;

    h.observer.on_add(&elem);
    h.observer.on_download(&elem, ProgressSample::new(1024, 512));
    h.observer.on_download(&elem, ProgressSample::new(1024, 1024));
    h.observer.on_done(elem, Ok(())).await;

    let events = h.sink.events();
    let payloads: Vec<EventState> = events.iter().map(|e| e.payload.clone()).collect();
    assert_eq!(
        payloads,
        vec![
            EventState::Start {
                total: 1024,
                downloaded: 0
            },
            EventState::Downloading {
                total: 1024,
                downloaded: 512
            },
            EventState::Downloading {
                total: 1024,
                downloaded: 1024
            },
            EventState::Done {
                total: 1024,
                downloaded: 1024
            },
        ]
    );
    for event in &events {
        assert_eq!(event.id, ItemId(1));
        assert_eq!(event.url, "https://t.me/c/100/7");
        assert_eq!(event.message_id, MessageId(7));
    }

    assert!(h.tracker.is_finished(ItemId(1)));
    assert!(h.path("video.mp4").exists());
    assert!(!h.path("video.mp4.tmp").exists());
}

#[tokio::test]
async fn test_cancellation_is_silent() {
    let h = Harness::new(Config::default());
    let elem = h.item(2, 64, "doc.pdf").await;

    h.observer.on_done(elem, Err(TransferError::Cancelled)).await;

    assert!(h.sink.events().is_empty());
    assert!(!h.path("doc.pdf.tmp").exists());
    assert!(!h.path("doc.pdf").exists());
    assert!(!h.tracker.is_finished(ItemId(2)));
}

#[tokio::test]
async fn test_cancellation_after_progress_has_no_terminal_event() {
    let h = Harness::new(Config::default());
    let elem = h.item(2, 64, "doc.pdf").await;

    h.observer.on_add(&elem);
    h.observer.on_download(&elem, ProgressSample::new(64, 10));
    h.observer.on_done(elem, Err(TransferError::Cancelled)).await;

    let states: Vec<State> = h.sink.events().iter().map(|e| e.state()).collect();
    assert_eq!(states, vec![State::Start, State::Downloading]);
}

#[tokio::test]
async fn test_close_failure_is_fatal() {
    let h = Harness::new(Config::default());
    let mut elem = h.item(3, 100, "song.mp3").await;
    elem.dest.close_error = Some("disk full");

    h.observer.on_done(elem, Ok(())).await;

    let events = h.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].state(), State::Fail);
    assert_eq!(events[0].err_msg(), Some("close file: disk full"));

    // No rename and no completion mark
    assert!(h.path("song.mp3.tmp").exists());
    assert!(!h.path("song.mp3").exists());
    assert!(!h.tracker.is_finished(ItemId(3)));
}

#[tokio::test]
async fn test_close_failure_supersedes_transfer_error() {
    for result in [
        Err(TransferError::Cancelled),
        Err(TransferError::Other("timeout".to_string())),
    ] {
        let h = Harness::new(Config::default());
        let mut elem = h.item(4, 10, "a").await;
        elem.dest.close_error = Some("disk full");

        h.observer.on_done(elem, result).await;

        let events = h.sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].err_msg(), Some("close file: disk full"));
    }
}

#[tokio::test]
async fn test_transfer_error_reports_and_discards() {
    let h = Harness::new(Config::default());
    let elem = h.item(5, 100, "archive.zip").await;

    h.observer
        .on_done(
            elem,
            Err(TransferError::Other("connection reset".to_string())),
        )
        .await;

    let events = h.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].state(), State::Fail);
    assert_eq!(events[0].total(), 100);
    assert_eq!(events[0].err_msg(), Some("progress: connection reset"));

    assert!(!h.path("archive.zip.tmp").exists());
    assert!(!h.tracker.is_finished(ItemId(5)));
}

#[tokio::test]
async fn test_finalize_failure_keeps_temp_file() {
    let config = Config {
        rewrite_ext: true,
        ..Default::default()
    };
    let finalizer = Finalizer::with_sniffer(&config, Arc::new(FailingSniffer));
    let h = Harness::with_finalizer(config, finalizer);
    let elem = h.item(6, 32, "photo").await;

    h.observer.on_add(&elem);
    h.observer.on_done(elem, Ok(())).await;

    let events = h.sink.events_for(6);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].state(), State::Fail);
    assert_eq!(
        events[1].err_msg(),
        Some("post file: detect mime: unsupported")
    );

    assert!(h.tracker.is_finished(ItemId(6)));
    assert!(h.path("photo.tmp").exists());
}

#[tokio::test]
async fn test_rename_failure_keeps_temp_file() {
    let h = Harness::new(Config::default());
    let elem = h.item(7, 8, "report.txt").await;
    let blocker = h.path("report.txt");
    tokio::fs::create_dir(&blocker).await.unwrap();
    tokio::fs::write(blocker.join("keep"), b"x").await.unwrap();

    h.observer.on_done(elem, Ok(())).await;

    let events = h.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].state(), State::Fail);
    assert!(
        events[0]
            .err_msg()
            .unwrap()
            .starts_with("post file: rename file:")
    );

    assert!(h.tracker.is_finished(ItemId(7)));
    assert!(h.path("report.txt.tmp").exists());
}

#[tokio::test]
async fn test_extension_correction_without_duplication() {
    let config = Config {
        rewrite_ext: true,
        ..Default::default()
    };
    let h = Harness::new(config);

    let path = h.path("clip.png.tmp");
    tokio::fs::write(&path, [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
        .await
        .unwrap();
    let elem = FakeElem {
        id: 8,
        size: 8,
        dest: FakeDest {
            path,
            close_error: None,
        },
    };

    h.observer.on_done(elem, Ok(())).await;

    assert_eq!(h.sink.events()[0].state(), State::Done);
    assert!(h.path("clip.png").exists());
    assert!(!h.path("clip.png.png").exists());
}

#[tokio::test]
async fn test_part_file_destination_end_to_end() {
    use tokio::io::AsyncWriteExt;

    struct PartElem {
        dest: PartFile,
    }

    impl TransferElem for PartElem {
        type Dest = PartFile;

        fn id(&self) -> ItemId {
            ItemId(9)
        }
        fn url(&self) -> &str {
            "https://t.me/c/100/9"
        }
        fn message_id(&self) -> MessageId {
            MessageId(9)
        }
        fn size(&self) -> u64 {
            5
        }
        fn into_destination(self) -> PartFile {
            self.dest
        }
    }

    let h = Harness::new(Config::default());
    let mut dest = PartFile::create(h.temp_dir.path(), "hello.txt", ".tmp")
        .await
        .unwrap();
    dest.file_mut().unwrap().write_all(b"hello").await.unwrap();
    let elem = PartElem { dest };

    h.observer.on_add(&elem);
    h.observer.on_done(elem, Ok(())).await;

    let content = tokio::fs::read(h.path("hello.txt")).await.unwrap();
    assert_eq!(content, b"hello");
    assert_eq!(h.sink.events().last().unwrap().state(), State::Done);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_items_keep_valid_sequences() {
    let h = Harness::new(Config::default());
    let mut handles = Vec::new();

    for id in 0..24u64 {
        let elem = h.item(id, 4096, &format!("file-{id}.bin")).await;
        let observer = h.observer.clone();

        handles.push(tokio::spawn(async move {
            observer.on_add(&elem);
            for step in 1..=4 {
                observer.on_download(&elem, ProgressSample::new(4096, step * 1024));
                tokio::task::yield_now().await;
            }
            let result = match id % 3 {
                0 => Ok(()),
                1 => Err(TransferError::Cancelled),
                _ => Err(TransferError::Other("peer gone".to_string())),
            };
            observer.on_done(elem, result).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut by_id: HashMap<ItemId, Vec<LifecycleEvent>> = HashMap::new();
    for event in h.sink.events() {
        by_id.entry(event.id).or_default().push(event);
    }
    assert_eq!(by_id.len(), 24);

    for (id, events) in &by_id {
        assert_valid_sequence(events);
        let terminal = events.last().unwrap().state();
        match id.0 % 3 {
            0 => assert_eq!(terminal, State::Done),
            1 => assert_eq!(terminal, State::Downloading),
            _ => assert_eq!(terminal, State::Fail),
        }
    }

    assert_eq!(h.tracker.finished_ids().len(), 8);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = Config {
        temp_suffix: String::new(),
        ..Default::default()
    };

    let result = TransferObserver::new(
        config,
        Arc::new(RecordingSink::default()),
        Arc::new(MemoryTracker::new()),
    );

    assert!(matches!(result, Err(Error::Config { .. })));
}
