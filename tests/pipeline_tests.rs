// Integration tests for the transcription pipeline controller.
//
// The transcoder is exercised with plain `cat` (a byte-for-byte passthrough)
// or `true` (exits immediately, producing instant EOF), and recognition with
// a line-oriented fake decoder, so these tests run without ffmpeg or a
// speech model. The store is the in-process implementation.

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use vox_relay::{
    Hypothesis, MemorySessionStore, SessionEvent, SessionStatus, SessionStore, SpeechDecoder,
    SpeechEngine, TranscodeConfig, TranscribePipeline,
};

/// Treats the PCM stream as UTF-8 text: a completed line is a final
/// hypothesis, an incomplete tail a partial one.
struct LineDecoder {
    buf: String,
}

impl SpeechDecoder for LineDecoder {
    fn accept_pcm(&mut self, pcm: &[u8]) -> Result<Hypothesis> {
        self.buf.push_str(&String::from_utf8_lossy(pcm));
        match self.buf.find('\n') {
            Some(pos) => {
                let line = self.buf[..pos].to_string();
                self.buf.drain(..=pos);
                Ok(Hypothesis::Final(line))
            }
            None => Ok(Hypothesis::Partial(self.buf.clone())),
        }
    }
}

struct LineEngine {
    decoders_built: AtomicUsize,
}

impl LineEngine {
    fn new() -> Self {
        Self {
            decoders_built: AtomicUsize::new(0),
        }
    }
}

impl SpeechEngine for LineEngine {
    fn name(&self) -> &str {
        "line"
    }

    fn new_decoder(&self) -> Result<Box<dyn SpeechDecoder>> {
        self.decoders_built.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(LineDecoder { buf: String::new() }))
    }
}

/// Every chunk makes this decoder blow up.
struct FailingEngine;

struct FailingDecoder;

impl SpeechDecoder for FailingDecoder {
    fn accept_pcm(&mut self, _pcm: &[u8]) -> Result<Hypothesis> {
        anyhow::bail!("decoder exploded")
    }
}

impl SpeechEngine for FailingEngine {
    fn name(&self) -> &str {
        "failing"
    }

    fn new_decoder(&self) -> Result<Box<dyn SpeechDecoder>> {
        Ok(Box::new(FailingDecoder))
    }
}

fn transcoder(command: &str) -> TranscodeConfig {
    TranscodeConfig {
        command: command.to_string(),
        args: vec![],
        grace_ms: 1000,
    }
}

struct Harness {
    pipeline: TranscribePipeline,
    events: mpsc::Receiver<SessionEvent>,
    store: Arc<MemorySessionStore>,
    engine: Arc<LineEngine>,
}

fn harness(command: &str) -> Harness {
    let store = Arc::new(MemorySessionStore::new());
    let engine = Arc::new(LineEngine::new());
    let (tx, rx) = mpsc::channel(64);
    let pipeline = TranscribePipeline::new(
        store.clone(),
        engine.clone(),
        transcoder(command),
        tx,
    );
    Harness {
        pipeline,
        events: rx,
        store,
        engine,
    }
}

/// Wait for the next final hypothesis, skipping partials.
async fn next_final(events: &mut mpsc::Receiver<SessionEvent>) -> String {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for a final event")
            .expect("event channel closed");
        match event {
            SessionEvent::Final { text } => return text,
            _ => continue,
        }
    }
}

async fn next_error(events: &mut mpsc::Receiver<SessionEvent>) -> String {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for an error event")
            .expect("event channel closed");
        match event {
            SessionEvent::Error { message } => return message,
            _ => continue,
        }
    }
}

fn drain(events: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

#[tokio::test]
async fn start_feed_stop_persists_one_record() -> Result<()> {
    let mut h = harness("cat");

    assert!(h.pipeline.start().await?);
    h.pipeline.feed_audio(b"hello\n").await?;
    assert_eq!(next_final(&mut h.events).await, "hello");
    h.pipeline.feed_audio(b"world\n").await?;
    assert_eq!(next_final(&mut h.events).await, "world");
    assert!(h.pipeline.stop().await?);

    let records = h.store.list().await?;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.final_transcript, "hello world");
    assert_eq!(record.word_count, 2);
    assert!(record.duration_seconds > 0.0);
    assert!(record.ended_at.is_some());
    assert_eq!(record.label, "line");
    Ok(())
}

#[tokio::test]
async fn stop_twice_is_a_single_teardown() -> Result<()> {
    let mut h = harness("cat");

    assert!(h.pipeline.start().await?);
    h.pipeline.feed_audio(b"once\n").await?;
    assert_eq!(next_final(&mut h.events).await, "once");

    assert!(h.pipeline.stop().await?);
    assert!(!h.pipeline.stop().await?);
    assert_eq!(h.pipeline.status().await, SessionStatus::Stopped);

    let records = h.store.list().await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].final_transcript, "once");
    Ok(())
}

#[tokio::test]
async fn start_while_running_spawns_nothing_and_keeps_state() -> Result<()> {
    let mut h = harness("cat");

    assert!(h.pipeline.start().await?);
    h.pipeline.feed_audio(b"kept\n").await?;
    assert_eq!(next_final(&mut h.events).await, "kept");

    // Second start is a no-op: no new decoder, no new record, no reset.
    assert!(!h.pipeline.start().await?);
    assert_eq!(h.engine.decoders_built.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.list().await?.len(), 1);

    h.pipeline.stop().await?;
    assert_eq!(h.store.list().await?[0].final_transcript, "kept");
    Ok(())
}

#[tokio::test]
async fn each_cycle_creates_a_fresh_record() -> Result<()> {
    let mut h = harness("cat");

    assert!(h.pipeline.start().await?);
    h.pipeline.feed_audio(b"first\n").await?;
    assert_eq!(next_final(&mut h.events).await, "first");
    assert!(h.pipeline.stop().await?);

    assert!(h.pipeline.start().await?);
    h.pipeline.feed_audio(b"second\n").await?;
    assert_eq!(next_final(&mut h.events).await, "second");
    assert!(h.pipeline.stop().await?);

    let records = h.store.list().await?;
    assert_eq!(records.len(), 2);
    // Newest first: the second cycle's transcript leads.
    assert_eq!(records[0].final_transcript, "second");
    assert_eq!(records[1].final_transcript, "first");
    assert_eq!(h.engine.decoders_built.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn feeding_audio_before_start_fails_without_side_effects() -> Result<()> {
    let h = harness("cat");

    assert!(h.pipeline.feed_audio(b"too early").await.is_err());

    assert_eq!(h.store.list().await?.len(), 0);
    assert_eq!(h.engine.decoders_built.load(Ordering::SeqCst), 0);
    assert_eq!(h.pipeline.status().await, SessionStatus::Idle);
    Ok(())
}

#[tokio::test]
async fn transcoder_exiting_immediately_is_a_clean_cycle() -> Result<()> {
    // `true` exits without reading stdin or writing stdout: the decode loop
    // sees EOF on its first read and ends without an error.
    let mut h = harness("true");

    assert!(h.pipeline.start().await?);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(h.pipeline.stop().await?);

    let events = drain(&mut h.events);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, SessionEvent::Error { .. })),
        "EOF must not surface as an error, got {:?}",
        events
    );

    let records = h.store.list().await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].final_transcript, "");
    assert_eq!(records[0].word_count, 0);
    Ok(())
}

#[tokio::test]
async fn no_events_are_emitted_after_stop_returns() -> Result<()> {
    let mut h = harness("cat");

    assert!(h.pipeline.start().await?);
    h.pipeline.feed_audio(b"incomplete").await?;

    // The decode loop saw the bytes: a partial comes out.
    loop {
        match tokio::time::timeout(Duration::from_secs(5), h.events.recv())
            .await
            .expect("timed out waiting for a partial")
            .expect("event channel closed")
        {
            SessionEvent::Partial { partial } => {
                assert_eq!(partial, "incomplete");
                break;
            }
            _ => continue,
        }
    }

    assert!(h.pipeline.stop().await?);

    // stop() waits for the decode task to unwind, so nothing can trickle
    // out afterwards.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(drain(&mut h.events).is_empty());
    Ok(())
}

#[tokio::test]
async fn decode_fault_reports_error_and_leaves_session_running() -> Result<()> {
    let store = Arc::new(MemorySessionStore::new());
    let (tx, mut events) = mpsc::channel(64);
    let pipeline = TranscribePipeline::new(
        store.clone(),
        Arc::new(FailingEngine),
        transcoder("cat"),
        tx,
    );

    assert!(pipeline.start().await?);
    pipeline.feed_audio(b"boom\n").await?;

    let message = next_error(&mut events).await;
    assert!(message.contains("decode failed"), "got: {}", message);

    // The loop died but the session did not; an explicit stop still
    // finalizes the cycle.
    assert_eq!(pipeline.status().await, SessionStatus::Running);
    assert!(pipeline.stop().await?);

    let records = store.list().await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].final_transcript, "");
    Ok(())
}

#[tokio::test]
async fn broken_transcoder_input_fails_the_write_but_not_the_session() -> Result<()> {
    let h = harness("true");

    assert!(h.pipeline.start().await?);
    // Give the process time to exit so the pipe is really gone.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut failed = false;
    for _ in 0..8 {
        if h.pipeline.feed_audio(&[0u8; 65536]).await.is_err() {
            failed = true;
            break;
        }
    }
    assert!(failed, "writes into a dead transcoder must eventually fail");
    assert_eq!(h.pipeline.status().await, SessionStatus::Running);

    assert!(h.pipeline.stop().await?);
    assert_eq!(h.store.list().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn feed_audio_suspends_under_backpressure() -> Result<()> {
    // `sleep` never reads stdin, so the pipe fills and the writer must
    // suspend rather than drop or buffer without bound.
    let store = Arc::new(MemorySessionStore::new());
    let engine = Arc::new(LineEngine::new());
    let (tx, _events) = mpsc::channel(64);
    let pipeline = Arc::new(TranscribePipeline::new(
        store,
        engine,
        TranscodeConfig {
            command: "sleep".to_string(),
            args: vec!["5".to_string()],
            grace_ms: 100,
        },
        tx,
    ));

    assert!(pipeline.start().await?);

    let feeder = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            // Far more than a pipe buffer holds.
            pipeline.feed_audio(&vec![0u8; 4 * 1024 * 1024]).await
        })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!feeder.is_finished(), "the write should still be suspended");

    feeder.abort();
    Ok(())
}

#[tokio::test]
async fn scenario_one_utterance_end_to_end() -> Result<()> {
    let mut h = harness("cat");

    assert!(h.pipeline.start().await?);
    h.pipeline.feed_audio(b"testing one two\n").await?;
    assert_eq!(next_final(&mut h.events).await, "testing one two");
    assert!(h.pipeline.stop().await?);

    let records = h.store.list().await?;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.final_transcript, "testing one two");
    assert_eq!(record.word_count, 3);
    assert!(record.duration_seconds > 0.0);
    Ok(())
}
