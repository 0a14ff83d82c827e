use super::events::SessionEvent;
use super::state::{CycleState, SessionStatus};
use crate::config::TranscodeConfig;
use crate::recognizer::{Hypothesis, SpeechDecoder, SpeechEngine};
use crate::store::{SessionStore, SessionUpdate};
use crate::transcode::Transcoder;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::ChildStdout;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Bytes per read from the transcoder's PCM output.
const PCM_CHUNK_BYTES: usize = 4096;

/// One connection's transcription pipeline.
///
/// Owns the transcoder subprocess, the decoder for the current cycle, and
/// the session state. `start` and `stop` are idempotent; `feed_audio` is
/// valid only while running. A background task pulls PCM out of the
/// transcoder and feeds the decoder until EOF, a fault, or cancellation.
pub struct TranscribePipeline {
    store: Arc<dyn SessionStore>,
    engine: Arc<dyn SpeechEngine>,
    transcode: TranscodeConfig,
    events: mpsc::Sender<SessionEvent>,

    /// Serializes start/stop/feed against each other. Client-initiated and
    /// disconnect-initiated stops both funnel through this lock, which is
    /// what makes the `finalized` check-and-set atomic.
    inner: Mutex<Inner>,

    /// Final segments, space-joined. Written by the decode task while the
    /// cycle runs; read by `stop` only after that task has unwound.
    transcript: Arc<Mutex<String>>,
}

struct Inner {
    status: SessionStatus,
    cycle: CycleState,
    transcoder: Option<Transcoder>,
    decode_task: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl TranscribePipeline {
    pub fn new(
        store: Arc<dyn SessionStore>,
        engine: Arc<dyn SpeechEngine>,
        transcode: TranscodeConfig,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            store,
            engine,
            transcode,
            events,
            inner: Mutex::new(Inner {
                status: SessionStatus::Idle,
                cycle: CycleState::default(),
                transcoder: None,
                decode_task: None,
                cancel: CancellationToken::new(),
            }),
            transcript: Arc::new(Mutex::new(String::new())),
        }
    }

    pub async fn status(&self) -> SessionStatus {
        self.inner.lock().await.status
    }

    /// Start a new cycle: allocate a persistence record, spawn the
    /// transcoder, mint a decoder, and launch the decode loop. Returns
    /// `Ok(false)` without touching anything if a cycle is already active.
    pub async fn start(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;

        match inner.status {
            SessionStatus::Running | SessionStatus::Stopping => {
                info!("Start requested while pipeline active; ignoring");
                return Ok(false);
            }
            SessionStatus::Idle | SessionStatus::Stopped => {}
        }

        // Record ids exist only for cycles that actually start.
        let record_id = self
            .store
            .create(self.engine.name())
            .await
            .context("Failed to create session record")?;

        let mut transcoder = Transcoder::spawn(&self.transcode)?;
        let pcm = transcoder
            .take_output()
            .context("transcoder has no output stream")?;
        let decoder = self.engine.new_decoder()?;

        self.transcript.lock().await.clear();

        let cancel = CancellationToken::new();
        let decode_task = tokio::spawn(run_decode_loop(
            pcm,
            decoder,
            Arc::clone(&self.transcript),
            self.events.clone(),
            cancel.clone(),
        ));

        inner.status = SessionStatus::Running;
        inner.cycle = CycleState {
            record_id: Some(record_id),
            started: Some(Instant::now()),
            finalized: false,
        };
        inner.transcoder = Some(transcoder);
        inner.decode_task = Some(decode_task);
        inner.cancel = cancel;

        info!("Pipeline started (session {})", record_id);
        Ok(true)
    }

    /// Stop the current cycle: cancel the decode loop, wait for it to
    /// unwind, shut the transcoder down, and persist the summary exactly
    /// once. Returns `Ok(false)` if no cycle is running.
    pub async fn stop(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;

        if inner.status != SessionStatus::Running {
            return Ok(false);
        }
        inner.status = SessionStatus::Stopping;

        // The decode task must be fully unwound before the transcript is
        // read, so the summary never races an in-flight append.
        inner.cancel.cancel();
        if let Some(task) = inner.decode_task.take() {
            if let Err(e) = task.await {
                warn!("Decode task join failed: {}", e);
            }
        }

        if let Some(transcoder) = inner.transcoder.take() {
            if let Err(e) = transcoder
                .shutdown(Duration::from_millis(self.transcode.grace_ms))
                .await
            {
                // Teardown continues; the process handle is gone either way.
                warn!("Transcoder shutdown failed: {}", e);
            }
        }

        let mut persisted = Ok(());
        if !inner.cycle.finalized {
            inner.cycle.finalized = true;

            let final_transcript = self.transcript.lock().await.trim().to_string();
            let word_count = final_transcript.split_whitespace().count();
            let duration_seconds = inner
                .cycle
                .started
                .map(|t| t.elapsed().as_secs_f64())
                .unwrap_or(0.0);

            if let Some(id) = inner.cycle.record_id {
                persisted = self
                    .store
                    .update(
                        id,
                        SessionUpdate {
                            final_transcript,
                            word_count,
                            duration_seconds,
                            ended_at: Utc::now(),
                        },
                    )
                    .await;
            }
        }

        inner.status = SessionStatus::Stopped;
        info!("Pipeline stopped (session {:?})", inner.cycle.record_id);

        // In-memory teardown is already done; a failed write is reported to
        // the caller, not retried.
        persisted.context("Failed to persist session record")?;
        Ok(true)
    }

    /// Write one inbound audio frame to the transcoder, suspending until the
    /// pipe accepts it. Fails if no cycle is running or the input is broken;
    /// a broken input does not change the session status.
    pub async fn feed_audio(&self, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if !inner.status.is_running() {
            bail!("no active pipeline; send {{\"command\":\"start\"}} first");
        }

        let transcoder = inner
            .transcoder
            .as_mut()
            .context("transcoder input is closed")?;
        transcoder.write(bytes).await
    }
}

/// Background consumption loop for one cycle. Reads fixed-size PCM chunks
/// from the transcoder until EOF, feeds them to the decoder, and emits
/// partial/final events. Faults are reported as a single `error` event and
/// end the loop; cancellation ends it silently.
async fn run_decode_loop(
    mut pcm: ChildStdout,
    mut decoder: Box<dyn SpeechDecoder>,
    transcript: Arc<Mutex<String>>,
    events: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; PCM_CHUNK_BYTES];

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => return,
            read = pcm.read(&mut buf) => read,
        };

        let n = match read {
            Ok(0) => {
                info!("Transcoder output hit EOF; decode loop ending");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                emit(
                    &events,
                    &cancel,
                    SessionEvent::error(format!("PCM read failed: {}", e)),
                )
                .await;
                return;
            }
        };

        match decoder.accept_pcm(&buf[..n]) {
            Ok(Hypothesis::Final(text)) => {
                if text.is_empty() {
                    continue;
                }
                {
                    let mut acc = transcript.lock().await;
                    if !acc.is_empty() {
                        acc.push(' ');
                    }
                    acc.push_str(&text);
                }
                if !emit(&events, &cancel, SessionEvent::Final { text }).await {
                    return;
                }
            }
            Ok(Hypothesis::Partial(partial)) => {
                // Empty partials go out as-is; the client decides what to
                // show.
                if !emit(&events, &cancel, SessionEvent::Partial { partial }).await {
                    return;
                }
            }
            Err(e) => {
                emit(
                    &events,
                    &cancel,
                    SessionEvent::error(format!("decode failed: {}", e)),
                )
                .await;
                return;
            }
        }
    }
}

/// Send an event unless cancellation has been observed. Returns false once
/// the loop must stop emitting.
async fn emit(
    events: &mpsc::Sender<SessionEvent>,
    cancel: &CancellationToken,
    event: SessionEvent,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = events.send(event) => sent.is_ok(),
    }
}
