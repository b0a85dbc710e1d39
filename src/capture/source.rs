use anyhow::{Context, Result};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::config::CaptureSettings;

/// Event pushed by a capture source.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// Freshly encoded bytes
    Data(Vec<u8>),
    /// The encoder process exited with the given code; no data follows
    Exited(Option<i32>),
}

/// Byte-stream producer with a controllable lifecycle.
///
/// Implementations wrap an external encoding process. Delivery is
/// push-driven: `start` hands back a channel that carries data events and
/// ends with a single `Exited` event. The `RUNNING -> EXITED` transition is
/// irreversible.
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Start the encoder and begin streaming its output.
    async fn start(&mut self) -> Result<mpsc::Receiver<SourceEvent>>;

    /// Signal the encoder to terminate. Safe to call once it has already
    /// exited.
    async fn stop(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Captures audio by spawning ffmpeg and reading raw container bytes from
/// its stdout pipe. stderr is drained into debug logs.
pub struct FfmpegSource {
    settings: CaptureSettings,
    child: Option<Arc<Mutex<Child>>>,
    running: Arc<AtomicBool>,
}

impl FfmpegSource {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            child: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn build_args(&self) -> Vec<String> {
        vec![
            "-f".into(),
            self.settings.input_format.clone(),
            "-i".into(),
            self.settings.input_source.clone(),
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ac".into(),
            self.settings.channels.to_string(),
            "-ar".into(),
            self.settings.sample_rate.to_string(),
            "-f".into(),
            "wav".into(),
            "pipe:1".into(),
        ]
    }
}

#[async_trait::async_trait]
impl CaptureSource for FfmpegSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<SourceEvent>> {
        let args = self.build_args();

        let mut child = Command::new(&self.settings.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn encoder: {}", self.settings.ffmpeg_path))?;

        let stdout = child
            .stdout
            .take()
            .context("Failed to capture encoder stdout")?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("ffmpeg: {}", line);
                }
            });
        }

        info!(
            "Encoder started: {} {}",
            self.settings.ffmpeg_path,
            args.join(" ")
        );

        let child = Arc::new(Mutex::new(child));
        self.child = Some(Arc::clone(&child));
        self.running.store(true, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(64);
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut buf = vec![0u8; 8192];

            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(SourceEvent::Data(buf[..n].to_vec())).await.is_err() {
                            // Receiver gone, stop reading
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Encoder stdout read failed: {}", e);
                        break;
                    }
                }
            }

            let code = match child.lock().await.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!("Failed to reap encoder process: {}", e);
                    None
                }
            };

            running.store(false, Ordering::SeqCst);
            info!("Encoder exited with code {:?}", code);
            let _ = tx.send(SourceEvent::Exited(code)).await;
        });

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(child) = &self.child {
            match child.lock().await.start_kill() {
                Ok(()) => info!("Sent kill signal to encoder"),
                // Already exited
                Err(e) => debug!("Encoder kill skipped: {}", e),
            }
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}
