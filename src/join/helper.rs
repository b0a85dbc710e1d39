use anyhow::{Context, Result};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, info};

use super::{JoinedMeeting, MeetingJoiner};
use crate::config::JoinConfig;

/// Joins meetings by running an external browser-automation helper.
///
/// The helper receives the meeting link as its last argument, prints a
/// `joined` line on stdout once it is in the meeting, stays alive for the
/// meeting's duration and exits when the meeting ends. Liveness of the
/// meeting is therefore liveness of the helper process.
pub struct HelperJoiner {
    config: JoinConfig,
}

impl HelperJoiner {
    pub fn new(config: JoinConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl MeetingJoiner for HelperJoiner {
    async fn join(&self, meeting_link: &str) -> Result<Arc<dyn JoinedMeeting>> {
        info!("Launching join helper for {}", meeting_link);

        let mut child = Command::new(&self.config.helper_command)
            .args(&self.config.helper_args)
            .arg(meeting_link)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to launch join helper: {}",
                    self.config.helper_command
                )
            })?;

        let stdout = child
            .stdout
            .take()
            .context("Failed to capture join helper stdout")?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("join helper: {}", line);
                }
            });
        }

        // Drain stdout for the helper's lifetime, flagging the ready line
        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(async move {
            let mut ready_tx = Some(ready_tx);
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("join helper: {}", line);
                if line.trim().eq_ignore_ascii_case("joined") {
                    if let Some(tx) = ready_tx.take() {
                        let _ = tx.send(());
                    }
                }
            }
        });

        let wait = Duration::from_secs(self.config.ready_timeout_secs);
        match timeout(wait, ready_rx).await {
            Ok(Ok(())) => info!("Join helper reports meeting joined"),
            Ok(Err(_)) => {
                let _ = child.start_kill();
                anyhow::bail!("Join helper exited before joining the meeting");
            }
            Err(_) => {
                let _ = child.start_kill();
                anyhow::bail!(
                    "Join helper did not report joined within {}s",
                    self.config.ready_timeout_secs
                );
            }
        }

        Ok(Arc::new(HelperMeeting {
            child: Mutex::new(child),
        }))
    }
}

struct HelperMeeting {
    child: Mutex<Child>,
}

#[async_trait::async_trait]
impl JoinedMeeting for HelperMeeting {
    async fn is_alive(&self) -> Result<bool> {
        let mut child = self.child.lock().await;
        let status = child.try_wait().context("Failed to poll join helper")?;
        Ok(status.is_none())
    }

    async fn leave(&self) -> Result<()> {
        let mut child = self.child.lock().await;

        if child
            .try_wait()
            .context("Failed to poll join helper")?
            .is_some()
        {
            debug!("Join helper already exited");
            return Ok(());
        }

        info!("Closing meeting (terminating join helper)");
        child.start_kill().context("Failed to terminate join helper")?;
        child.wait().await.context("Failed to reap join helper")?;

        Ok(())
    }
}
