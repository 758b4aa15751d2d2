// Recorder controller and actor loop
//
// The controller is the single owner of the live session. Every inbound
// event is queued onto one unbounded channel and drained by one spawned
// task, so no cross-event race can reach the slot table, the clock or the
// finalized-track list. Producers only ever enqueue.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::project::{
    output_path, render_playlist, render_project, write_output, PLAYLIST_EXTENSION,
    PROJECT_EXTENSION,
};
use super::session::Session;
use super::types::{RecorderConfig, RecorderError, RecorderEvent, RecorderNotice, SlotId};

/// Handle for enqueueing events into the recorder actor
#[derive(Clone)]
pub struct RecorderHandle {
    events: mpsc::UnboundedSender<RecorderEvent>,
    notices: broadcast::Sender<RecorderNotice>,
}

impl RecorderHandle {
    /// Enqueue one frame of interleaved samples for a channel slot
    pub fn frame(
        &self,
        slot: SlotId,
        name: String,
        addr: std::net::SocketAddr,
        channels: u16,
        samples: Vec<i16>,
    ) {
        self.send(RecorderEvent::Frame {
            slot,
            name,
            addr,
            channels,
            samples,
        });
    }

    pub fn client_disconnected(&self, slot: SlotId) {
        self.send(RecorderEvent::ClientDisconnected { slot });
    }

    pub fn restart_session(&self) {
        self.send(RecorderEvent::RestartSession);
    }

    pub fn stop_session(&self) {
        self.send(RecorderEvent::StopSession);
    }

    pub fn server_stopped(&self) {
        self.send(RecorderEvent::ServerStopped);
    }

    pub fn shutdown(&self) {
        self.send(RecorderEvent::Shutdown);
    }

    /// Subscribe to recorder notices (session-started signals)
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderNotice> {
        self.notices.subscribe()
    }

    fn send(&self, event: RecorderEvent) {
        if self.events.send(event).is_err() {
            warn!("recorder task is gone, event dropped");
        }
    }
}

/// Session recorder actor: `Idle` until frames arrive, `Recording` while a
/// session is live
pub struct RecorderController {
    config: RecorderConfig,
    session: Option<Session>,
    notices: broadcast::Sender<RecorderNotice>,
}

impl RecorderController {
    /// Validate the base directory and spawn the actor task
    pub fn spawn(config: RecorderConfig) -> Result<(RecorderHandle, JoinHandle<()>)> {
        config.validate()?;
        validate_base_dir(&config.base_directory)
            .context("recording base directory is unusable")?;

        let (tx, mut rx) = mpsc::unbounded_channel::<RecorderEvent>();
        let (notice_tx, _) = broadcast::channel(16);

        let mut controller = Self {
            config,
            session: None,
            notices: notice_tx.clone(),
        };

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let terminate = matches!(event, RecorderEvent::Shutdown);
                controller.dispatch(event);
                if terminate {
                    break;
                }
            }
            info!("recorder task finished");
        });

        Ok((
            RecorderHandle {
                events: tx,
                notices: notice_tx,
            },
            task,
        ))
    }

    /// Process one queued event
    fn dispatch(&mut self, event: RecorderEvent) {
        match event {
            RecorderEvent::Frame {
                slot,
                name,
                addr,
                channels,
                samples,
            } => {
                // Lazy session start: audio while idle opens a new session
                if self.session.is_none() {
                    self.start_session();
                }

                let frame_size = self.config.frame_size;
                if let Some(session) = self.session.as_mut() {
                    if let Err(e) =
                        session.on_frame(slot, &name, addr, channels, &samples, frame_size)
                    {
                        error!("unrecoverable session fault: {:#}", anyhow::Error::from(e));
                        self.end_session();
                    }
                }
            }
            RecorderEvent::ClientDisconnected { slot } => match self.session.as_mut() {
                Some(session) => {
                    if let Err(e) = session.disconnect(slot) {
                        error!("unrecoverable session fault: {:#}", anyhow::Error::from(e));
                        self.end_session();
                    }
                }
                None => warn!("slot {} disconnected but no session is live", slot),
            },
            RecorderEvent::RestartSession => {
                // Restart only applies while recording; idle stays idle
                if self.session.is_some() {
                    self.end_session();
                    self.start_session();
                }
            }
            RecorderEvent::StopSession | RecorderEvent::ServerStopped | RecorderEvent::Shutdown => {
                self.end_session();
            }
        }
    }

    fn start_session(&mut self) {
        match Session::new(
            &self.config.base_directory,
            self.config.channel_capacity,
            self.config.sample_rate,
        ) {
            Ok(session) => {
                info!("recording session started in {}", session.dir().display());
                let _ = self
                    .notices
                    .send(RecorderNotice::SessionStarted(session.dir().to_path_buf()));
                self.session = Some(session);
            }
            Err(e) => {
                error!("could not start session: {:#}", anyhow::Error::from(e));
            }
        }
    }

    /// Finalize every open slot and generate the project and playlist files
    fn end_session(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        if let Err(e) = session.end() {
            error!("session end left tracks unfinalized: {:#}", anyhow::Error::from(e));
        }

        let tracks = session.tracks();
        let name = session.name();
        let sample_rate = self.config.sample_rate;
        let frame_size = self.config.frame_size;

        let project = render_project(&tracks, sample_rate, frame_size);
        let project_path = output_path(session.dir(), &name, PROJECT_EXTENSION);
        if let Err(e) = write_output(&project_path, &project) {
            warn!("project file skipped: {}", e);
        }

        let playlist = render_playlist(&tracks, sample_rate, frame_size);
        let playlist_path = output_path(session.dir(), &name, PLAYLIST_EXTENSION);
        if let Err(e) = write_output(&playlist_path, &playlist) {
            warn!("playlist file skipped: {}", e);
        }

        info!(
            "session {} ended with {} finalized tracks",
            name,
            tracks.values().map(Vec::len).sum::<usize>()
        );
    }
}

/// Check that the base directory exists (creating it if needed), is a
/// directory, and is writable
fn validate_base_dir(path: &Path) -> Result<(), RecorderError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| RecorderError::Configuration {
            path: path.to_path_buf(),
            reason: format!("does not exist and could not be created: {}", e),
        })?;
    }

    let meta = fs::metadata(path).map_err(|e| RecorderError::Configuration {
        path: path.to_path_buf(),
        reason: format!("not accessible: {}", e),
    })?;

    if !meta.is_dir() {
        return Err(RecorderError::Configuration {
            path: path.to_path_buf(),
            reason: "exists but is not a directory".to_string(),
        });
    }
    if meta.permissions().readonly() {
        return Err(RecorderError::Configuration {
            path: path.to_path_buf(),
            reason: "is a directory but cannot be written to".to_string(),
        });
    }

    Ok(())
}
