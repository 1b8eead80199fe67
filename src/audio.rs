use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::runtime::AppEvent;

pub const DEFAULT_PLAYER: &str = "mpv --no-video --really-quiet";

const WATCH_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no player command configured")]
    NoPlayer,
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Playback of one verse at a time. Natural end of playback is reported as
/// [`AppEvent::AudioFinished`] carrying the generation it was started with.
pub trait AudioOutput {
    fn load(&mut self, url: &str);
    fn play(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self);
    /// Start the loaded verse again from time zero.
    fn restart(&mut self) -> Result<(), AudioError>;
    fn stop(&mut self);
    fn generation(&self) -> u64;
}

#[derive(Debug)]
struct Playing {
    child: Arc<Mutex<Child>>,
    stopped: Arc<AtomicBool>,
    paused: bool,
}

impl Playing {
    fn kill(self) {
        self.stopped.store(true, Ordering::SeqCst);
        if self.paused {
            signal_running(&self.child, Signal::Resume);
        }
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn exited(&self) -> bool {
        self.child
            .lock()
            .map(|mut child| matches!(child.try_wait(), Ok(Some(_))))
            .unwrap_or(true)
    }
}

/// Signal the player only while it is still running, so a reaped pid is never
/// targeted. `None` means the process is gone.
fn signal_running(child: &Mutex<Child>, sig: Signal) -> Option<bool> {
    let mut child = child.lock().ok()?;
    match child.try_wait() {
        Ok(None) => Some(signal(&child, sig)),
        _ => None,
    }
}

enum Signal {
    Pause,
    Resume,
}

#[cfg(unix)]
fn signal(child: &Child, sig: Signal) -> bool {
    let signum = match sig {
        Signal::Pause => libc::SIGSTOP,
        Signal::Resume => libc::SIGCONT,
    };
    unsafe { libc::kill(child.id() as libc::pid_t, signum) == 0 }
}

#[cfg(not(unix))]
fn signal(_child: &Child, _sig: Signal) -> bool {
    false
}

/// Plays verse audio by running an external player, one process per play.
#[derive(Debug)]
pub struct ProcessAudio {
    program: String,
    args: Vec<String>,
    events: Sender<AppEvent>,
    url: Option<String>,
    current: Option<Playing>,
    generation: u64,
}

impl ProcessAudio {
    pub fn new(player: &str, events: Sender<AppEvent>) -> Self {
        let mut parts = player.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
            events,
            url: None,
            current: None,
            generation: 0,
        }
    }

    fn spawn(&mut self) -> Result<(), AudioError> {
        if self.program.is_empty() {
            return Err(AudioError::NoPlayer);
        }
        let Some(url) = self.url.clone() else {
            return Ok(());
        };

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AudioError::Spawn {
                command: self.program.clone(),
                source,
            })?;

        self.generation += 1;
        let generation = self.generation;
        debug!("playing {url} (generation {generation})");

        let child = Arc::new(Mutex::new(child));
        let stopped = Arc::new(AtomicBool::new(false));
        let watched = Arc::clone(&child);
        let watch_stopped = Arc::clone(&stopped);
        let tx = self.events.clone();

        thread::spawn(move || loop {
            if watch_stopped.load(Ordering::SeqCst) {
                break;
            }
            let status = match watched.lock() {
                Ok(mut child) => child.try_wait(),
                Err(_) => break,
            };
            match status {
                Ok(Some(status)) => {
                    if !watch_stopped.load(Ordering::SeqCst) {
                        if !status.success() {
                            warn!("player exited with {status}");
                        }
                        let _ = tx.send(AppEvent::AudioFinished { generation });
                    }
                    break;
                }
                Ok(None) => thread::sleep(WATCH_INTERVAL),
                Err(err) => {
                    warn!("lost track of player process: {err}");
                    break;
                }
            }
        });

        self.current = Some(Playing {
            child,
            stopped,
            paused: false,
        });
        Ok(())
    }
}

impl AudioOutput for ProcessAudio {
    fn load(&mut self, url: &str) {
        self.stop();
        self.url = Some(url.to_string());
    }

    fn play(&mut self) -> Result<(), AudioError> {
        let Some(playing) = self.current.as_mut() else {
            return self.spawn();
        };

        // a verse that already ran to the end is played again from the start
        if !playing.paused {
            return if playing.exited() {
                self.restart()
            } else {
                Ok(())
            };
        }

        match signal_running(&playing.child, Signal::Resume) {
            Some(true) => {
                playing.paused = false;
                Ok(())
            }
            _ => self.restart(),
        }
    }

    fn pause(&mut self) {
        let Some(playing) = self.current.as_mut() else {
            return;
        };
        if playing.paused {
            return;
        }
        match signal_running(&playing.child, Signal::Pause) {
            Some(true) => playing.paused = true,
            // exited or unsignallable: nothing left to hold, `play` respawns
            _ => self.stop(),
        }
    }

    fn restart(&mut self) -> Result<(), AudioError> {
        self.stop();
        self.spawn()
    }

    fn stop(&mut self) {
        if let Some(playing) = self.current.take() {
            playing.kill();
        }
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for ProcessAudio {
    fn drop(&mut self) {
        self.stop();
    }
}
