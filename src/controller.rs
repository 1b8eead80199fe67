use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::feedback::FeedbackRequest;
use crate::session::{self, PlaybackPosition, SessionConfig, Transition};

/// Pause inserted between the end of a verse and the next automatic transition.
pub const DEFAULT_POST_VERSE_DELAY: Duration = Duration::from_millis(1000);

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    Completed,
    EndedByUser,
    ContentUnavailable(String),
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::Completed => "completed",
            EndReason::EndedByUser => "ended",
            EndReason::ContentUnavailable(_) => "content_unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub surah_id: u32,
    pub start_ayah: u32,
    pub end_ayah: u32,
    pub ayah_repetitions: u32,
    pub surah_repetitions: u32,
    pub elapsed: Duration,
    /// Mistakes marked on the verse that was playing when the session ended.
    pub final_mistakes: u32,
    pub total_mistakes: u32,
    pub verses_played: u32,
    pub reason: EndReason,
}

/// Outbound notifications for the collaborators around the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A new verse must be fetched and loaded.
    PositionChanged { surah_id: u32, ayah: u32 },
    /// Play the same verse again from time zero.
    Restart,
    Playback { playing: bool },
    FeedbackRequested(FeedbackRequest),
    Ended(SessionSummary),
}

/// Handle for a deferred transition. Only the handle currently stored in the
/// session may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    token: u64,
    due: Instant,
}

impl PendingTransition {
    pub fn due(&self) -> Instant {
        self.due
    }
}

#[derive(Debug)]
struct ActiveSession {
    config: SessionConfig,
    position: PlaybackPosition,
    started_at: Instant,
    pending: Option<PendingTransition>,
    total_mistakes: u32,
    verses_played: u32,
}

#[derive(Debug)]
pub struct SessionController {
    session: Option<ActiveSession>,
    autoplay: bool,
    feedback_enabled: bool,
    post_verse_delay: Duration,
    user_id: String,
    next_token: u64,
    events: VecDeque<SessionEvent>,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(true, DEFAULT_POST_VERSE_DELAY)
    }
}

impl SessionController {
    pub fn new(autoplay: bool, post_verse_delay: Duration) -> Self {
        Self {
            session: None,
            autoplay,
            feedback_enabled: false,
            post_verse_delay,
            user_id: "local".to_string(),
            next_token: 0,
            events: VecDeque::new(),
        }
    }

    pub fn with_feedback(mut self, user_id: impl Into<String>) -> Self {
        self.feedback_enabled = true;
        self.user_id = user_id.into();
        self
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn config(&self) -> Option<&SessionConfig> {
        self.session.as_ref().map(|s| &s.config)
    }

    pub fn position(&self) -> Option<&PlaybackPosition> {
        self.session.as_ref().map(|s| &s.position)
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        self.session.as_ref().and_then(|s| s.pending)
    }

    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    /// `(surah, ayah)` the collaborators should currently be showing.
    pub fn current_key(&self) -> Option<(u32, u32)> {
        self.session
            .as_ref()
            .map(|s| (s.config.surah_id, s.position.current_ayah))
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.session
            .as_ref()
            .map(|s| now.saturating_duration_since(s.started_at))
            .unwrap_or_default()
    }

    /// Drain queued events in the order they were produced.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    pub fn start(&mut self, config: SessionConfig, now: Instant) -> PlaybackPosition {
        let (config, position) = session::start(config);
        info!(
            "session start: surah {} ayahs {}-{} x{} passes x{}",
            config.surah_id,
            config.start_ayah,
            config.end_ayah,
            config.ayah_repetitions,
            config.surah_repetitions
        );

        self.events.clear();
        self.session = Some(ActiveSession {
            config,
            position,
            started_at: now,
            pending: None,
            total_mistakes: 0,
            verses_played: 1,
        });
        self.events.push_back(SessionEvent::PositionChanged {
            surah_id: config.surah_id,
            ayah: position.current_ayah,
        });
        self.events
            .push_back(SessionEvent::Playback { playing: true });
        position
    }

    pub fn toggle_play_pause(&mut self) {
        self.cancel_pending();
        let Some(s) = self.session.as_mut() else {
            return;
        };
        s.position = session::toggle_play_pause(s.position);
        self.events.push_back(SessionEvent::Playback {
            playing: s.position.is_playing,
        });
    }

    pub fn go_next(&mut self, now: Instant) {
        self.cancel_pending();
        let Some(s) = self.session.as_ref() else {
            return;
        };
        let transition = session::go_next(s.position, &s.config, self.autoplay);
        self.apply_advance(transition, now);
    }

    pub fn go_previous(&mut self) {
        self.cancel_pending();
        let Some(s) = self.session.as_mut() else {
            return;
        };
        let previous = session::go_previous(s.position, &s.config);
        if previous == s.position {
            debug!("previous ignored at session start");
            return;
        }
        s.position = previous;
        s.verses_played += 1;
        self.events.push_back(SessionEvent::PositionChanged {
            surah_id: s.config.surah_id,
            ayah: previous.current_ayah,
        });
    }

    pub fn mark_mistake(&mut self) {
        let Some(s) = self.session.as_mut() else {
            return;
        };
        s.position = session::mark_mistake(s.position);
        s.total_mistakes += 1;
    }

    pub fn repeat_current(&mut self) {
        self.cancel_pending();
        if self.session.is_some() {
            self.events.push_back(SessionEvent::Restart);
        }
    }

    pub fn set_autoplay(&mut self, enabled: bool) {
        self.autoplay = enabled;
        if !enabled {
            self.cancel_pending();
        }
    }

    pub fn set_ayah_repetitions(&mut self, target: u32) {
        let Some(s) = self.session.as_mut() else {
            return;
        };
        let target = target.max(1);
        s.config.ayah_repetitions = target;
        s.position.current_ayah_repetition = s.position.current_ayah_repetition.min(target);
    }

    pub fn set_surah_repetitions(&mut self, target: u32) {
        let Some(s) = self.session.as_mut() else {
            return;
        };
        let target = target.max(1);
        s.config.surah_repetitions = target;
        s.position.current_surah_repetition = s.position.current_surah_repetition.min(target);
    }

    /// The audio collaborator reports that the current verse finished playing.
    pub fn audio_finished(&mut self, now: Instant) {
        let autoplay = self.autoplay;
        let delay = self.post_verse_delay;
        let token = self.next_token;
        let Some(s) = self.session.as_mut() else {
            return;
        };

        if autoplay {
            self.next_token += 1;
            s.pending = Some(PendingTransition {
                token,
                due: now + delay,
            });
        } else {
            s.pending = None;
            if s.position.is_playing {
                s.position.is_playing = false;
                self.events
                    .push_back(SessionEvent::Playback { playing: false });
            }
        }
    }

    /// Fire the pending transition once it is due. Returns true if it fired.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(s) = self.session.as_mut() else {
            return false;
        };
        match s.pending {
            Some(pending) if pending.due <= now => {
                s.pending = None;
            }
            _ => return false,
        }

        let transition = session::on_audio_finished(s.position, &s.config, self.autoplay);
        match transition {
            Transition::Next(next) if next.current_ayah == s.position.current_ayah
                && next.current_surah_repetition == s.position.current_surah_repetition =>
            {
                let was_playing = s.position.is_playing;
                s.position = next;
                self.events.push_back(SessionEvent::Restart);
                if next.is_playing != was_playing {
                    self.events.push_back(SessionEvent::Playback {
                        playing: next.is_playing,
                    });
                }
            }
            _ => self.apply_advance(transition, now),
        }
        true
    }

    /// Cancel a handle if it is the one currently registered.
    pub fn cancel(&mut self, handle: PendingTransition) {
        if let Some(s) = self.session.as_mut() {
            if s.pending.map(|p| p.token) == Some(handle.token) {
                s.pending = None;
            }
        }
    }

    pub fn end_session(&mut self, now: Instant) {
        self.finish(EndReason::EndedByUser, now);
    }

    /// Verse content could not be retrieved. The session cannot continue.
    pub fn content_failed(&mut self, message: impl Into<String>, now: Instant) {
        let message = message.into();
        warn!("content fetch failed, ending session: {message}");
        self.finish(EndReason::ContentUnavailable(message), now);
    }

    fn cancel_pending(&mut self) {
        if let Some(s) = self.session.as_mut() {
            s.pending = None;
        }
    }

    fn apply_advance(&mut self, transition: Transition, now: Instant) {
        let Some(s) = self.session.as_mut() else {
            return;
        };
        let left = s.position;

        if self.feedback_enabled {
            let reps = left.current_ayah_repetition.max(1);
            self.events
                .push_back(SessionEvent::FeedbackRequested(FeedbackRequest {
                    user_id: self.user_id.clone(),
                    surah_no: s.config.surah_id,
                    ayah_no: left.current_ayah,
                    repetition_count: left.current_ayah_repetition,
                    error_rate: (left.mistake_count as f64 / reps as f64).min(1.0),
                }));
        }

        match transition {
            Transition::Next(next) => {
                s.position = next;
                s.verses_played += 1;
                self.events.push_back(SessionEvent::PositionChanged {
                    surah_id: s.config.surah_id,
                    ayah: next.current_ayah,
                });
                if next.is_playing != left.is_playing {
                    self.events.push_back(SessionEvent::Playback {
                        playing: next.is_playing,
                    });
                }
            }
            Transition::Complete => self.finish(EndReason::Completed, now),
        }
    }

    fn finish(&mut self, reason: EndReason, now: Instant) {
        let Some(s) = self.session.take() else {
            return;
        };
        let summary = SessionSummary {
            surah_id: s.config.surah_id,
            start_ayah: s.config.start_ayah,
            end_ayah: s.config.end_ayah,
            ayah_repetitions: s.config.ayah_repetitions,
            surah_repetitions: s.config.surah_repetitions,
            elapsed: now.saturating_duration_since(s.started_at),
            final_mistakes: s.position.mistake_count,
            total_mistakes: s.total_mistakes,
            verses_played: s.verses_played,
            reason,
        };
        info!(
            "session end ({}): {}s, {} mistakes",
            summary.reason.as_str(),
            summary.elapsed.as_secs(),
            summary.total_mistakes
        );
        self.events
            .push_back(SessionEvent::Playback { playing: false });
        self.events.push_back(SessionEvent::Ended(summary));
    }
}
