use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{error, info, warn};

use crate::audio::AudioOutput;
use crate::config::Config;
use crate::content::{self, AyahData, ContentSource};
use crate::controller::{EndReason, SessionController, SessionEvent, SessionSummary};
use crate::feedback::{FeedbackProvider, ProgressFeedback};
use crate::runtime::AppEvent;
use crate::session::SessionConfig;
use crate::stats::{SessionRecord, StatsDb};
use crate::surahs::{self, SurahInfo, SURAHS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Settings,
    Player,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SettingsField {
    Surah,
    #[strum(to_string = "Starting Ayah")]
    StartAyah,
    #[strum(to_string = "Ending Ayah")]
    EndAyah,
    #[strum(to_string = "Ayah Repetitions")]
    AyahRepetitions,
    #[strum(to_string = "Surah Repetitions")]
    SurahRepetitions,
}

impl SettingsField {
    pub const ALL: [SettingsField; 5] = [
        SettingsField::Surah,
        SettingsField::StartAyah,
        SettingsField::EndAyah,
        SettingsField::AyahRepetitions,
        SettingsField::SurahRepetitions,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }
}

/// Values edited on the settings screen before a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    pub surah_index: usize,
    pub start_ayah: u32,
    pub end_ayah: u32,
    pub ayah_repetitions: u32,
    pub surah_repetitions: u32,
    pub selected: SettingsField,
}

impl SettingsForm {
    pub fn from_config(config: &Config) -> Self {
        let session = config.session_config();
        Self {
            surah_index: surahs::index_of(session.surah_id),
            start_ayah: session.start_ayah,
            end_ayah: session.end_ayah,
            ayah_repetitions: session.ayah_repetitions,
            surah_repetitions: session.surah_repetitions,
            selected: SettingsField::Surah,
        }
    }

    pub fn surah(&self) -> &'static SurahInfo {
        &SURAHS[self.surah_index.min(SURAHS.len() - 1)]
    }

    pub fn select_next(&mut self) {
        let idx = (self.selected.index() + 1) % SettingsField::ALL.len();
        self.selected = SettingsField::ALL[idx];
    }

    pub fn select_previous(&mut self) {
        let len = SettingsField::ALL.len();
        let idx = (self.selected.index() + len - 1) % len;
        self.selected = SettingsField::ALL[idx];
    }

    /// Nudge the selected field up (`delta > 0`) or down.
    pub fn adjust(&mut self, delta: i32) {
        let total = self.surah().total_ayahs;
        match self.selected {
            SettingsField::Surah => {
                let len = SURAHS.len() as i32;
                self.surah_index = (self.surah_index as i32 + delta).rem_euclid(len) as usize;
                self.start_ayah = 1;
                self.end_ayah = self.surah().total_ayahs;
            }
            SettingsField::StartAyah => {
                self.start_ayah = step(self.start_ayah, delta, 1, total);
                if self.start_ayah > self.end_ayah {
                    self.end_ayah = self.start_ayah;
                }
            }
            SettingsField::EndAyah => {
                self.end_ayah = step(self.end_ayah, delta, self.start_ayah, total);
            }
            SettingsField::AyahRepetitions => {
                self.ayah_repetitions = step(self.ayah_repetitions, delta, 1, u32::MAX);
            }
            SettingsField::SurahRepetitions => {
                self.surah_repetitions = step(self.surah_repetitions, delta, 1, u32::MAX);
            }
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        let surah = self.surah();
        SessionConfig {
            surah_id: surah.id,
            total_ayahs_in_surah: surah.total_ayahs,
            start_ayah: self.start_ayah,
            end_ayah: self.end_ayah,
            ayah_repetitions: self.ayah_repetitions,
            surah_repetitions: self.surah_repetitions,
        }
    }
}

fn step(value: u32, delta: i32, min: u32, max: u32) -> u32 {
    let next = value as i64 + delta as i64;
    next.clamp(min as i64, max as i64) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub text: String,
}

impl Notice {
    fn error(title: &str, text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: title.to_string(),
            text: text.into(),
        }
    }

    fn info(title: &str, text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            title: title.to_string(),
            text: text.into(),
        }
    }
}

/// The things the app talks to but does not own the logic of.
pub struct Collaborators {
    pub audio: Box<dyn AudioOutput>,
    pub content: Arc<dyn ContentSource>,
    pub feedback: Option<Arc<dyn FeedbackProvider>>,
    pub stats: Option<StatsDb>,
}

pub struct App {
    pub state: AppState,
    pub form: SettingsForm,
    pub controller: SessionController,
    pub ayah: Option<AyahData>,
    pub loading: bool,
    pub feedback: Option<ProgressFeedback>,
    pub notice: Option<Notice>,
    pub last_summary: Option<SessionSummary>,
    config: Config,
    audio: Box<dyn AudioOutput>,
    content: Arc<dyn ContentSource>,
    feedback_provider: Option<Arc<dyn FeedbackProvider>>,
    stats: Option<StatsDb>,
    events: Sender<AppEvent>,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config, collaborators: Collaborators, events: Sender<AppEvent>) -> Self {
        let controller = Self::make_controller(&config, collaborators.feedback.is_some());
        Self {
            state: AppState::Settings,
            form: SettingsForm::from_config(&config),
            controller,
            ayah: None,
            loading: false,
            feedback: None,
            notice: None,
            last_summary: None,
            config,
            audio: collaborators.audio,
            content: collaborators.content,
            feedback_provider: collaborators.feedback,
            stats: collaborators.stats,
            events,
            should_quit: false,
        }
    }

    fn make_controller(config: &Config, feedback: bool) -> SessionController {
        let controller = SessionController::new(
            config.autoplay,
            Duration::from_millis(config.post_verse_delay_ms),
        );
        if feedback {
            controller.with_feedback(config.user_id.clone())
        } else {
            controller
        }
    }

    /// Preferences as they stand now, including edits made in the UI.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn surah(&self) -> Option<&'static SurahInfo> {
        self.controller
            .config()
            .and_then(|cfg| surahs::find(cfg.surah_id))
    }

    pub fn handle_event(&mut self, event: AppEvent, now: Instant) {
        match event {
            AppEvent::Tick => {
                if self.controller.poll(now) {
                    self.dispatch();
                }
            }
            AppEvent::Resize => {}
            AppEvent::Key(key) => self.handle_key(key, now),
            AppEvent::AudioFinished { generation } => {
                if generation == self.audio.generation() {
                    self.controller.audio_finished(now);
                    self.dispatch();
                }
            }
            AppEvent::ContentLoaded {
                surah,
                ayah,
                result,
            } => self.on_content_loaded(surah, ayah, result, now),
            AppEvent::FeedbackReady(result) => match result {
                Ok(feedback) => self.feedback = Some(feedback),
                Err(err) => {
                    warn!("feedback unavailable: {err}");
                    self.notice = Some(Notice::error("Feedback unavailable", err));
                }
            },
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit(now);
            return;
        }

        match self.state {
            AppState::Settings => match key.code {
                KeyCode::Up => self.form.select_previous(),
                KeyCode::Down | KeyCode::Tab => self.form.select_next(),
                KeyCode::Left => self.form.adjust(-1),
                KeyCode::Right => self.form.adjust(1),
                KeyCode::PageDown => self.form.adjust(-10),
                KeyCode::PageUp => self.form.adjust(10),
                KeyCode::Enter => self.start_session(now),
                KeyCode::Esc | KeyCode::Char('q') => self.quit(now),
                _ => {}
            },
            AppState::Player => {
                self.notice = None;
                match key.code {
                    KeyCode::Char(' ') => self.controller.toggle_play_pause(),
                    KeyCode::Right | KeyCode::Char('n') => self.controller.go_next(now),
                    KeyCode::Left | KeyCode::Char('p') => self.controller.go_previous(),
                    KeyCode::Char('r') => self.controller.repeat_current(),
                    KeyCode::Char('m') => self.controller.mark_mistake(),
                    KeyCode::Char('a') => {
                        let enabled = !self.controller.autoplay();
                        self.controller.set_autoplay(enabled);
                        self.config.autoplay = enabled;
                    }
                    KeyCode::Char('+') | KeyCode::Char('=') => self.adjust_ayah_reps(1),
                    KeyCode::Char('-') => self.adjust_ayah_reps(-1),
                    KeyCode::Char(']') => self.adjust_surah_reps(1),
                    KeyCode::Char('[') => self.adjust_surah_reps(-1),
                    KeyCode::Char('e') => self.controller.end_session(now),
                    KeyCode::Esc | KeyCode::Char('q') => self.quit(now),
                    _ => {}
                }
                self.dispatch();
            }
            AppState::Summary => match key.code {
                KeyCode::Enter => {
                    self.state = AppState::Settings;
                    self.notice = None;
                }
                KeyCode::Esc | KeyCode::Char('q') => self.quit(now),
                _ => {}
            },
        }
    }

    pub fn start_session(&mut self, now: Instant) {
        let session = self.form.session_config();
        self.config.surah_id = session.surah_id;
        self.config.start_ayah = session.start_ayah;
        self.config.end_ayah = Some(session.end_ayah);
        self.config.ayah_repetitions = session.ayah_repetitions;
        self.config.surah_repetitions = session.surah_repetitions;

        self.ayah = None;
        self.feedback = None;
        self.notice = None;
        self.last_summary = None;
        self.state = AppState::Player;
        self.controller.start(session, now);
        self.dispatch();
    }

    fn adjust_ayah_reps(&mut self, delta: i32) {
        if let Some(cfg) = self.controller.config() {
            let target = step(cfg.ayah_repetitions, delta, 1, u32::MAX);
            self.controller.set_ayah_repetitions(target);
        }
    }

    fn adjust_surah_reps(&mut self, delta: i32) {
        if let Some(cfg) = self.controller.config() {
            let target = step(cfg.surah_repetitions, delta, 1, u32::MAX);
            self.controller.set_surah_repetitions(target);
        }
    }

    fn quit(&mut self, now: Instant) {
        if self.controller.is_active() {
            self.controller.end_session(now);
            self.dispatch();
        }
        self.audio.stop();
        self.should_quit = true;
    }

    fn is_playing(&self) -> bool {
        self.controller.position().is_some_and(|p| p.is_playing)
    }

    /// Hand every queued controller event to the collaborator responsible for it.
    /// Handlers may queue more events (a failed play pauses the session), so
    /// keep draining until the queue is empty.
    fn dispatch(&mut self) {
        loop {
            let events = self.controller.drain_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.apply(event);
            }
        }
    }

    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::PositionChanged { surah_id, ayah } => {
                self.audio.stop();
                self.ayah = None;
                self.loading = true;
                self.fetch(surah_id, ayah);
            }
            SessionEvent::Restart => {
                if self.loading {
                    return;
                }
                if let Err(err) = self.audio.restart() {
                    self.audio_failed(err.to_string());
                } else if !self.is_playing() {
                    self.audio.pause();
                }
            }
            SessionEvent::Playback { playing } => {
                if !playing {
                    self.audio.pause();
                } else if !self.loading {
                    if let Err(err) = self.audio.play() {
                        self.audio_failed(err.to_string());
                    }
                }
            }
            SessionEvent::FeedbackRequested(request) => {
                if let Some(provider) = self.feedback_provider.clone() {
                    let tx = self.events.clone();
                    thread::spawn(move || {
                        let result = provider.request(&request).map_err(|e| e.to_string());
                        let _ = tx.send(AppEvent::FeedbackReady(result));
                    });
                }
            }
            SessionEvent::Ended(summary) => self.on_session_end(summary),
        }
    }

    fn audio_failed(&mut self, message: String) {
        error!("audio playback failed: {message}");
        self.notice = Some(Notice::error("Audio error", message));
        if self.is_playing() {
            self.controller.toggle_play_pause();
        }
    }

    fn fetch(&self, surah_id: u32, ayah: u32) {
        let Some(surah) = surahs::find(surah_id).cloned() else {
            let _ = self.events.send(AppEvent::ContentLoaded {
                surah: surah_id,
                ayah,
                result: Err(format!("unknown surah {surah_id}")),
            });
            return;
        };
        let source = Arc::clone(&self.content);
        let tx = self.events.clone();
        thread::spawn(move || {
            let result = source.fetch_ayah(&surah, ayah).map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::ContentLoaded {
                surah: surah.id,
                ayah,
                result,
            });
        });
    }

    fn on_content_loaded(
        &mut self,
        surah: u32,
        ayah: u32,
        result: Result<AyahData, String>,
        now: Instant,
    ) {
        if self.controller.current_key() != Some((surah, ayah)) {
            return;
        }

        match result {
            Ok(data) => {
                self.ayah = Some(data);
                self.loading = false;
                self.audio.load(&content::audio_url(surah, ayah));
                if self.is_playing() {
                    if let Err(err) = self.audio.play() {
                        self.audio_failed(err.to_string());
                        self.dispatch();
                    }
                }
            }
            Err(err) => {
                let name = surahs::find(surah).map_or("?", |s| s.english_name);
                self.notice = Some(Notice::error(
                    "API Error",
                    format!("Could not fetch Ayah {ayah} of Surah {name}."),
                ));
                self.controller.content_failed(err, now);
                self.dispatch();
                self.loading = false;
            }
        }
    }

    fn on_session_end(&mut self, summary: SessionSummary) {
        self.audio.stop();
        self.loading = false;
        self.ayah = None;

        if let Some(stats) = &self.stats {
            let record = SessionRecord::from_summary(&summary, Local::now());
            if let Err(err) = stats.record_session(&record) {
                warn!("failed to record session: {err}");
            }
        }

        if summary.reason == EndReason::Completed {
            self.notice = Some(Notice::info(
                "Session Complete!",
                "Masha'Allah! You have completed your memorization session.",
            ));
        }
        info!(
            "summary: {} verses, {} mistakes",
            summary.verses_played, summary.total_mistakes
        );
        self.last_summary = Some(summary);
        self.state = AppState::Summary;
    }
}
