//! Repetition/playback state machine.
//!
//! Everything in here is pure: each transition takes the current position and
//! config by value/reference and hands back the next position. The
//! [`crate::controller::SessionController`] owns the live state and decides when
//! these run.

/// Settings a session is started with. Only the repetition targets may change
/// while the session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub surah_id: u32,
    pub total_ayahs_in_surah: u32,
    pub start_ayah: u32,
    pub end_ayah: u32,
    pub ayah_repetitions: u32,
    pub surah_repetitions: u32,
}

impl SessionConfig {
    /// Clamp the range into `[1, total_ayahs_in_surah]` with `start <= end` and
    /// both repetition targets to at least 1.
    pub fn clamped(self) -> Self {
        let total = self.total_ayahs_in_surah.max(1);
        let start_ayah = self.start_ayah.clamp(1, total);
        let end_ayah = self.end_ayah.clamp(start_ayah, total);

        Self {
            surah_id: self.surah_id,
            total_ayahs_in_surah: total,
            start_ayah,
            end_ayah,
            ayah_repetitions: self.ayah_repetitions.max(1),
            surah_repetitions: self.surah_repetitions.max(1),
        }
    }

    /// Number of verses in the configured range.
    pub fn range_len(&self) -> u32 {
        self.end_ayah - self.start_ayah + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackPosition {
    pub current_ayah: u32,
    pub current_ayah_repetition: u32,
    pub current_surah_repetition: u32,
    pub is_playing: bool,
    pub mistake_count: u32,
}

impl PlaybackPosition {
    fn initial(config: &SessionConfig) -> Self {
        Self {
            current_ayah: config.start_ayah,
            current_ayah_repetition: 1,
            current_surah_repetition: 1,
            is_playing: true,
            mistake_count: 0,
        }
    }

    /// True at the very first verse of the first pass, where `go_previous`
    /// refuses to move.
    pub fn at_session_start(&self, config: &SessionConfig) -> bool {
        self.current_ayah <= config.start_ayah && self.current_surah_repetition == 1
    }
}

/// Result of a transition that can end the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(PlaybackPosition),
    Complete,
}

impl Transition {
    pub fn position(self) -> Option<PlaybackPosition> {
        match self {
            Transition::Next(pos) => Some(pos),
            Transition::Complete => None,
        }
    }
}

/// Begin a session. Out-of-range input is clamped, never rejected.
pub fn start(config: SessionConfig) -> (SessionConfig, PlaybackPosition) {
    let config = config.clamped();
    (config, PlaybackPosition::initial(&config))
}

/// The current verse's audio reached its end.
pub fn on_audio_finished(
    pos: PlaybackPosition,
    config: &SessionConfig,
    autoplay: bool,
) -> Transition {
    if pos.current_ayah_repetition < config.ayah_repetitions {
        Transition::Next(PlaybackPosition {
            current_ayah_repetition: pos.current_ayah_repetition + 1,
            is_playing: true,
            ..pos
        })
    } else {
        advance(pos, config, autoplay)
    }
}

/// Move to the next verse, looping the range or completing the session at its end.
pub fn advance(pos: PlaybackPosition, config: &SessionConfig, autoplay: bool) -> Transition {
    if pos.current_ayah < config.end_ayah {
        return Transition::Next(PlaybackPosition {
            current_ayah: pos.current_ayah + 1,
            current_ayah_repetition: 1,
            current_surah_repetition: pos.current_surah_repetition,
            is_playing: autoplay,
            mistake_count: 0,
        });
    }

    let next_surah_rep = match pos.current_surah_repetition.checked_add(1) {
        Some(rep) if rep <= config.surah_repetitions => rep,
        _ => return Transition::Complete,
    };

    Transition::Next(PlaybackPosition {
        current_ayah: config.start_ayah,
        current_ayah_repetition: 1,
        current_surah_repetition: next_surah_rep,
        is_playing: autoplay,
        mistake_count: 0,
    })
}

/// Manual skip. Remaining repetitions of the current verse are dropped.
pub fn go_next(pos: PlaybackPosition, config: &SessionConfig, autoplay: bool) -> Transition {
    advance(pos, config, autoplay)
}

/// Step one verse back, crossing into the previous pass of the range if needed.
/// At the session start boundary the position comes back unchanged.
pub fn go_previous(pos: PlaybackPosition, config: &SessionConfig) -> PlaybackPosition {
    if pos.at_session_start(config) {
        return pos;
    }

    let (ayah, surah_rep) = if pos.current_ayah > config.start_ayah {
        (pos.current_ayah - 1, pos.current_surah_repetition)
    } else {
        (config.end_ayah, pos.current_surah_repetition - 1)
    };

    PlaybackPosition {
        current_ayah: ayah,
        current_ayah_repetition: 1,
        current_surah_repetition: surah_rep,
        is_playing: pos.is_playing,
        mistake_count: 0,
    }
}

pub fn mark_mistake(pos: PlaybackPosition) -> PlaybackPosition {
    PlaybackPosition {
        mistake_count: pos.mistake_count + 1,
        ..pos
    }
}

pub fn toggle_play_pause(pos: PlaybackPosition) -> PlaybackPosition {
    PlaybackPosition {
        is_playing: !pos.is_playing,
        ..pos
    }
}
