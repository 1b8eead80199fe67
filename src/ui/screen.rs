use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};

use crate::app::{App, AppState, SettingsField, SettingsForm};
use crate::content::TRANSLATION_UNAVAILABLE;
use crate::controller::EndReason;
use crate::feedback::ProgressFeedback;
use crate::session::{PlaybackPosition, SessionConfig};
use crate::surahs;
use crate::ui::{key_help, occupied_lines, HORIZONTAL_MARGIN, VERTICAL_MARGIN};
use crate::util::{format_elapsed, percent};

/// A UI screen boundary: renders one [`AppState`]
pub trait Screen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer);
}

pub struct SettingsScreen;

impl SettingsScreen {
    fn value(form: &SettingsForm, field: SettingsField) -> String {
        match field {
            SettingsField::Surah => {
                let surah = form.surah();
                format!(
                    "{}. {} ({}, {} ayahs)",
                    surah.id, surah.english_name, surah.name, surah.total_ayahs
                )
            }
            SettingsField::StartAyah => form.start_ayah.to_string(),
            SettingsField::EndAyah => form.end_ayah.to_string(),
            SettingsField::AyahRepetitions => form.ayah_repetitions.to_string(),
            SettingsField::SurahRepetitions => form.surah_repetitions.to_string(),
        }
    }
}

impl Screen for SettingsScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(SettingsField::ALL.len() as u16),
                Constraint::Length(1),
            ])
            .split(area);

        Paragraph::new(Span::styled(
            "Ayah Echo",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        let lines = SettingsField::ALL
            .iter()
            .map(|&field| {
                let selected = field == app.form.selected;
                let marker = if selected { "> " } else { "  " };
                let style = if selected {
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Line::from(vec![
                    Span::styled(format!("{marker}{field}: "), style),
                    Span::styled(Self::value(&app.form, field), style),
                ])
            })
            .collect::<Vec<_>>();

        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Settings"))
            .render(chunks[1], buf);

        key_help(&[
            ("↑/↓", "select"),
            ("←/→", "adjust"),
            ("enter", "start"),
            ("esc", "quit"),
        ])
        .render(chunks[2], buf);
    }
}

pub struct PlayerScreen;

impl PlayerScreen {
    /// Verses heard so far against the whole session, in percent.
    fn progress(config: &SessionConfig, pos: &PlaybackPosition) -> u16 {
        let per_pass = u64::from(config.range_len());
        let done = u64::from(pos.current_surah_repetition.saturating_sub(1)) * per_pass
            + u64::from(pos.current_ayah.saturating_sub(config.start_ayah));
        percent(done, per_pass * u64::from(config.surah_repetitions))
    }

    fn feedback_lines(feedback: &ProgressFeedback) -> Vec<Line<'static>> {
        let mut lines = vec![Line::from(format!(
            "Progress: {:.0}%",
            feedback.progress_percentage
        ))];
        if !feedback.difficult_verses.is_empty() {
            let verses = feedback
                .difficult_verses
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(Line::from(format!("Difficult verses: {verses}")));
        }
        lines.extend(
            feedback
                .recommended_strategies
                .iter()
                .map(|s| Line::from(format!("- {s}"))),
        );
        lines
    }
}

impl Screen for PlayerScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let (Some(config), Some(pos)) = (app.controller.config(), app.controller.position())
        else {
            return;
        };
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let dim = Style::default().add_modifier(Modifier::DIM);

        let width = area.width.saturating_sub(HORIZONTAL_MARGIN * 2);
        let arabic_lines = app
            .ayah
            .as_ref()
            .map_or(1, |a| occupied_lines(&a.arabic, width));
        let feedback_lines = app
            .feedback
            .as_ref()
            .map(Self::feedback_lines)
            .unwrap_or_default();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(arabic_lines + 1),
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(if feedback_lines.is_empty() {
                    0
                } else {
                    feedback_lines.len() as u16 + 2
                }),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        let surah_name = app.surah().map_or("?", |s| s.english_name);
        Paragraph::new(Line::from(vec![
            Span::styled(format!("Surah {surah_name}"), bold.fg(Color::Green)),
            Span::styled(
                format!(
                    "  |  Ayah {} of {}-{}",
                    pos.current_ayah, config.start_ayah, config.end_ayah
                ),
                dim,
            ),
        ]))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        match &app.ayah {
            Some(ayah) => {
                Paragraph::new(Span::styled(ayah.arabic.as_str(), bold))
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .render(chunks[1], buf);

                let mut lines = Vec::new();
                if let Some(tr) = &ayah.transliteration {
                    lines.push(Line::from(Span::styled(
                        tr.as_str(),
                        Style::default().add_modifier(Modifier::ITALIC),
                    )));
                    lines.push(Line::default());
                }
                lines.push(Line::from(
                    ayah.english.as_deref().unwrap_or(TRANSLATION_UNAVAILABLE),
                ));
                lines.push(Line::from(Span::styled(ayah.indonesian.as_str(), dim)));
                Paragraph::new(lines)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .render(chunks[2], buf);
            }
            None => {
                let text = if app.loading { "Loading..." } else { "" };
                Paragraph::new(Span::styled(text, dim.fg(Color::Yellow)))
                    .alignment(Alignment::Center)
                    .render(chunks[1], buf);
            }
        }

        let state = if pos.is_playing { "Playing" } else { "Paused" };
        let autoplay = if app.controller.autoplay() { "on" } else { "off" };
        Paragraph::new(format!(
            "Ayah {} / {}   Surah {} / {}   Mistakes {}   Autoplay {}   {}",
            pos.current_ayah_repetition,
            config.ayah_repetitions,
            pos.current_surah_repetition,
            config.surah_repetitions,
            pos.mistake_count,
            autoplay,
            state
        ))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

        Gauge::default()
            .gauge_style(Style::default().fg(Color::Green))
            .percent(Self::progress(config, pos).min(100))
            .render(chunks[4], buf);

        if !feedback_lines.is_empty() {
            Paragraph::new(feedback_lines)
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).title("AI Feedback"))
                .render(chunks[5], buf);
        }

        key_help(&[
            ("space", "play/pause"),
            ("n/p", "next/prev"),
            ("r", "repeat"),
            ("m", "mistake"),
            ("a", "autoplay"),
            ("+/-", "ayah reps"),
            ("]/[", "surah reps"),
            ("e", "end"),
        ])
        .render(chunks[7], buf);
    }
}

pub struct SummaryScreen;

impl Screen for SummaryScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let Some(summary) = &app.last_summary else {
            return;
        };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(5),
                Constraint::Length(1),
            ])
            .split(area);

        let (title, color) = match summary.reason {
            EndReason::Completed => ("Session Complete", Color::Green),
            EndReason::EndedByUser => ("Session Ended", Color::Yellow),
            EndReason::ContentUnavailable(_) => ("Session Stopped", Color::Red),
        };
        Paragraph::new(Span::styled(
            title,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        let surah_name = surahs::find(summary.surah_id).map_or("?", |s| s.english_name);
        let lines = vec![
            Line::from(format!(
                "Surah {surah_name}, ayahs {}-{}",
                summary.start_ayah, summary.end_ayah
            )),
            Line::from(format!(
                "Total time: {}",
                format_elapsed(summary.elapsed)
            )),
            Line::from(format!(
                "Mistakes: {} ({} on the last verse)",
                summary.total_mistakes, summary.final_mistakes
            )),
            Line::from(format!("Verses played: {}", summary.verses_played)),
        ];
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        key_help(&[("enter", "new session"), ("esc", "quit")]).render(chunks[2], buf);
    }
}

pub fn current_screen(state: AppState) -> Box<dyn Screen> {
    match state {
        AppState::Settings => Box::new(SettingsScreen),
        AppState::Player => Box::new(PlayerScreen),
        AppState::Summary => Box::new(SummaryScreen),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_across_passes() {
        let config = SessionConfig {
            surah_id: 112,
            total_ayahs_in_surah: 4,
            start_ayah: 1,
            end_ayah: 4,
            ayah_repetitions: 2,
            surah_repetitions: 2,
        };
        let (config, mut pos) = crate::session::start(config);
        assert_eq!(PlayerScreen::progress(&config, &pos), 0);

        pos.current_ayah = 3;
        assert_eq!(PlayerScreen::progress(&config, &pos), 25);

        pos.current_surah_repetition = 2;
        pos.current_ayah = 1;
        assert_eq!(PlayerScreen::progress(&config, &pos), 50);
    }

    #[test]
    fn test_progress_with_huge_repetition_counts() {
        let config = SessionConfig {
            surah_id: 2,
            total_ayahs_in_surah: 286,
            start_ayah: 1,
            end_ayah: 286,
            ayah_repetitions: 1,
            surah_repetitions: 20_000_000,
        };
        let (config, mut pos) = crate::session::start(config);
        assert_eq!(PlayerScreen::progress(&config, &pos), 0);

        pos.current_surah_repetition = 10_000_001;
        assert_eq!(PlayerScreen::progress(&config, &pos), 50);

        let config = SessionConfig {
            surah_repetitions: u32::MAX,
            ..config
        };
        pos.current_surah_repetition = u32::MAX;
        pos.current_ayah = 286;
        assert_eq!(PlayerScreen::progress(&config, &pos), 100);
    }
}
