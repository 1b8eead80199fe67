pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Notice, NoticeKind};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;
const NOTICE_HEIGHT: u16 = 4;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        screen::current_screen(self.state).render(self, area, buf);

        if let Some(notice) = &self.notice {
            render_notice(notice, area, buf);
        }
    }
}

fn render_notice(notice: &Notice, area: Rect, buf: &mut Buffer) {
    if area.height < NOTICE_HEIGHT + 1 || area.width <= HORIZONTAL_MARGIN * 2 {
        return;
    }
    let rect = Rect::new(
        area.x + HORIZONTAL_MARGIN,
        area.y + area.height - NOTICE_HEIGHT - 1,
        area.width - HORIZONTAL_MARGIN * 2,
        NOTICE_HEIGHT,
    );
    let color = match notice.kind {
        NoticeKind::Info => Color::Green,
        NoticeKind::Error => Color::Red,
    };

    Clear.render(rect, buf);
    Paragraph::new(notice.text.as_str())
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(Span::styled(
                    notice.title.as_str(),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
        )
        .render(rect, buf);
}

/// Number of rows `text` needs when wrapped into `width` columns.
pub(crate) fn occupied_lines(text: &str, width: u16) -> u16 {
    if width == 0 {
        return 0;
    }
    let columns = text.width();
    if columns <= width as usize {
        1
    } else {
        (columns as f64 / width as f64).ceil() as u16 + 1
    }
}

pub(crate) fn key_help(pairs: &[(&str, &str)]) -> Paragraph<'static> {
    let key_style = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let mut spans = Vec::new();
    for (i, (key, action)) in pairs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  ", dim));
        }
        spans.push(Span::styled(key.to_string(), key_style));
        spans.push(Span::styled(format!(" {action}"), dim));
    }
    Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
}
