use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use menu_catalog::Presenter;

use crate::theme::{color_from_hex, Theme};
use crate::{AppState, DisplayEntry, PopupState};

pub struct Areas {
    pub header: Rect,
    pub footer: Rect,
    pub content: Rect,
    pub body: Rect,
    pub status: Rect,
}

/// Header, shortcut footer, body and status line, top to bottom.
pub fn areas(size: Rect) -> Areas {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(size);
    Areas {
        header: chunks[0],
        footer: chunks[1],
        content: chunks[2],
        body: chunks[2].inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
        status: chunks[3],
    }
}

pub fn render(frame: &mut Frame, app: &AppState) {
    let size = frame.size();
    frame.render_widget(
        Block::default().style(Style::default().bg(app.theme.background)),
        size,
    );
    let areas = areas(size);

    let header = Paragraph::new(app.title.clone())
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .fg(app.theme.text)
                .bg(app.theme.primary)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(header, areas.header);

    let footer = Paragraph::new(footer_line_data(&app.theme).line)
        .alignment(Alignment::Center)
        .style(Style::default().bg(footer_background(&app.theme)));
    frame.render_widget(footer, areas.footer);

    frame.render_widget(
        Block::default().style(Style::default().bg(app.theme.surface)),
        areas.content,
    );
    render_tree(frame, areas.body, app);

    let status = Paragraph::new(app.status_text())
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .bg(app.theme.primary)
                .fg(app.theme.text)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(status, areas.status);

    if let Some(popup) = &app.active_popup {
        render_popup(frame, popup, &app.theme);
    }
}

fn render_tree(frame: &mut Frame, area: Rect, app: &AppState) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let height = area.height as usize;
    let offset = app.scroll_offset(height);
    let end = app.display_entries.len().min(offset + height);

    let mut items: Vec<ListItem> = Vec::new();
    for index in offset..end {
        let (line, style) = entry_line(app, index, area.width as usize);
        if index == app.current_index {
            let style = style
                .bg(app.theme.highlight)
                .fg(app.theme.background)
                .add_modifier(Modifier::BOLD);
            items.push(ListItem::new(highlight_line(line, &app.theme)).style(style));
        } else {
            items.push(ListItem::new(line).style(style));
        }
    }
    if items.is_empty() {
        items.push(ListItem::new(
            "The menu is empty. Add sources to settings.json and press r.",
        ));
    }

    let list = List::new(items).block(
        Block::default().style(Style::default().bg(app.theme.surface).fg(app.theme.text)),
    );
    frame.render_widget(list, area);
}

fn entry_line(app: &AppState, index: usize, width: usize) -> (Line<'static>, Style) {
    let base = Style::default().fg(app.theme.text).bg(app.theme.surface);
    match app.display_entries[index] {
        DisplayEntry::Group { handle, depth } => {
            let marker = if app.expanded.contains(&handle) { "▼" } else { "▶" };
            let name = app.presenter.group_name(handle).unwrap_or_default();
            let text = truncate_to_width(&format!("{}{marker} {name}", indent(depth)), width);
            (Line::from(text), base.add_modifier(Modifier::BOLD))
        }
        DisplayEntry::Item { handle, depth } => {
            let name = app.presenter.item_name(handle).unwrap_or_default();
            let mut tag = app
                .presenter
                .item_action(handle)
                .map(|action| format!(" [{}]", action.kind()))
                .unwrap_or_default();
            if let Some(shortcut) = app.presenter.item_shortcut(handle) {
                tag.push_str(&format!(" {shortcut}"));
            }
            let label = truncate_to_width(
                &format!("{}  {name}", indent(depth)),
                width.saturating_sub(tag.width()),
            );
            let line = Line::from(vec![
                Span::raw(label),
                Span::styled(tag, Style::default().fg(app.theme.accent)),
            ]);
            (line, base)
        }
    }
}

fn highlight_line(line: Line<'static>, theme: &Theme) -> Line<'static> {
    let spans = line
        .spans
        .into_iter()
        .map(|span| {
            let style = span
                .style
                .fg(theme.background)
                .bg(theme.highlight)
                .add_modifier(Modifier::BOLD);
            Span::styled(span.content, style)
        })
        .collect::<Vec<_>>();
    Line::from(spans)
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

/// Cuts `text` to at most `width` columns, marking the cut with an ellipsis.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let limit = width - 1;
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let char_width = ch.width().unwrap_or(0);
        if used + char_width > limit {
            break;
        }
        used += char_width;
        out.push(ch);
    }
    out.push('…');
    out
}

fn render_popup(frame: &mut Frame, popup: &PopupState, theme: &Theme) {
    let (title, text, area) = match popup {
        PopupState::Info(info) => {
            let text = format!(
                concat!(
                    "Name: {}\nGroup: {}\nKind: {}\nProgram: {}\nArguments: {}\n",
                    "Shortcut: {}\n\nPress Enter or Esc to close.",
                ),
                info.name,
                info.group,
                info.kind,
                info.program,
                info.arguments.as_deref().unwrap_or("-"),
                info.shortcut.as_deref().unwrap_or("-"),
            );
            ("Item Info", text, centered_rect(frame.size(), 60, 40))
        }
        PopupState::Message(msg) => (
            "Message",
            format!("{msg}\n\nPress Enter or Esc to close."),
            centered_rect(frame.size(), 50, 30),
        ),
    };
    frame.render_widget(Clear, area);
    let block = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .style(Style::default().bg(theme.surface).fg(theme.text))
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .style(Style::default().bg(theme.surface)),
        );
    frame.render_widget(block, area);
}

fn centered_rect(area: Rect, width_percent: u16, height_percent: u16) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100 - height_percent) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FooterAction {
    Quit,
    Execute,
    Info,
    Remove,
    Rebuild,
    Export,
}

struct FooterShortcut {
    key: &'static str,
    label: &'static str,
    action: FooterAction,
}

const FOOTER_SHORTCUTS: &[FooterShortcut] = &[
    FooterShortcut {
        key: "q",
        label: " Exit",
        action: FooterAction::Quit,
    },
    FooterShortcut {
        key: "↵",
        label: " Open",
        action: FooterAction::Execute,
    },
    FooterShortcut {
        key: "i",
        label: " Info",
        action: FooterAction::Info,
    },
    FooterShortcut {
        key: "d",
        label: " Remove",
        action: FooterAction::Remove,
    },
    FooterShortcut {
        key: "r",
        label: " Rebuild",
        action: FooterAction::Rebuild,
    },
    FooterShortcut {
        key: "x",
        label: " Export",
        action: FooterAction::Export,
    },
];

struct FooterSegment {
    start: u16,
    end: u16,
    action: FooterAction,
}

struct FooterLineData {
    line: Line<'static>,
    segments: Vec<FooterSegment>,
    total_width: u16,
}

fn footer_background(theme: &Theme) -> ratatui::style::Color {
    color_from_hex("#76B3C5").unwrap_or(theme.highlight)
}

fn footer_line_data(theme: &Theme) -> FooterLineData {
    let base_bg = footer_background(theme);
    let shortcut_fg = color_from_hex("#FDA009").unwrap_or(theme.accent);
    let label_fg = color_from_hex("#2E3544").unwrap_or(theme.surface);
    let shortcut_style = Style::default()
        .fg(shortcut_fg)
        .bg(base_bg)
        .add_modifier(Modifier::BOLD);
    let label_style = Style::default().fg(label_fg).bg(base_bg);

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut segments = Vec::new();
    let mut cursor: u16 = 0;
    for (index, shortcut) in FOOTER_SHORTCUTS.iter().enumerate() {
        if index > 0 {
            spans.push(Span::styled(" | ", label_style));
            cursor = cursor.saturating_add(3);
        }
        let start = cursor;
        spans.push(Span::styled(shortcut.key, shortcut_style));
        spans.push(Span::styled(shortcut.label, label_style));
        let end = start
            .saturating_add(shortcut.key.width() as u16)
            .saturating_add(shortcut.label.width() as u16);
        segments.push(FooterSegment {
            start,
            end,
            action: shortcut.action,
        });
        cursor = end;
    }
    FooterLineData {
        line: Line::from(spans),
        segments,
        total_width: cursor,
    }
}

/// The footer shortcut under `column`, given the centred footer line.
pub fn footer_action_at(column: u16, footer_area: Rect, theme: &Theme) -> Option<FooterAction> {
    let data = footer_line_data(theme);
    if data.total_width == 0 || footer_area.width == 0 {
        return None;
    }
    let text_width = data.total_width.min(footer_area.width);
    let start_x = footer_area.x + footer_area.width.saturating_sub(text_width) / 2;
    if column < start_x || column >= start_x + text_width {
        return None;
    }
    let relative = column - start_x;
    data.segments
        .iter()
        .find(|segment| relative >= segment.start && relative < segment.end)
        .map(|segment| segment.action)
}
