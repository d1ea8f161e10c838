use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::{AppState, LoadStatus, ServerStatus};
use crate::gallery::{Thumbnail, Tile};

const TILE_HEIGHT: u16 = 5;
const STATUS_HEIGHT: u16 = 3;

fn split_screen(area: Rect) -> (Rect, Rect, Rect) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(STATUS_HEIGHT)])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(vertical[0]);
    (columns[0], columns[1], vertical[1])
}

/// Inner width of the gallery block for a terminal of the given size.
pub fn gallery_inner_width(area: Rect) -> u16 {
    let (gallery, _, _) = split_screen(area);
    gallery.width.saturating_sub(2)
}

pub fn draw_app(frame: &mut Frame, state: &AppState) {
    let (gallery_area, meta_area, status_area) = split_screen(frame.size());

    draw_gallery(frame, state, gallery_area);
    draw_metadata(frame, state, meta_area);

    let status = Paragraph::new(build_status_text(state)).style(Style::default().fg(Color::Gray));
    frame.render_widget(status, status_area);

    if state.context_menu.is_some() {
        draw_context_menu(frame, state);
    }
}

fn draw_gallery(frame: &mut Frame, state: &AppState, area: Rect) {
    let title = state
        .folder_id
        .as_deref()
        .map(|id| format!("Eagle Gallery · {id}"))
        .unwrap_or_else(|| "Eagle Gallery".to_string());
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if state.gallery.is_empty() {
        let hint = match &state.load {
            LoadStatus::Loading { .. } => "Loading…",
            LoadStatus::NoFolderId => "This note has no eagle folder id.",
            LoadStatus::FetchFailed => "Could not fetch items from Eagle.",
            LoadStatus::Unreadable => "The active note could not be read.",
            LoadStatus::Loaded { .. } => "No items with a usable thumbnail.",
            LoadStatus::Idle => "Open or edit a markdown note to show its gallery.",
        };
        let paragraph = Paragraph::new(hint)
            .style(Style::default().fg(Color::Gray))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
        return;
    }

    let visible_rows = usize::from((inner.height / TILE_HEIGHT).max(1));
    let hovered_row = state
        .gallery
        .hovered()
        .and_then(|index| {
            state
                .grid
                .rows
                .iter()
                .position(|row| row.iter().any(|tile| tile.index == index))
        })
        .unwrap_or(0);
    let first_row = hovered_row.saturating_sub(visible_rows - 1);

    let tiles = state.gallery.tiles();
    for (offset, row) in state
        .grid
        .rows
        .iter()
        .skip(first_row)
        .take(visible_rows)
        .enumerate()
    {
        let y = inner.y + offset as u16 * TILE_HEIGHT;
        let height = TILE_HEIGHT.min(inner.y + inner.height - y);
        let row_area = Rect::new(inner.x, y, inner.width, height);
        let constraints: Vec<Constraint> = row
            .iter()
            .map(|placed| Constraint::Length(placed.width as u16))
            .collect();
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(row_area);
        for (placed, cell) in row.iter().zip(cells.iter()) {
            if let Some(tile) = tiles.get(placed.index) {
                let hovered = state.gallery.hovered() == Some(placed.index);
                draw_tile(frame, tile, *cell, hovered);
            }
        }
    }
}

fn draw_tile(frame: &mut Frame, tile: &Tile, area: Rect, hovered: bool) {
    let border_style = if hovered {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let label_width = usize::from(area.width.saturating_sub(2));
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(truncate_to_width(&tile.item.name, label_width));

    let kind = match tile.thumbnail() {
        Some(Thumbnail::Image { .. }) => Span::styled(
            format!("▣ {}", tile.item.ext.to_uppercase()),
            Style::default().fg(Color::Green),
        ),
        Some(Thumbnail::FileIcon { extension }) => Span::styled(
            format!("◇ .{extension}"),
            Style::default().fg(Color::Yellow),
        ),
        None => Span::raw("?"),
    };
    let mut lines = vec![Line::from(kind)];
    if tile.item.width > 0 && tile.item.height > 0 {
        lines.push(Line::from(Span::styled(
            truncate_to_width(&format!("{}×{}", tile.item.width, tile.item.height), label_width),
            Style::default().fg(Color::Gray),
        )));
    }
    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

fn draw_metadata(frame: &mut Frame, state: &AppState, area: Rect) {
    let block = Block::default().title("Details").borders(Borders::ALL);
    let text = match state.gallery.hovered_tile() {
        Some(tile) => {
            let mut lines = Vec::new();
            for (key, value) in tile.metadata() {
                lines.push(Line::from(vec![
                    Span::styled(format!("{key}: "), Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(value),
                ]));
            }
            if let Some(thumbnail) = tile.thumbnail() {
                let label = match thumbnail {
                    Thumbnail::Image { mime, .. } => {
                        format!("{mime}, {} bytes", thumbnail.byte_len())
                    }
                    Thumbnail::FileIcon { .. } => "file icon (thumbnail missing)".to_string(),
                };
                lines.push(Line::from(vec![
                    Span::styled("thumbnail: ", Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(label),
                ]));
            }
            Text::from(lines)
        }
        None => Text::from("Select a tile to see its details."),
    };
    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn build_status_text(state: &AppState) -> Text<'static> {
    let server_style = match state.server {
        ServerStatus::Running { .. } => Style::default().fg(Color::Green),
        ServerStatus::NotRunning => Style::default().fg(Color::Red),
        ServerStatus::Unknown => Style::default().fg(Color::Gray),
    };
    let mut spans = vec![
        Span::styled(state.label.clone(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(state.server.label(), server_style),
    ];
    if let ServerStatus::Running { version } = &state.server {
        spans.push(Span::raw(format!(" ({version})")));
    }
    if let Some(document) = &state.document {
        let name = document
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| document.display().to_string());
        spans.push(Span::raw(" | Note: "));
        spans.push(Span::styled(name, Style::default().add_modifier(Modifier::BOLD)));
    }
    spans.push(Span::raw(format!(" | Tiles: {}", state.gallery.tiles().len())));
    if let LoadStatus::Loaded { skipped } = state.load {
        if skipped > 0 {
            spans.push(Span::styled(
                format!(" ({skipped} skipped)"),
                Style::default().fg(Color::Yellow),
            ));
        }
    }

    let second = match state.status_message() {
        Some(message) => Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Yellow),
        )),
        None => Line::from(
            "←↓↑→ move · Enter open in Eagle · m menu · r reload · s sync tags · q quit",
        ),
    };
    Text::from(vec![Line::from(spans), second])
}

fn draw_context_menu(frame: &mut Frame, state: &AppState) {
    let Some(menu) = &state.context_menu else {
        return;
    };
    let area = centered_rect(30, 20, frame.size());
    let items: Vec<ListItem> = menu
        .actions
        .iter()
        .map(|action| ListItem::new(action.to_string()))
        .collect();
    let list = List::new(items)
        .block(Block::default().title("Actions").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    let mut list_state = ListState::default();
    list_state.select(Some(menu.selected));
    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let width = UnicodeWidthStr::width(grapheme);
        if used + width + 1 > max_width {
            break;
        }
        out.push_str(grapheme);
        used += width;
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
