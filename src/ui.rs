use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::model::{Model, UIData};

pub const CMDLINE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const TABLE_BORDER: usize = 1;
pub const UPLOAD_PANEL_HEIGHT: usize = 6;
pub const COLUMN_SPACING: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

#[derive(Debug, Default)]
pub struct TDUI;

impl TDUI {
    pub fn new() -> Self {
        Self
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let data = model.get_uidata();
        let uploads_height = if data.uploads.is_some() { UPLOAD_PANEL_HEIGHT } else { 0 };
        let [table_area, uploads_area, status_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(uploads_height as u16),
            Constraint::Length(CMDLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        Self::draw_table(data, frame, table_area);
        if data.uploads.is_some() {
            Self::draw_uploads(data, frame, uploads_area);
        }
        Self::draw_statusline(data, frame, status_area);

        if data.show_record {
            Self::draw_record(data, frame, table_area);
        }
        if data.show_popup {
            Self::draw_popup(data, frame, frame.area());
        }
    }

    fn draw_table(data: &UIData, frame: &mut Frame, area: Rect) {
        let title = Line::from(Span::from(format!(" {} ", data.name)).bold());
        let position = Line::from(format!(
            " {}/{} ({} total) ",
            if data.nrows == 0 { 0 } else { data.abs_selected_row + 1 },
            data.nrows,
            data.total
        ));
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(position.right_aligned())
            .border_set(border::PLAIN);

        if data.nrows == 0 {
            let header = Line::from(Span::from(data.headers.join("  ")).bold());
            let message = Line::from(data.empty_message.as_str().italic()).centered();
            let paragraph = Paragraph::new(vec![header, Line::default(), message]).block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let header = Row::new(data.headers.iter().map(|h| Cell::from(h.as_str().bold())));
        let rows = data
            .rows
            .iter()
            .map(|r| Row::new(r.iter().map(|c| Cell::from(c.as_str()))));
        let widths = data.widths.iter().map(|w| Constraint::Length(*w as u16));

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .column_spacing(COLUMN_SPACING as u16)
            .row_highlight_style(Style::new().reversed())
            .cell_highlight_style(Style::new().bold().yellow());
        let mut state = TableState::default()
            .with_selected(Some(data.selected_row))
            .with_selected_column(Some(data.selected_column));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_uploads(data: &UIData, frame: &mut Frame, area: Rect) {
        let Some(uploads) = data.uploads.as_ref() else {
            return;
        };
        let title = Line::from(vec![
            " Uploads ".bold(),
            format!("[{}] ", uploads.mode).into(),
            uploads.state.as_str().yellow(),
            " ".into(),
        ]);
        let lines: Vec<Line> = if uploads.assets.is_empty() {
            vec![Line::from("No images uploaded (u to upload)".italic())]
        } else {
            uploads.assets.iter().map(|a| Line::from(a.as_str())).collect()
        };
        frame.render_widget(Paragraph::new(lines).block(Block::bordered().title(title)), area);
    }

    fn draw_statusline(data: &UIData, frame: &mut Frame, area: Rect) {
        if data.active_cmdinput {
            let prompt = data.cmd_mode.map(|m| m.prompt()).unwrap_or(":");
            let line = Line::from(vec![
                Span::from(prompt).blue().bold(),
                Span::from(data.cmdinput.input.as_str()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt.chars().count() + data.cmdinput.cursor_pos) as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
            return;
        }
        let line = Line::from(vec![
            Span::from(data.status_message.as_str()),
            Span::from("   ? help").dark_gray(),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_record(data: &UIData, frame: &mut Frame, area: Rect) {
        let area = centered(area, 80, 80);
        let header_width = data
            .record
            .iter()
            .map(|(h, _)| h.chars().count())
            .max()
            .unwrap_or(0) as u16;
        let rows = data.record.iter().map(|(header, value)| {
            Row::new(vec![Cell::from(header.as_str().bold()), Cell::from(value.as_str())])
        });
        let table = Table::new(rows, [Constraint::Length(header_width), Constraint::Fill(1)])
            .block(
                Block::bordered()
                    .title(Line::from(format!(" Record {} ", data.abs_selected_row + 1)).centered())
                    .border_set(border::THICK),
            )
            .row_highlight_style(Style::new().reversed());
        let mut state = TableState::default().with_selected(Some(data.selected_field));
        frame.render_widget(Clear, area);
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_popup(data: &UIData, frame: &mut Frame, area: Rect) {
        let area = centered(area, 70, 80);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" Esc to close ").centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        let help = Paragraph::new(data.popup_message.as_str())
            .wrap(Wrap { trim: false })
            .block(block);
        frame.render_widget(help, area);
    }
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let width = (u32::from(area.width) * u32::from(percent_x) / 100) as u16;
    let height = (u32::from(area.height) * u32::from(percent_y) / 100) as u16;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
