use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use ratatui::Frame;
use regex::Regex;
use time::{macros::format_description, OffsetDateTime};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::view::{
    DetailView, FormView, OverlayView, PaginationView, ProductRow, TableView, ViewModel,
};
use crate::highlight::build_highlight_regex;

const IMAGE_WIDTH: usize = 28;
const DESCRIPTION_WIDTH: usize = 40;

pub fn draw_app(frame: &mut Frame, view: &ViewModel, table_state: &mut TableState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(2),
            Constraint::Length(3),
        ])
        .split(frame.size());

    frame.render_widget(build_toolbar(view), vertical[0]);

    let highlight_regex = build_highlight_regex(&view.search.query);
    let highlight_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    draw_table(
        frame,
        vertical[1],
        view,
        table_state,
        highlight_regex.as_ref(),
        highlight_style,
    );

    let mut footer = Vec::with_capacity(2);
    if let Some(pagination) = &view.pagination {
        footer.push(Line::from(pagination_spans(pagination)));
    }
    footer.push(Line::from(Span::styled(
        view.info.clone(),
        Style::default().fg(Color::Gray),
    )));
    frame.render_widget(Paragraph::new(footer), vertical[2]);

    let status = build_status_line(view);
    let status_paragraph = Paragraph::new(status).style(Style::default().fg(Color::Gray));
    frame.render_widget(status_paragraph, vertical[3]);

    render_overlay(frame, view);
}

fn build_toolbar(view: &ViewModel) -> Paragraph<'static> {
    let label_style = if view.search.active {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let mut spans = vec![Span::styled("Search ", label_style), Span::styled("/ ", label_style)];
    if view.search.query.is_empty() && !view.search.active {
        spans.push(Span::styled(
            "(press / to filter by title)",
            Style::default().fg(Color::DarkGray),
        ));
    } else {
        spans.push(Span::styled(
            view.search.query.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
    }
    if view.search.active {
        spans.push(Span::styled("▌", Style::default().fg(Color::Cyan)));
    }
    spans.push(Span::raw("   | Sort: "));
    spans.push(Span::raw(format!("Price {} ", view.sort.price.glyph())));
    spans.push(Span::raw(format!("Title {}", view.sort.title.glyph())));
    spans.push(Span::raw(format!("   | Per page: {}", view.page_size)));

    let border = if view.search.active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Paragraph::new(Line::from(spans)).block(
        Block::default()
            .title("Products")
            .borders(Borders::ALL)
            .border_style(border),
    )
}

fn draw_table(
    frame: &mut Frame,
    area: Rect,
    view: &ViewModel,
    table_state: &mut TableState,
    regex: Option<&Regex>,
    highlight_style: Style,
) {
    let block = Block::default().borders(Borders::ALL);
    let rows = match &view.table {
        TableView::Rows(rows) => rows,
        other => {
            let (message, style) = match other {
                TableView::Loading => ("Loading products…".to_string(), Style::default()),
                TableView::Failed(message) => (message.clone(), Style::default().fg(Color::Red)),
                _ => (
                    "No products found.".to_string(),
                    Style::default().fg(Color::Gray),
                ),
            };
            table_state.select(None);
            let paragraph = Paragraph::new(Span::styled(message, style))
                .block(block)
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
            return;
        }
    };

    let header = Row::new(["ID", "Image", "Title", "Description", "Price", "Category"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let body: Vec<Row> = rows
        .iter()
        .map(|row| product_row(row, regex, highlight_style))
        .collect();
    table_state.select(rows.iter().position(|row| row.selected));

    let table = Table::new(
        body,
        [
            Constraint::Length(6),
            Constraint::Length(IMAGE_WIDTH as u16),
            Constraint::Percentage(25),
            Constraint::Min(20),
            Constraint::Length(10),
            Constraint::Length(16),
        ],
    )
    .header(header)
    .block(block)
    .highlight_style(
        Style::default()
            .bg(Color::Blue)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, table_state);
}

fn product_row(row: &ProductRow, regex: Option<&Regex>, highlight_style: Style) -> Row<'static> {
    Row::new(vec![
        Cell::from(row.id.to_string()),
        Cell::from(Span::styled(
            truncate_to_width(&row.image_url, IMAGE_WIDTH),
            Style::default().fg(Color::DarkGray),
        )),
        Cell::from(Line::from(highlight_line(
            &row.title,
            regex,
            highlight_style,
            Style::default().add_modifier(Modifier::BOLD),
        ))),
        Cell::from(truncate_to_width(&row.description, DESCRIPTION_WIDTH)),
        Cell::from(row.price.clone()),
        Cell::from(row.category.clone()),
    ])
}

fn pagination_spans(pagination: &PaginationView) -> Vec<Span<'static>> {
    let enabled = Style::default().fg(Color::Cyan);
    let disabled = Style::default().fg(Color::DarkGray);
    let mut spans = vec![Span::styled(
        "‹ Prev ",
        if pagination.previous_enabled {
            enabled
        } else {
            disabled
        },
    )];
    let mut last = None;
    for link in &pagination.links {
        if last.is_some_and(|prev: usize| link.number > prev + 1) {
            spans.push(Span::styled(" … ", disabled));
        }
        let style = if link.active {
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        spans.push(Span::styled(format!(" {} ", link.number), style));
        last = Some(link.number);
    }
    spans.push(Span::styled(
        " Next ›",
        if pagination.next_enabled {
            enabled
        } else {
            disabled
        },
    ));
    spans
}

fn build_status_line(view: &ViewModel) -> Text<'static> {
    let mut spans = Vec::new();
    if view.busy.is_empty() {
        spans.push(Span::styled("Idle", Style::default().fg(Color::Gray)));
    } else {
        let working = view
            .busy
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        spans.push(Span::raw("Working: "));
        spans.push(Span::styled(
            working,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }
    if let Some(loaded_at) = view.loaded_at {
        spans.push(Span::raw(" | Loaded "));
        spans.push(Span::styled(
            format_time_short(loaded_at),
            Style::default().fg(Color::Gray),
        ));
    }
    if let Some(message) = &view.status {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Cyan),
        ));
    }

    let keys = Style::default().fg(Color::DarkGray);
    Text::from(vec![
        Line::from(spans),
        Line::from(vec![
            Span::styled(
                "Keys: ",
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "j/k move • h/l page • g go to page • s page size • / search • P/T sort",
                keys,
            ),
        ]),
        Line::from(Span::styled(
            "      Enter details • e edit • n new • x export CSV • Ctrl-r reload • q quit",
            keys,
        )),
    ])
}

fn format_time_short(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

fn highlight_line(
    text: &str,
    regex: Option<&Regex>,
    highlight_style: Style,
    base_style: Style,
) -> Vec<Span<'static>> {
    let Some(re) = regex else {
        return vec![Span::styled(text.to_string(), base_style)];
    };
    let mut spans = Vec::new();
    let mut last = 0;
    for mat in re.find_iter(text) {
        if mat.start() > last {
            spans.push(Span::styled(
                text[last..mat.start()].to_string(),
                base_style,
            ));
        }
        spans.push(Span::styled(mat.as_str().to_string(), highlight_style));
        last = mat.end();
    }
    if last < text.len() {
        spans.push(Span::styled(text[last..].to_string(), base_style));
    }
    if spans.is_empty() {
        spans.push(Span::styled(text.to_string(), base_style));
    }
    spans
}

/// Cuts `text` to at most `max` display columns, ending in `…` when shortened.
fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let width = grapheme.width();
        if used + width + 1 > max {
            break;
        }
        out.push_str(grapheme);
        used += width;
    }
    out.push('…');
    out
}

fn render_overlay(frame: &mut Frame, view: &ViewModel) {
    match &view.overlay {
        Some(OverlayView::Detail(detail)) => {
            let area = centered_rect(70, 60, frame.size());
            frame.render_widget(Clear, area);
            frame.render_widget(detail_paragraph(detail), area);
        }
        Some(OverlayView::Edit { id, form }) => {
            let area = centered_rect(70, 50, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = form_paragraph(
                form,
                format!("{} (#{id})", form.title),
                "Tab next field • Enter save • Esc back",
            );
            frame.render_widget(paragraph, area);
        }
        Some(OverlayView::Create(form)) => {
            let area = centered_rect(70, 50, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = form_paragraph(
                form,
                form.title.to_string(),
                "Tab next field • Enter create • Esc cancel",
            );
            frame.render_widget(paragraph, area);
        }
        Some(OverlayView::GoToPage { input, total_pages }) => {
            let area = centered_rect(40, 20, frame.size());
            frame.render_widget(Clear, area);
            let mut input_display = input.clone();
            input_display.push('▌');
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    format!("Page number (1-{total_pages})"),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(input_display),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter to go • Esc to cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title("Go to page")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

fn detail_paragraph(detail: &DetailView) -> Paragraph<'static> {
    let label = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD);
    let field = |name: &'static str, value: String| {
        Line::from(vec![Span::styled(format!("{name:<12}"), label), Span::raw(value)])
    };
    Paragraph::new(vec![
        Line::from(Span::styled(
            detail.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        field("Price", detail.price.clone()),
        field("Category", detail.category.clone()),
        field("Image", detail.image_url.clone()),
        Line::from(""),
        Line::from(detail.description.clone()),
        Line::from(""),
        Line::from(Span::styled(
            "e edit • Esc close",
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(
        Block::default()
            .title(format!("Product #{}", detail.id))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    )
    .wrap(Wrap { trim: false })
}

fn form_paragraph(form: &FormView, title: String, hint: &'static str) -> Paragraph<'static> {
    let mut lines = Vec::with_capacity(form.fields.len() * 2 + 1);
    for (index, (label, value)) in form.fields.iter().enumerate() {
        let focused = index == form.focus;
        let label_style = if focused {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let mut value_display = value.clone();
        if focused {
            value_display.push('▌');
        }
        lines.push(Line::from(vec![
            Span::styled(format!("{label:<12}"), label_style),
            Span::raw(value_display),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::Gray))));
    Paragraph::new(lines)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false })
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
