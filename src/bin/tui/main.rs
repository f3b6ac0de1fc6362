mod app;

use std::io;
use std::time::Duration;

use app::{
    format_count, format_countdown, format_numbers, format_rate, format_secs, format_time_ns,
    truncate, AppState, ConnectionStatus,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url);
    app.refresh(&client).await;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut feed_state = TableState::default();
    feed_state.select(Some(0));

    let result = run_loop(&mut terminal, &mut app, &client, &mut feed_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    feed_state: &mut TableState,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(2);
    let mut last_tick = std::time::Instant::now();

    loop {
        feed_state.select(Some(app.selected));
        terminal.draw(|f| render(f, app, feed_state))?;

        // Redraw at least once a second so the next-run countdown ticks.
        let timeout = refresh_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO)
            .min(Duration::from_secs(1));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Char('t') | KeyCode::Char('T') => {
                            app.trigger(client).await;
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            app.select_next();
                            app.refresh_selected(client).await;
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            app.select_prev();
                            app.refresh_selected(client).await;
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, feed_state: &mut TableState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_body(f, app, feed_state, chunks[1]);
    render_footer(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● Connected".to_string(), Color::Green),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
        ConnectionStatus::Connecting => ("◌ Connecting".to_string(), Color::Yellow),
    };

    let sched = &app.scheduler;
    let next = format_secs(app.next_run_in_secs());
    let reason = match (&sched.last_delay_reason, sched.last_delay_secs) {
        (Some(r), Some(secs)) => format!("{r} {secs}s"),
        _ => "—".to_string(),
    };
    let failures = app.health.consecutive_failures;
    let last_ok = match app.health.last_cycle_ok {
        Some(true) => ("ok", Color::Green),
        Some(false) => ("failed", Color::Red),
        None => ("—", Color::DarkGray),
    };

    let line = Line::from(vec![
        Span::styled(
            " Draw Collector  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(format!("state: {}", sched.state), Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(
            format!("next: {next} ({reason})"),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("cycles: {}", sched.cycle_count),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  last: "),
        Span::styled(last_ok.0, Style::default().fg(last_ok.1)),
        Span::styled(
            format!("  failures: {failures}"),
            Style::default().fg(if failures > 0 { Color::Red } else { Color::DarkGray }),
        ),
    ]);

    let paragraph = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, feed_state: &mut TableState, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);
    render_feeds_table(f, app, feed_state, rows[0]);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(28)])
        .split(rows[1]);
    render_history_table(f, app, cols[0]);
    render_win_rates(f, app, cols[1]);
}

fn header_row(labels: &[&'static str]) -> Row<'static> {
    Row::new(
        labels
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
    )
    .height(1)
}

fn titled(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn render_feeds_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header = header_row(&[
        "Feed", "Period", "Left", "Numbers", "大小", "单双", "大单", "小单", "小双", "Fetched",
    ]);

    let rows: Vec<Row> = app
        .feeds
        .iter()
        .map(|feed| {
            let Some(latest) = &feed.latest else {
                return Row::new(vec![
                    Cell::from(feed.id.clone()).style(Style::default().fg(Color::Cyan)),
                    Cell::from("no data yet").style(Style::default().fg(Color::DarkGray)),
                ]);
            };
            let snap = &latest.snapshot;
            Row::new(vec![
                Cell::from(feed.id.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(snap.period.clone().unwrap_or_else(|| "—".to_string())),
                Cell::from(format_countdown(snap.countdown.as_ref()))
                    .style(Style::default().fg(Color::Green)),
                Cell::from(format_numbers(snap.numbers, snap.sum)),
                Cell::from(snap.big_small.clone().unwrap_or_default()),
                Cell::from(snap.odd_even.clone().unwrap_or_default()),
                Cell::from(format_count(snap.not_opened.big_odd)),
                Cell::from(format_count(snap.not_opened.small_odd)),
                Cell::from(format_count(snap.not_opened.small_even)),
                Cell::from(format_time_ns(latest.fetched_at_ns))
                    .style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Length(6),
            Constraint::Length(12),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(titled(" Feeds ".to_string()))
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn result_color(key: &str) -> Color {
    match key {
        "hit_profit" | "miss_profit" => Color::Green,
        "hit_killed" | "miss_loss" => Color::Red,
        _ => Color::DarkGray,
    }
}

fn render_history_table(f: &mut Frame, app: &AppState, area: Rect) {
    let header = header_row(&["Period", "Numbers", "Pred", "Flag", "Kill", "Open", "Result"]);

    let rows: Vec<Row> = app
        .history
        .iter()
        .map(|h| {
            let color = result_color(&h.betting_result);
            Row::new(vec![
                Cell::from(h.period.to_string()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(h.numbers.clone()),
                Cell::from(h.prediction.clone()),
                Cell::from(h.outcome.clone()),
                Cell::from(if h.kill { "杀" } else { "" }).style(Style::default().fg(Color::Red)),
                Cell::from(h.open_result.clone().unwrap_or_default()),
                Cell::from(truncate(&h.betting_label, 6)).style(Style::default().fg(color)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(9),
            Constraint::Length(12),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(titled(format!(
        " History: {} ",
        app.selected_feed().unwrap_or("—")
    )));

    f.render_widget(table, area);
}

fn render_win_rates(f: &mut Frame, app: &AppState, area: Rect) {
    let lines: Vec<Line> = app
        .stats
        .win_rates
        .iter()
        .map(|r| {
            Line::from(vec![
                Span::styled(format!(" {:>4} ", r.games), Style::default().fg(Color::Yellow)),
                Span::raw(format_rate(r)),
            ])
        })
        .collect();

    let paragraph = Paragraph::new(lines).block(titled(" Win rate ".to_string()));
    f.render_widget(paragraph, area);
}

fn render_footer(f: &mut Frame, app: &AppState, area: Rect) {
    let mut spans = vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[t] ", Style::default().fg(Color::Yellow)),
        Span::raw("trigger  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("select feed  "),
    ];
    if let Some(notice) = &app.notice {
        spans.push(Span::styled(notice.clone(), Style::default().fg(Color::Cyan)));
    }
    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wins_are_green_losses_red() {
        assert_eq!(result_color("hit_profit"), Color::Green);
        assert_eq!(result_color("miss_profit"), Color::Green);
        assert_eq!(result_color("hit_killed"), Color::Red);
        assert_eq!(result_color("miss_loss"), Color::Red);
        assert_eq!(result_color("unknown"), Color::DarkGray);
    }
}
