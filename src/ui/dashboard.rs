// ============================================================================
// Dashboard - Rendu de l'interface principale
// ============================================================================
// Header (progression du segment), contenu (Chart, Rewards ou Wrap), footer
//
// CONCEPTS RATATUI :
// 1. Layout : découpage header / contenu / footer
// 2. Gauge : jauge d'avancement du segment
// 3. Block::inner : zone utile d'un bloc bordé, partagée avec la boucle
//    principale pour mesurer la surface de rendu
// ============================================================================

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use crate::app::{App, Status, StatusKind, View};
use crate::models::{WrapMode, WrapState};
use crate::ui::canvas::{self, palette};
use crate::ui::surface::RenderSurface;

/// Dessine l'interface complète
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = create_layout(frame.size());

    render_header(frame, app, chunks[0]);

    match app.current_view {
        View::Chart => render_chart(frame, app, chunks[1]),
        View::Rewards => render_rewards(frame, app, chunks[1]),
        View::Wrap => render_wrap(frame, app, chunks[1]),
    }

    render_footer(frame, app, chunks[2]);
}

/// Header 3 lignes, contenu, footer 3 lignes
fn create_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area)
        .to_vec()
}

fn chart_block() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Segment ")
}

/// Zone utile du graphique pour une taille de terminal donnée
///
/// La boucle principale s'en sert pour mesurer la surface avant de dessiner.
pub fn chart_area(frame_area: Rect) -> Rect {
    chart_block().inner(create_layout(frame_area)[1])
}

// ============================================================================
// Header
// ============================================================================

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" candlewatch ");

    let mut spans = vec![Span::styled(
        "block ",
        Style::default().fg(Color::Gray),
    )];
    spans.push(Span::styled(
        app.latest_block
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string()),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ));
    if let Some(segment) = &app.segment {
        spans.push(Span::styled("  start ", Style::default().fg(Color::Gray)));
        spans.push(Span::raw(segment.start_block.to_string()));
    }
    if app.last_poll_error.is_some() {
        spans.push(Span::styled(
            "  (stale)",
            Style::default().fg(palette("warning")),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .block(block)
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, chunks[0]);

    let (ratio, label, color) = match app.progress {
        Some(progress) if progress.is_pending() => {
            (1.0, progress.label(), palette("warning"))
        }
        Some(progress) => (progress.ratio(), progress.label(), palette("primary")),
        None => (0.0, "loading...".to_string(), Color::Gray),
    };

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Time left "),
        )
        .gauge_style(Style::default().fg(color))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(label);
    frame.render_widget(gauge, chunks[1]);
}

// ============================================================================
// Vue Chart
// ============================================================================

fn render_chart(frame: &mut Frame, app: &App, area: Rect) {
    let block = chart_block();
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let renderer = app.renderer();
    if renderer.last_snapshot().is_none() {
        let text = Paragraph::new(Line::from(Span::styled(
            "Locating current segment...",
            Style::default().fg(Color::Gray),
        )))
        .alignment(Alignment::Center);
        frame.render_widget(text, inner);
        return;
    }

    canvas::render_commands(
        frame,
        inner,
        renderer.surface().commands(),
        renderer.surface().size(),
    );
}

// ============================================================================
// Vue Rewards
// ============================================================================

fn render_rewards(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(" Rewards ");

    let input_line = Line::from(vec![
        Span::styled(
            "Address: ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(app.input_buffer.as_str(), Style::default().fg(Color::White)),
        Span::styled(
            "█",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::SLOW_BLINK),
        ),
    ]);

    let mut lines = vec![Line::from(""), input_line, Line::from("")];

    if let Some(status) = &app.status {
        lines.push(status_line(status));
    }

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

fn status_line(status: &Status) -> Line<'_> {
    let color = match status.kind {
        StatusKind::Info => Color::Gray,
        StatusKind::Success => palette("success"),
        StatusKind::Error => palette("error"),
    };
    Line::from(Span::styled(
        status.text.as_str(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

// ============================================================================
// Vue Wrap
// ============================================================================
// Lecture seule : le bouton indique l'action possible, l'envoi de la
// transaction reste dans le wallet de l'utilisateur
// ============================================================================

fn render_wrap(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(format!(" {} ", app.wrap_mode.title()));

    if app.wallet_address.is_none() {
        let text = Paragraph::new(Line::from(Span::styled(
            "Look up an address in the Rewards view first",
            Style::default().fg(Color::Gray),
        )))
        .block(block)
        .alignment(Alignment::Center);
        frame.render_widget(text, area);
        return;
    }

    let balance = app
        .wallet_balance_text()
        .unwrap_or_else(|| "balance: -".to_string());

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(
                "Amount: ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(app.amount_buffer.as_str(), Style::default().fg(Color::White)),
            Span::styled(
                "█",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
        ]),
        Line::from(Span::styled(balance, Style::default().fg(Color::Gray))),
        Line::from(""),
    ];

    if let Some(state) = app.wrap_state() {
        lines.push(Line::from(Span::styled(
            format!("[ {} ]", state.label()),
            Style::default()
                .fg(wrap_state_color(app.wrap_mode, state))
                .add_modifier(Modifier::BOLD),
        )));
    }

    if let Some(status) = &app.wallet_status {
        lines.push(Line::from(""));
        lines.push(status_line(status));
    }

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

/// Unwrap s'affiche en variante "warning", wrap en "primary"
fn wrap_state_color(mode: WrapMode, state: WrapState) -> Color {
    match (state, mode) {
        (WrapState::InsufficientBalance, _) => Color::DarkGray,
        (WrapState::Approve, _) => palette("primary"),
        (WrapState::SendTransaction, WrapMode::Wrap) => palette("primary"),
        (WrapState::SendTransaction, WrapMode::Unwrap) => palette("warning"),
    }
}

// ============================================================================
// Footer
// ============================================================================

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let key = |k: &'static str| {
        Span::styled(
            k,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    };

    let shortcuts = if app.is_awaiting_quit_confirmation() {
        Line::from(vec![
            Span::styled(
                "⚠  Appuyez sur ",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "[q]",
                Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled(
                " à nouveau pour quitter, ou n'importe quelle autre touche pour annuler ⚠",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ])
    } else {
        match app.current_view {
            View::Chart => Line::from(vec![
                key("[q]"),
                Span::raw(" Quit  "),
                key("[r]"),
                Span::raw(" Refresh  "),
                key("[Tab]"),
                Span::raw(" Rewards"),
            ]),
            View::Rewards => Line::from(vec![
                key("[Enter]"),
                Span::raw(" Lookup  "),
                key("[ESC]"),
                Span::raw(" Clear  "),
                key("[Tab]"),
                Span::raw(" Wrap  "),
                key("[q]"),
                Span::raw(" Quit"),
            ]),
            View::Wrap => Line::from(vec![
                key("[m]"),
                Span::raw(" Wrap/Unwrap  "),
                key("[ESC]"),
                Span::raw(" Clear  "),
                key("[Tab]"),
                Span::raw(" Chart  "),
                key("[q]"),
                Span::raw(" Quit"),
            ]),
        }
    };

    let paragraph = Paragraph::new(vec![shortcuts])
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}
