// ============================================================================
// Canvas - Peinture d'une frame enregistrée dans le terminal
// ============================================================================
// Rejoue les DrawCommand d'une RecordingSurface sur un widget Canvas ratatui
//
// ALGORITHME :
// - Une cellule du terminal vaut 8x16 px : la boîte de layout d'une zone
//   est donc (colonnes * 8, lignes * 16), ce qui rend les seuils du renderer
//   (640, 800, 600 px) applicables tels quels
// - Marker braille : 2x4 points par cellule, soit un point pour 4x4 px
// - Les surfaces pleines sont hachurées en lignes horizontales ; l'opacité
//   devient l'espacement entre lignes
// - Le canvas a son origine en bas à gauche : y_canvas = hauteur - y
// ============================================================================

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::Span,
    widgets::canvas::{Canvas, Context, Line},
    Frame,
};

use crate::ui::surface::{DrawCommand, Fill, Point, Region, Size, TextAlign};

// ============================================================================
// Constantes
// ============================================================================

/// Taille d'une cellule du terminal en pixels logiques
pub const CELL_WIDTH_PX: u32 = 8;
pub const CELL_HEIGHT_PX: u32 = 16;

const BULLISH_COLOR: Color = Color::Rgb(52, 208, 88);
const BEARISH_COLOR: Color = Color::Rgb(234, 74, 90);
const PRIMARY_COLOR: Color = Color::Rgb(16, 141, 224);
const WARNING_COLOR: Color = Color::Rgb(240, 180, 40);

/// Boîte de layout d'une zone du terminal
pub fn layout_box(area: Rect) -> Size {
    Size::new(
        u32::from(area.width) * CELL_WIDTH_PX,
        u32::from(area.height) * CELL_HEIGHT_PX,
    )
}

/// Résout une clé de couleur
pub fn palette(key: &str) -> Color {
    match key {
        "text-primary" => Color::White,
        "primary" => PRIMARY_COLOR,
        "success" => BULLISH_COLOR,
        "error" => BEARISH_COLOR,
        "warning" => WARNING_COLOR,
        _ => Color::Gray,
    }
}

/// Espacement des hachures selon l'opacité
fn fill_step(opacity: f64) -> f64 {
    if opacity >= 0.9 {
        4.0
    } else if opacity >= 0.3 {
        8.0
    } else {
        16.0
    }
}

/// Abscisse de départ d'un texte selon son alignement
fn text_start_x(text: &str, anchor: f64, align: TextAlign) -> f64 {
    let width = text.chars().count() as f64 * f64::from(CELL_WIDTH_PX);
    let x = match align {
        TextAlign::Left => anchor,
        TextAlign::Center => anchor - width / 2.0,
        TextAlign::Right => anchor - width,
    };
    x.max(0.0)
}

/// Segments [x0, x1] d'un polygone coupés par la droite horizontale y
///
/// Règle pair-impair : les intersections triées sont prises deux à deux.
fn scanline_spans(points: &[Point], y: f64) -> Vec<(f64, f64)> {
    let mut crossings: Vec<f64> = Vec::new();

    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        // Intervalle semi-ouvert : un sommet n'est compté qu'une fois
        if (a.y <= y && b.y > y) || (b.y <= y && a.y > y) {
            let t = (y - a.y) / (b.y - a.y);
            crossings.push(a.x + t * (b.x - a.x));
        }
    }

    crossings.sort_by(|a, b| a.total_cmp(b));
    crossings
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect()
}

// ============================================================================
// Peinture
// ============================================================================

/// Peint une frame enregistrée dans `area`
///
/// `size` est la taille du buffer au moment de l'enregistrement ; elle fixe
/// les bornes du canvas.
pub fn render_commands(frame: &mut Frame, area: Rect, commands: &[DrawCommand], size: Size) {
    if size.is_empty() || area.width == 0 || area.height == 0 {
        return;
    }

    let width = f64::from(size.width);
    let height = f64::from(size.height);

    let canvas = Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(move |ctx| {
            // Les zones pleines d'abord, le texte par-dessus
            for command in commands {
                paint_shape(ctx, command, height);
            }
            ctx.layer();
            for command in commands {
                if let DrawCommand::Text { text, at, style } = command {
                    let x = text_start_x(text, at.x, style.align);
                    let span = Span::styled(
                        text.clone(),
                        Style::default()
                            .fg(palette(&style.color))
                            .add_modifier(Modifier::BOLD),
                    );
                    ctx.print(x, height - at.y, span);
                }
            }
        });

    frame.render_widget(canvas, area);
}

fn paint_shape(ctx: &mut Context, command: &DrawCommand, height: f64) {
    match command {
        DrawCommand::Path { points, stroke } => {
            let color = palette(&stroke.color);
            for pair in points.windows(2) {
                ctx.draw(&Line {
                    x1: pair[0].x,
                    y1: height - pair[0].y,
                    x2: pair[1].x,
                    y2: height - pair[1].y,
                    color,
                });
            }
        }
        DrawCommand::Rect { region, fill } => paint_rect(ctx, *region, fill, height),
        DrawCommand::Polygon { points, fill } => paint_polygon(ctx, points, fill, height),
        DrawCommand::Clear(_) | DrawCommand::Text { .. } => {}
    }
}

fn paint_rect(ctx: &mut Context, region: Region, fill: &Fill, height: f64) {
    let color = palette(&fill.color);
    let step = fill_step(fill.opacity);

    // Un corps plus fin qu'une hachure reste visible
    if region.height < step {
        let y = height - (region.y + region.height / 2.0);
        ctx.draw(&Line {
            x1: region.x,
            y1: y,
            x2: region.x + region.width,
            y2: y,
            color,
        });
        return;
    }

    for y in hatch_rows(region.y, region.y + region.height, step, height) {
        ctx.draw(&Line {
            x1: region.x,
            y1: height - y,
            x2: region.x + region.width,
            y2: height - y,
            color,
        });
    }
}

fn paint_polygon(ctx: &mut Context, points: &[Point], fill: &Fill, height: f64) {
    if points.len() < 3 {
        return;
    }

    let color = palette(&fill.color);
    let step = fill_step(fill.opacity);

    let top = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let bottom = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

    for y in hatch_rows(top, bottom, step, height) {
        for (x0, x1) in scanline_spans(points, y) {
            ctx.draw(&Line {
                x1: x0,
                y1: height - y,
                x2: x1,
                y2: height - y,
                color,
            });
        }
    }
}

/// Ordonnées des hachures d'une forme couvrant [top, bottom]
///
/// Seule la partie visible [0, height] est hachurée : une bande très loin du
/// prix (plage OHLC quasi nulle) peut s'étendre sur des milliards de pixels.
/// Les lignes sont alignées sur une grille globale, deux zones adjacentes ne
/// produisent donc pas de lignes doublées à leur frontière.
fn hatch_rows(top: f64, bottom: f64, step: f64, height: f64) -> Vec<f64> {
    let top = top.max(0.0);
    let bottom = bottom.min(height);
    if !(top.is_finite() && bottom.is_finite()) || top > bottom || step <= 0.0 {
        return Vec::new();
    }

    let first = (top / step).ceil() as u64;
    let last = (bottom / step).floor() as u64;
    (first..=last).map(|row| row as f64 * step).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_bands, PriceSnapshot};
    use crate::ui::candle::{CandleRenderer, RenderConfig};
    use crate::ui::surface::{RecordingSurface, RenderSurface};
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::{Duration, Instant};

    #[test]
    fn test_layout_box() {
        let size = layout_box(Rect::new(0, 0, 100, 40));
        assert_eq!(size, Size::new(800, 640));
    }

    #[test]
    fn test_palette() {
        assert_eq!(palette("success"), BULLISH_COLOR);
        assert_eq!(palette("error"), BEARISH_COLOR);
        assert_eq!(palette("primary"), PRIMARY_COLOR);
        assert_eq!(palette("unknown"), Color::Gray);
    }

    #[test]
    fn test_fill_step_follows_opacity() {
        assert_eq!(fill_step(1.0), 4.0);
        assert_eq!(fill_step(0.45), 8.0);
        assert_eq!(fill_step(0.15), 16.0);
    }

    #[test]
    fn test_hatch_rows_clamped_to_surface() {
        assert_eq!(hatch_rows(10.0, 40.0, 16.0, 480.0), vec![16.0, 32.0]);

        // Zone immense : seules les lignes visibles sont produites
        let rows = hatch_rows(-3.0e12, 5.0e12, 4.0, 480.0);
        assert_eq!(rows.len(), 121);
        assert_eq!(rows.first(), Some(&0.0));
        assert_eq!(rows.last(), Some(&480.0));

        // Entièrement hors champ
        assert!(hatch_rows(-900.0, -100.0, 4.0, 480.0).is_empty());
        assert!(hatch_rows(600.0, 900.0, 4.0, 480.0).is_empty());
        assert!(hatch_rows(f64::NAN, 10.0, 4.0, 480.0).is_empty());
    }

    #[test]
    fn test_near_flat_snapshot_with_bands_paints_quickly() {
        // Plage OHLC de quelques unités brutes : les bandes tombent à des
        // milliards de pixels du chandelier
        let area = Rect::new(0, 0, 100, 30);
        let mut renderer = CandleRenderer::configure(
            RecordingSurface::new(layout_box(area)),
            RenderConfig::default(),
        );
        let price = 10.000_001;
        renderer.render(
            PriceSnapshot::new(price, price, price, price, 10.0).with_bands(default_bands()),
        );

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        let started = Instant::now();
        terminal
            .draw(|frame| {
                render_commands(
                    frame,
                    area,
                    renderer.surface().commands(),
                    renderer.surface().size(),
                )
            })
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_text_alignment() {
        // "9.9000" : 6 caractères = 48 px
        assert_eq!(text_start_x("9.9000", 100.0, TextAlign::Left), 100.0);
        assert_eq!(text_start_x("9.9000", 100.0, TextAlign::Center), 76.0);
        assert_eq!(text_start_x("9.9000", 100.0, TextAlign::Right), 52.0);
        assert_eq!(text_start_x("9.9000", 10.0, TextAlign::Right), 0.0);
    }

    #[test]
    fn test_scanline_rectangle() {
        let square = [
            Point::new(0.0, 10.0),
            Point::new(50.0, 10.0),
            Point::new(50.0, 30.0),
            Point::new(0.0, 30.0),
        ];

        assert_eq!(scanline_spans(&square, 20.0), vec![(0.0, 50.0)]);
        assert!(scanline_spans(&square, 40.0).is_empty());
    }

    #[test]
    fn test_scanline_concave() {
        // Forme en U : deux segments à mi-hauteur
        let shape = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 20.0),
            Point::new(20.0, 20.0),
            Point::new(20.0, 0.0),
            Point::new(30.0, 0.0),
            Point::new(30.0, 30.0),
            Point::new(0.0, 30.0),
        ];

        assert_eq!(scanline_spans(&shape, 10.0), vec![(0.0, 10.0), (20.0, 30.0)]);
        assert_eq!(scanline_spans(&shape, 25.0), vec![(0.0, 30.0)]);
    }

    #[test]
    fn test_render_commands_draws_labels() {
        let area = Rect::new(0, 0, 100, 40);
        let mut renderer = CandleRenderer::configure(
            RecordingSurface::new(layout_box(area)),
            RenderConfig::default(),
        );
        renderer.render(PriceSnapshot::new(9.5, 10.4, 9.2, 9.9, 10.0));

        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal
            .draw(|frame| {
                render_commands(
                    frame,
                    area,
                    renderer.surface().commands(),
                    renderer.surface().size(),
                )
            })
            .unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(content.contains("T: 10.0000"));
        assert!(content.contains("9.9000"));
    }

    #[test]
    fn test_render_commands_empty_surface() {
        let mut terminal = Terminal::new(TestBackend::new(10, 5)).unwrap();
        terminal
            .draw(|frame| render_commands(frame, Rect::new(0, 0, 10, 5), &[], Size::default()))
            .unwrap();
    }
}
