// ============================================================================
// CandleRenderer : chandelier unique sur surface 2D
// ============================================================================
// Dessine le chandelier du segment courant, ses étiquettes de prix, la cible
// et les repères de distance (bandes ou ticks) sur une RenderSurface.
//
// ALGORITHME :
// - Bornes : [min(cible, low), max(cible, high)] (+ marge relative optionnelle)
// - Padding vertical : (haut - bas) / K, K = 16 si la surface dépasse 600px
//   de haut, 8 sinon
// - Projection linéaire prix -> pixel, dessinée depuis le bas
// - Rendu complet et sans état à chaque appel : toute la géométrie est
//   recalculée depuis la taille courante de la surface
//
// ÉTATS :
// - Unbound : aucun snapshot, un resize ne fait que redimensionner
// - Bound : un snapshot connu, chaque resize le redessine
// ============================================================================

use tracing::trace;

use crate::models::{Band, PriceSnapshot};
use crate::ui::surface::{Fill, Point, Region, RenderSurface, Size, Stroke, TextAlign, TextStyle};

pub use crate::models::snapshot::{COLOR_ERROR, COLOR_PRIMARY, COLOR_SUCCESS};

// ============================================================================
// Constantes
// ============================================================================

/// Couleur du texte et des connecteurs neutres
pub const COLOR_TEXT: &str = "text-primary";

/// Largeur du corps du chandelier
pub const CANDLE_WIDTH: f64 = 32.0;

/// Au-delà de cette hauteur, padding réduit (K = 16)
const TALL_VIEWPORT_PX: u32 = 600;

/// En dessous de cette largeur, étiquettes sans préfixe
const NARROW_VIEWPORT_PX: u32 = 640;

/// Au-delà de cette largeur, police agrandie
const WIDE_VIEWPORT_PX: u32 = 800;

const LINE_WIDTH: f64 = 4.0;

/// Longueur des ticks de distance au bord droit
const TICK_LENGTH: f64 = 12.0;

/// Ticks fixes utilisés quand aucune bande n'est fournie
const FIXED_TICKS: [(f64, &str); 3] = [
    (0.005, COLOR_SUCCESS),
    (0.02, COLOR_PRIMARY),
    (0.05, COLOR_ERROR),
];

const BAND_OPACITY: f64 = 0.15;
const ACTIVE_BAND_OPACITY: f64 = 0.45;

// ============================================================================
// Configuration
// ============================================================================

/// Paramètres de rendu
///
/// Remplace les variantes du renderer (précision, préfixe monétaire, marge) :
/// une seule implémentation, paramétrée.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Chiffres après la virgule
    pub digits: usize,

    /// Préfixe "$" devant chaque prix
    pub currency_prefix: bool,

    /// Marge relative autour de la cible avant min/max (0.02 = ±2%)
    pub padding_fraction: f64,

    pub candle_width: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            digits: 4,
            currency_prefix: false,
            padding_fraction: 0.0,
            candle_width: CANDLE_WIDTH,
        }
    }
}

impl RenderConfig {
    /// Formate un prix selon la précision et le préfixe configurés
    pub fn format_price(&self, price: f64) -> String {
        let prefix = if self.currency_prefix { "$" } else { "" };
        format!("{}{:.*}", prefix, self.digits, price)
    }

    /// Étiquette adaptée à la largeur : "High: 1.2345" ou "1.2345"
    pub fn with_label(&self, label: &str, price: f64, width: u32) -> String {
        if width < NARROW_VIEWPORT_PX {
            self.format_price(price)
        } else {
            format!("{}: {}", label, self.format_price(price))
        }
    }
}

// ============================================================================
// Échelle de prix
// ============================================================================

/// Projection linéaire prix -> pixel pour une hauteur donnée
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceScale {
    min: f64,
    max: f64,
    height: f64,
}

impl PriceScale {
    /// Calcule l'échelle d'un snapshot pour une surface
    pub fn fit(snapshot: &PriceSnapshot, config: &RenderConfig, size: Size) -> Self {
        let padding = snapshot.target * config.padding_fraction;
        let low_bound = (snapshot.target - padding).min(snapshot.low);
        let high_bound = (snapshot.target + padding).max(snapshot.high);

        let divisor = if size.height > TALL_VIEWPORT_PX { 16.0 } else { 8.0 };
        let pad = (high_bound - low_bound) / divisor;

        Self {
            min: low_bound - pad,
            max: high_bound + pad,
            height: f64::from(size.height),
        }
    }

    /// Bornes de l'échelle (min, max)
    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Hauteur du prix mesurée depuis le bas
    ///
    /// Une plage nulle (tous les prix égaux) place tout à mi-hauteur.
    pub fn to_pixel(&self, price: f64) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 || !range.is_finite() {
            return self.height / 2.0;
        }
        (price - self.min) / range * self.height
    }

    /// Ordonnée du prix mesurée depuis le haut (coordonnée de dessin)
    pub fn to_y(&self, price: f64) -> f64 {
        self.height - self.to_pixel(price)
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// État du renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    /// Aucun snapshot rendu
    Unbound,
    /// Un snapshot est connu et rejoué à chaque resize
    Bound,
}

/// Renderer de chandelier sur une surface possédée
pub struct CandleRenderer<S: RenderSurface> {
    surface: S,
    config: RenderConfig,
    last: Option<PriceSnapshot>,
}

impl<S: RenderSurface> CandleRenderer<S> {
    /// Lie le renderer à une surface et l'ajuste immédiatement à son layout
    pub fn configure(surface: S, config: RenderConfig) -> Self {
        let mut renderer = Self {
            surface,
            config,
            last: None,
        };
        renderer.resize();
        renderer
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn last_snapshot(&self) -> Option<&PriceSnapshot> {
        self.last.as_ref()
    }

    pub fn state(&self) -> RendererState {
        if self.last.is_some() {
            RendererState::Bound
        } else {
            RendererState::Unbound
        }
    }

    /// Ajuste le buffer à la boîte de layout, puis rejoue le dernier snapshot
    ///
    /// La taille passe d'abord à zéro pour que la mesure ne dépende pas du
    /// contenu actuel du buffer.
    pub fn resize(&mut self) {
        self.surface.set_size(Size::default());
        let measured = self.surface.layout_box();
        self.surface.set_size(measured);

        trace!(width = measured.width, height = measured.height, "Surface resized");

        if let Some(snapshot) = self.last.as_ref() {
            draw_snapshot(&mut self.surface, &self.config, snapshot);
        }
    }

    /// Mémorise le snapshot et redessine toute la surface
    pub fn render(&mut self, snapshot: PriceSnapshot) {
        let snapshot = self.last.insert(snapshot);
        draw_snapshot(&mut self.surface, &self.config, snapshot);
    }
}

/// Dessine une frame complète
fn draw_snapshot<S: RenderSurface>(surface: &mut S, config: &RenderConfig, snapshot: &PriceSnapshot) {
    let size = surface.size();
    let width = f64::from(size.width);
    let height = f64::from(size.height);

    surface.clear_rect(Region::full(size));

    let scale = PriceScale::fit(snapshot, config, size);
    let center = width / 2.0;
    let candle_x = center - config.candle_width / 2.0;

    let candle_color = if snapshot.is_bearish() {
        COLOR_ERROR
    } else {
        COLOR_SUCCESS
    };

    let open_y = scale.to_y(snapshot.open);
    let high_y = scale.to_y(snapshot.high);
    let low_y = scale.to_y(snapshot.low);
    let close_y = scale.to_y(snapshot.close);
    let target_y = scale.to_y(snapshot.target);

    // Bandes en arrière-plan
    let bands = snapshot.bands.as_deref().filter(|bands| !bands.is_empty());
    if let Some(bands) = bands {
        draw_bands(surface, &scale, snapshot.target, bands, width);
    }

    let font_px = if size.width > WIDE_VIEWPORT_PX { 16 } else { 14 };
    let text = |color: &str, align: TextAlign| TextStyle {
        color: color.to_string(),
        align,
        font_px,
    };
    let neutral = Stroke::new(COLOR_TEXT, LINE_WIDTH);

    // High au-dessus, Low en dessous ; rien si la chandelle est plate
    if snapshot.high != snapshot.low {
        let centered = text(COLOR_TEXT, TextAlign::Center);
        if snapshot.high != snapshot.close {
            surface.fill_text(
                &config.with_label("High", snapshot.high, size.width),
                Point::new(center, high_y - 5.0),
                &centered,
            );
        }
        if snapshot.low != snapshot.close {
            surface.fill_text(
                &config.with_label("Low", snapshot.low, size.width),
                Point::new(center, low_y + 22.0),
                &centered,
            );
        }
    }

    // Prix courant à droite, avec son connecteur
    surface.fill_text(
        &config.format_price(snapshot.close),
        Point::new(width - 16.0, close_y - 5.0),
        &text(COLOR_TEXT, TextAlign::Right),
    );
    let close_offset = if snapshot.is_bearish() { 2.0 } else { -2.0 };
    surface.stroke_path(
        &[
            Point::new(center - 2.0, close_y + close_offset),
            Point::new(width, close_y + close_offset),
        ],
        &neutral,
    );

    // Cible à gauche
    surface.fill_text(
        &config.with_label("T", snapshot.target, size.width),
        Point::new(0.0, target_y - 5.0),
        &text(COLOR_PRIMARY, TextAlign::Left),
    );
    surface.stroke_path(
        &[Point::new(0.0, target_y), Point::new(center + 2.0, target_y)],
        &Stroke::new(COLOR_PRIMARY, LINE_WIDTH),
    );

    if bands.is_none() {
        for (distance, color) in FIXED_TICKS {
            draw_tick(surface, &scale, snapshot.target, distance, color, width);
        }
    }

    // Mèche puis corps
    surface.stroke_path(
        &[Point::new(center, high_y), Point::new(center, low_y)],
        &Stroke::new(candle_color, LINE_WIDTH),
    );
    surface.fill_rect(
        Region::new(
            candle_x,
            open_y.min(close_y),
            config.candle_width,
            (open_y - close_y).abs(),
        ),
        &Fill::solid(candle_color),
    );
}

/// Zones des bandes : deux par bande, de part et d'autre de la cible
///
/// La borne intérieure d'une bande est la distance de la précédente ;
/// celle de la première est la cible elle-même.
fn draw_bands<S: RenderSurface>(
    surface: &mut S,
    scale: &PriceScale,
    target: f64,
    bands: &[Band],
    width: f64,
) {
    let mut inner = 0.0;

    for band in bands {
        let opacity = if band.active {
            ACTIVE_BAND_OPACITY
        } else {
            BAND_OPACITY
        };
        let fill = Fill::new(band.color_key.as_str(), opacity);

        for side in [1.0, -1.0] {
            let near_y = scale.to_y(target * (1.0 + side * inner));
            let far_y = scale.to_y(target * (1.0 + side * band.distance));
            surface.fill_path(
                &[
                    Point::new(0.0, near_y),
                    Point::new(width, near_y),
                    Point::new(width, far_y),
                    Point::new(0.0, far_y),
                ],
                &fill,
            );
        }

        inner = band.distance;
    }
}

/// Ticks symétriques au bord droit à ±distance de la cible
fn draw_tick<S: RenderSurface>(
    surface: &mut S,
    scale: &PriceScale,
    target: f64,
    distance: f64,
    color: &str,
    width: f64,
) {
    let stroke = Stroke::new(color, LINE_WIDTH);
    for price in [target + target * distance, target - target * distance] {
        let y = scale.to_y(price);
        surface.stroke_path(
            &[Point::new(width - TICK_LENGTH, y), Point::new(width, y)],
            &stroke,
        );
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
