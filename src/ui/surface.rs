// ============================================================================
// Surface de rendu 2D
// ============================================================================
// Contrat minimal entre le CandleRenderer et ce qui affiche réellement les
// pixels : effacement, chemins, rectangles et polygones pleins, texte.
//
// CONCEPTS RUST :
// 1. Trait : le renderer est générique sur la surface (S: RenderSurface)
// 2. Enum avec données : chaque primitive enregistrée est un DrawCommand
// 3. Ownership : la surface est possédée par le renderer
// ============================================================================

/// Point en pixels, origine en haut à gauche
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Taille entière en pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Rectangle en pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Région couvrant toute une surface
    pub fn full(size: Size) -> Self {
        Self::new(0.0, 0.0, f64::from(size.width), f64::from(size.height))
    }

    fn covers(&self, size: Size) -> bool {
        self.x <= 0.0
            && self.y <= 0.0
            && self.x + self.width >= f64::from(size.width)
            && self.y + self.height >= f64::from(size.height)
    }
}

/// Alignement horizontal du texte autour du point d'ancrage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Style de trait
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: f64,
}

impl Stroke {
    pub fn new(color: impl Into<String>, width: f64) -> Self {
        Self {
            color: color.into(),
            width,
        }
    }
}

/// Style de remplissage
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub color: String,
    /// Opacité entre 0.0 et 1.0
    pub opacity: f64,
}

impl Fill {
    pub fn new(color: impl Into<String>, opacity: f64) -> Self {
        Self {
            color: color.into(),
            opacity,
        }
    }

    pub fn solid(color: impl Into<String>) -> Self {
        Self::new(color, 1.0)
    }
}

/// Style de texte
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub color: String,
    pub align: TextAlign,
    pub font_px: u32,
}

/// Surface de dessin 2D redimensionnable
pub trait RenderSurface {
    /// Taille actuelle du buffer en pixels
    fn size(&self) -> Size;

    /// Redimensionne le buffer (efface son contenu)
    fn set_size(&mut self, size: Size);

    /// Boîte de layout mesurée par l'hôte
    fn layout_box(&self) -> Size;

    fn clear_rect(&mut self, region: Region);

    /// Trace une polyligne
    fn stroke_path(&mut self, points: &[Point], stroke: &Stroke);

    fn fill_rect(&mut self, region: Region, fill: &Fill);

    /// Remplit un polygone fermé
    fn fill_path(&mut self, points: &[Point], fill: &Fill);

    fn fill_text(&mut self, text: &str, at: Point, style: &TextStyle);
}

/// Primitive enregistrée par `RecordingSurface`
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Region),
    Path { points: Vec<Point>, stroke: Stroke },
    Rect { region: Region, fill: Fill },
    Polygon { points: Vec<Point>, fill: Fill },
    Text { text: String, at: Point, style: TextStyle },
}

/// Surface qui enregistre les primitives au lieu de les rastériser
///
/// Un effacement complet jette la frame précédente, comme le ferait un
/// canvas : `commands()` contient donc toujours la dernière frame.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    size: Size,
    layout: Size,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    /// Crée une surface dont la boîte de layout vaut `layout`
    pub fn new(layout: Size) -> Self {
        Self {
            size: Size::default(),
            layout,
            commands: Vec::new(),
        }
    }

    /// Met à jour la boîte de layout (l'hôte a été redimensionné)
    ///
    /// Ne change pas la taille du buffer : c'est le rôle de `resize()` côté renderer.
    pub fn set_layout(&mut self, layout: Size) {
        self.layout = layout;
    }

    /// Primitives de la dernière frame
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Textes de la dernière frame, dans l'ordre de dessin
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl RenderSurface for RecordingSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn set_size(&mut self, size: Size) {
        self.size = size;
        self.commands.clear();
    }

    fn layout_box(&self) -> Size {
        self.layout
    }

    fn clear_rect(&mut self, region: Region) {
        if region.covers(self.size) {
            self.commands.clear();
        }
        self.commands.push(DrawCommand::Clear(region));
    }

    fn stroke_path(&mut self, points: &[Point], stroke: &Stroke) {
        self.commands.push(DrawCommand::Path {
            points: points.to_vec(),
            stroke: stroke.clone(),
        });
    }

    fn fill_rect(&mut self, region: Region, fill: &Fill) {
        self.commands.push(DrawCommand::Rect {
            region,
            fill: fill.clone(),
        });
    }

    fn fill_path(&mut self, points: &[Point], fill: &Fill) {
        self.commands.push(DrawCommand::Polygon {
            points: points.to_vec(),
            fill: fill.clone(),
        });
    }

    fn fill_text(&mut self, text: &str, at: Point, style: &TextStyle) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            at,
            style: style.clone(),
        });
    }
}
