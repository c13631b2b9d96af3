// ============================================================================
// Module : ui
// ============================================================================
// Rendu du chandelier (indépendant du terminal) et interface TUI
// ============================================================================

pub mod candle;    // CandleRenderer : prix -> pixels sur une RenderSurface
pub mod canvas;    // Peinture d'une frame enregistrée dans un Canvas ratatui
pub mod dashboard; // Rendu de l'interface principale
pub mod events;    // Gestion des événements clavier et resize
pub mod surface;   // Trait RenderSurface et RecordingSurface

// Re-exports pour simplifier les imports
pub use candle::{CandleRenderer, PriceScale, RenderConfig, RendererState};
pub use dashboard::{chart_area, render};
pub use events::{Event, EventHandler};
pub use surface::{RecordingSurface, RenderSurface, Size};
