// ============================================================================
// Structure : Segment
// ============================================================================
// Un segment est une époque de prix de durée fixe, ouverte par un événement
// "Segment" on-chain qui porte le prix cible et la clôture précédente.
// ============================================================================

use chrono::{DateTime, Utc};

/// Durée d'un segment en secondes
pub const SEGMENT_DURATION_SECS: i64 = 3600;

/// Segment découvert par le `SegmentLocator`
///
/// Immutable une fois trouvé : un nouveau cycle de polling en reconstruit un.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Bloc du marqueur
    pub start_block: u64,

    /// Prix cible du segment
    pub target_price: f64,

    /// Prix d'ouverture (clôture du segment précédent, 0 si aucune)
    pub open_price: f64,
}

impl Segment {
    pub fn new(start_block: u64, target_price: f64, open_price: f64) -> Self {
        Self {
            start_block,
            target_price,
            open_price,
        }
    }

    /// Prix d'ouverture effectif
    ///
    /// Zéro est la sentinelle "pas encore de clôture" : on ouvre alors au prix cible.
    pub fn effective_open(&self) -> f64 {
        if self.open_price == 0.0 {
            self.target_price
        } else {
            self.open_price
        }
    }
}

/// Avancement du segment courant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentProgress {
    /// Le segment est en cours
    Running { elapsed: i64, remaining: i64 },

    /// Durée écoulée : la transaction de clôture est attendue
    Pending,
}

impl SegmentProgress {
    /// Calcule l'avancement à l'instant `now`
    pub fn at(started_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let elapsed = (now - started_at).num_seconds().max(0);
        if elapsed < SEGMENT_DURATION_SECS {
            SegmentProgress::Running {
                elapsed,
                remaining: SEGMENT_DURATION_SECS - elapsed,
            }
        } else {
            SegmentProgress::Pending
        }
    }

    /// Ratio d'avancement entre 0.0 et 1.0 (pour une jauge)
    pub fn ratio(&self) -> f64 {
        match self {
            SegmentProgress::Running { elapsed, .. } => {
                *elapsed as f64 / SEGMENT_DURATION_SECS as f64
            }
            SegmentProgress::Pending => 1.0,
        }
    }

    /// Texte affiché : "12m 5s" ou "pending TX"
    pub fn label(&self) -> String {
        match self {
            SegmentProgress::Running { remaining, .. } => {
                let minutes = remaining / 60;
                let seconds = remaining - minutes * 60;
                format!("{}m {}s", minutes, seconds)
            }
            SegmentProgress::Pending => "pending TX".to_string(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SegmentProgress::Pending)
    }
}
