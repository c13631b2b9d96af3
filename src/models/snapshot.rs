// ============================================================================
// Structure : PriceSnapshot (Open, High, Low, Close + cible)
// ============================================================================
// Résumé OHLC du segment courant, reconstruit à chaque cycle de polling
// puis passé au CandleRenderer.
//
// CONCEPTS RUST :
// 1. f64 : précision suffisante pour des prix décodés à 9 décimales
// 2. Option<Vec<Band>> : les bandes sont facultatives (mode ticks sinon)
// 3. fold : agrégation en une passe sur les mises à jour de prix
// ============================================================================

use crate::models::Segment;

/// Clés de couleur partagées par le modèle et le rendu
pub const COLOR_SUCCESS: &str = "success";
pub const COLOR_PRIMARY: &str = "primary";
pub const COLOR_ERROR: &str = "error";

/// Anneau de distance autour du prix cible
///
/// Les bandes sont ordonnées : la bande i couvre ]distance(i-1), distance(i)],
/// la première part du prix cible lui-même.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    /// Distance relative à la cible (0.005 = ±0.5%)
    pub distance: f64,

    /// Clé de couleur (résolue par la surface de rendu)
    pub color_key: String,

    /// Bande contenant le prix courant
    pub active: bool,
}

impl Band {
    pub fn new(distance: f64, color_key: impl Into<String>) -> Self {
        Self {
            distance,
            color_key: color_key.into(),
            active: false,
        }
    }
}

/// Bandes par défaut : ±0.5%, ±1.5%, ±3%
pub fn default_bands() -> Vec<Band> {
    vec![
        Band::new(0.005, COLOR_SUCCESS),
        Band::new(0.015, COLOR_PRIMARY),
        Band::new(0.03, COLOR_ERROR),
    ]
}

/// Couleurs attribuées aux bandes configurées, dans l'ordre
pub fn band_color(index: usize) -> &'static str {
    match index {
        0 => COLOR_SUCCESS,
        1 => COLOR_PRIMARY,
        _ => COLOR_ERROR,
    }
}

/// Instantané des prix du segment
///
/// `low <= open, close <= high` est à la charge de l'appelant : le rendu ne
/// valide rien. `target` peut sortir de [low, high].
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub target: f64,

    /// Bandes de seuil optionnelles
    pub bands: Option<Vec<Band>>,
}

impl PriceSnapshot {
    pub fn new(open: f64, high: f64, low: f64, close: f64, target: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            target,
            bands: None,
        }
    }

    /// Ajoute des bandes (builder)
    pub fn with_bands(mut self, bands: Vec<Band>) -> Self {
        self.bands = Some(bands);
        self
    }

    /// Agrège l'ouverture du segment et les mises à jour de prix
    ///
    /// - open : ouverture du segment (la cible si la sentinelle vaut 0)
    /// - high/low : extrêmes de tous les prix vus, ouverture comprise
    /// - close : dernier prix vu, ou l'ouverture sans mise à jour
    pub fn aggregate(segment: &Segment, prices: &[f64]) -> Self {
        let open = segment.effective_open();

        let (high, low, close) = prices
            .iter()
            .fold((open, open, open), |(high, low, _), &price| {
                (high.max(price), low.min(price), price)
            });

        Self::new(open, high, low, close, segment.target_price)
    }

    /// Chandelle baissière (close < open)
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Écart relatif entre le prix courant et la cible
    pub fn deviation(&self) -> f64 {
        if self.target == 0.0 {
            return f64::INFINITY;
        }
        ((self.close - self.target) / self.target).abs()
    }

    /// Marque comme active la bande qui contient le prix courant
    ///
    /// Au-delà de la dernière bande, aucune n'est active.
    pub fn activate_bands(&mut self) {
        let deviation = self.deviation();
        if let Some(bands) = self.bands.as_mut() {
            let mut found = false;
            for band in bands.iter_mut() {
                band.active = !found && deviation <= band.distance;
                found |= band.active;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_running_extremes() {
        let segment = Segment::new(100, 10.0, 9.5);
        let snapshot = PriceSnapshot::aggregate(&segment, &[9.8, 10.4, 9.2, 9.9]);

        assert_eq!(snapshot.open, 9.5);
        assert_eq!(snapshot.high, 10.4);
        assert_eq!(snapshot.low, 9.2);
        assert_eq!(snapshot.close, 9.9);
        assert_eq!(snapshot.target, 10.0);
        assert!(snapshot.bands.is_none());
    }

    #[test]
    fn test_aggregate_without_updates() {
        let segment = Segment::new(100, 10.0, 9.5);
        let snapshot = PriceSnapshot::aggregate(&segment, &[]);

        assert_eq!(snapshot, PriceSnapshot::new(9.5, 9.5, 9.5, 9.5, 10.0));
    }

    #[test]
    fn test_aggregate_zero_open_uses_target() {
        let segment = Segment::new(100, 10.0, 0.0);
        let snapshot = PriceSnapshot::aggregate(&segment, &[10.2]);

        assert_eq!(snapshot.open, 10.0);
        assert_eq!(snapshot.low, 10.0);
        assert_eq!(snapshot.high, 10.2);
        assert_eq!(snapshot.close, 10.2);
    }

    #[test]
    fn test_bearish() {
        assert!(PriceSnapshot::new(10.0, 10.0, 9.0, 9.5, 10.0).is_bearish());
        assert!(!PriceSnapshot::new(10.0, 10.0, 9.0, 10.0, 10.0).is_bearish());
    }

    #[test]
    fn test_activate_bands() {
        // close à 1% de la cible : deuxième bande (0.5% < 1% <= 1.5%)
        let mut snapshot =
            PriceSnapshot::new(100.0, 101.0, 100.0, 101.0, 100.0).with_bands(default_bands());
        snapshot.activate_bands();

        let active: Vec<bool> = snapshot
            .bands
            .as_ref()
            .unwrap()
            .iter()
            .map(|b| b.active)
            .collect();
        assert_eq!(active, vec![false, true, false]);
    }

    #[test]
    fn test_activate_bands_outside_all() {
        let mut snapshot =
            PriceSnapshot::new(100.0, 110.0, 100.0, 110.0, 100.0).with_bands(default_bands());
        snapshot.activate_bands();
        assert!(snapshot.bands.unwrap().iter().all(|b| !b.active));
    }

    #[test]
    fn test_decorated_copy_leaves_source_untouched() {
        // App décore une copie du snapshot reçu du worker
        let source = PriceSnapshot::new(9.5, 10.4, 9.2, 9.9, 10.0).with_bands(default_bands());
        let mut decorated = source.clone();
        decorated.activate_bands();

        assert_ne!(decorated, source);
        assert!(source.bands.iter().flatten().all(|band| !band.active));
    }

    #[test]
    fn test_deviation_zero_target() {
        let snapshot = PriceSnapshot::new(1.0, 1.0, 1.0, 1.0, 0.0);
        assert!(snapshot.deviation().is_infinite());
    }
}
