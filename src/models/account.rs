// ============================================================================
// Structure : AccountFunds
// ============================================================================
// Fonds verrouillés et contributions d'une adresse, lus via eth_call
// ============================================================================

/// Vues du contrat pour une adresse (en unités décimales, 9 décimales)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountFunds {
    /// Tokens verrouillés
    pub locked: f64,

    /// Contributions cumulées
    pub contributions: f64,
}

impl AccountFunds {
    pub fn new(locked: f64, contributions: f64) -> Self {
        Self {
            locked,
            contributions,
        }
    }
}

/// Formate une valeur en gwei avec 3 décimales
pub fn format_gwei(value: f64) -> String {
    format!("{:.3}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_gwei() {
        assert_eq!(format_gwei(12.34567), "12.346");
        assert_eq!(format_gwei(0.0), "0.000");
    }
}
