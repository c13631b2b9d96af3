// ============================================================================
// Erreurs : lecture de la chaîne
// ============================================================================
// Taxonomie des échecs d'un cycle de polling
//
// CONCEPT RUST : thiserror
// - #[derive(Error)] génère l'implémentation de std::error::Error
// - #[error("...")] définit le message de Display
// - #[from] permet la conversion automatique avec l'opérateur ?
//
// Aucune de ces erreurs n'est affichée à l'utilisateur : le driver les
// logge et le cycle suivant repart de zéro.
// ============================================================================

use thiserror::Error;

/// Erreurs remontées par le `SegmentLocator` et les sources de logs
#[derive(Debug, Error)]
pub enum ChainError {
    /// Aucun marqueur "Segment" trouvé dans le budget de fenêtres
    #[error("segment not found below block {to_block} after {retries} retries")]
    SegmentNotFound { to_block: u64, retries: u32 },

    /// Le noeud a refusé la requête (erreur JSON-RPC)
    #[error("log query failed: {0}")]
    LogQuery(String),

    /// Erreur de transport HTTP
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Payload hexadécimal ou ABI illisible
    #[error("malformed payload: {0}")]
    Decode(String),
}

impl ChainError {
    /// Vrai pour les erreurs de requête (transport ou RPC)
    pub fn is_query_error(&self) -> bool {
        matches!(self, ChainError::LogQuery(_) | ChainError::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_not_found_message() {
        let err = ChainError::SegmentNotFound {
            to_block: 40_000,
            retries: 11,
        };
        assert_eq!(
            err.to_string(),
            "segment not found below block 40000 after 11 retries"
        );
        assert!(!err.is_query_error());
    }

    #[test]
    fn test_query_error_classification() {
        assert!(ChainError::LogQuery("limit exceeded".to_string()).is_query_error());
        assert!(!ChainError::Decode("odd length".to_string()).is_query_error());
    }
}
