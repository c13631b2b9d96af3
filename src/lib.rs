// ============================================================================
// candlewatch - Library
// ============================================================================
// Expose les modules publics pour le binaire et les tests
// ============================================================================

pub mod api;    // Source de logs JSON-RPC et SegmentLocator
pub mod app;    // État de l'application
pub mod config; // Configuration (variables d'environnement)
pub mod error;  // Erreurs typées de lecture de la chaîne
pub mod models; // Structures de données
pub mod ui;     // Rendu du chandelier et interface utilisateur
