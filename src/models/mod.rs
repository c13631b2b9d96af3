// ============================================================================
// Module : models
// ============================================================================
// Structures de données du domaine : segment de prix, instantané OHLC,
// bandes de seuil, fonds d'un compte et soldes wrap / unwrap.
//
// CONCEPT RUST : Modules et visibilité
// - "pub mod" : sous-module accessible depuis l'extérieur du crate
// - "pub use" : re-export pour raccourcir les chemins d'import
// ============================================================================

pub mod account;  // Fonds verrouillés / contributions (vue Rewards)
pub mod segment;  // Segment + progression temporelle
pub mod snapshot; // PriceSnapshot + Band
pub mod wallet;   // Soldes token / wrappé + décision wrap

// Au lieu de : use candlewatch::models::snapshot::PriceSnapshot;
// On peut faire : use candlewatch::models::PriceSnapshot;
pub use account::{format_gwei, AccountFunds};
pub use segment::{Segment, SegmentProgress, SEGMENT_DURATION_SECS};
pub use snapshot::{band_color, default_bands, Band, PriceSnapshot};
pub use wallet::{format_balance, WalletBalances, WrapMode, WrapState, TOKEN_DECIMALS};
