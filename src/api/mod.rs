// ============================================================================
// Module : api
// ============================================================================
// Lecture des données on-chain : source de logs, décodage ABI, et
// reconstruction du segment de prix courant.
// ============================================================================

pub mod abi;     // Décodage des mots ABI et des quantités JSON-RPC
pub mod locator; // Scan des fenêtres de blocs (SegmentLocator)
pub mod rpc;     // Client JSON-RPC (eth_getLogs, eth_call, ...)

use async_trait::async_trait;

use crate::error::ChainError;

// Re-exports
pub use locator::{SegmentLocator, SegmentReport};
pub use rpc::JsonRpcClient;

/// Topic du marqueur : keccak256("Segment(uint256,uint256,uint256,uint256,uint256,uint256,uint256)")
pub const SEGMENT_TOPIC: &str =
    "0x97dc938bf0bc05d005f6533138aa7c8c81866e771ca76124c37bd83246420dfb";

/// Topic des mises à jour : keccak256("NewPrice(uint256)")
pub const NEW_PRICE_TOPIC: &str =
    "0x270b316b51ab2cf3a3bb8ca4d22e76a327d05e762fcaa8bd6afaf8cfde9270b7";

/// Filtre d'une requête de logs
///
/// Les bornes sont inclusives des deux côtés, comme pour eth_getLogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Adresse du contrat émetteur
    pub address: String,
    /// Premier bloc (inclus)
    pub from_block: u64,
    /// Dernier bloc (inclus)
    pub to_block: u64,
    /// Topic 0 attendu (signature de l'événement)
    pub topic: String,
}

/// Une entrée de log, déjà décodée depuis le JSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub block_number: u64,
    pub log_index: u64,
    pub topics: Vec<String>,
    pub data: Vec<u8>,
}

/// En-tête de bloc minimal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    /// Timestamp Unix en secondes
    pub timestamp: i64,
}

/// Source de logs append-only indexée par bloc
///
/// CONCEPT RUST : async-trait
/// - Les traits ne supportent pas directement les `async fn` avec dyn
/// - La macro transforme chaque méthode en `Pin<Box<dyn Future>>`
/// - Send + Sync : la source est utilisée depuis le runtime du worker
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Logs correspondant au filtre, dans l'ordre du journal
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, ChainError>;

    /// Numéro du dernier bloc
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// En-tête d'un bloc
    async fn block(&self, number: u64) -> Result<BlockInfo, ChainError>;
}
