// ============================================================================
// SegmentLocator : reconstruction du segment courant
// ============================================================================
// Le journal d'événements du contrat est append-only et indexé par bloc.
// Les noeuds limitent la taille des plages eth_getLogs : on scanne donc par
// fenêtres de taille fixe.
//
// ALGORITHME :
// 1. Remonter depuis le dernier bloc, fenêtre par fenêtre, jusqu'au marqueur
//    "Segment" le plus récent (budget de fenêtres vides borné)
// 2. Redescendre du marqueur au dernier bloc en collectant les "NewPrice"
// 3. Agréger ouverture + prix en OHLC
//
// CONCEPT RUST : Boucles explicites plutôt que récursion
// - Accumulateur + compteur de tentatives
// - Pas de profondeur de pile qui dépend de la plage scannée
// ============================================================================

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::api::abi::{self, SEGMENT_CLOSE_WORD, SEGMENT_TARGET_WORD};
use crate::api::{LogFilter, LogSource, NEW_PRICE_TOPIC, SEGMENT_TOPIC};
use crate::config::ChainConfig;
use crate::error::ChainError;
use crate::models::{PriceSnapshot, Segment};

/// Résultat complet d'un cycle de polling
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentReport {
    pub segment: Segment,

    /// Dernier bloc au moment du cycle
    pub latest_block: u64,

    /// Timestamp du bloc marqueur
    pub started_at: DateTime<Utc>,

    pub snapshot: PriceSnapshot,
}

/// Localise le segment courant dans le journal d'une source de logs
///
/// CONCEPT RUST : Emprunt de la source
/// - Le locator ne possède pas la source (`&'a S`)
/// - Il est reconstruit à chaque cycle, la source vit plus longtemps
pub struct SegmentLocator<'a, S: LogSource + ?Sized> {
    source: &'a S,
    contract: String,
    window: u64,
    max_retries: u32,
    decimals: u32,
}

impl<'a, S: LogSource + ?Sized> SegmentLocator<'a, S> {
    pub fn new(source: &'a S, config: &ChainConfig) -> Self {
        Self {
            source,
            contract: config.contract.clone(),
            window: config.block_window,
            max_retries: config.max_retries,
            decimals: config.price_decimals,
        }
    }

    fn filter(&self, from_block: u64, to_block: u64, topic: &str) -> LogFilter {
        LogFilter {
            address: self.contract.clone(),
            from_block,
            to_block,
            topic: topic.to_string(),
        }
    }

    /// Cherche le marqueur "Segment" le plus récent en remontant
    ///
    /// Fenêtres [to - window, to], puis to = from. Échoue avec
    /// `SegmentNotFound` quand le compteur de fenêtres vides dépasse
    /// `max_retries`, ou quand le bloc 0 a été scanné.
    #[instrument(skip(self))]
    pub async fn find_segment_start(
        &self,
        latest_block: u64,
        max_retries: u32,
    ) -> Result<Segment, ChainError> {
        let mut to_block = latest_block;
        let mut retries = 0u32;

        loop {
            if retries > max_retries {
                warn!(to_block, retries, "Segment marker not found");
                return Err(ChainError::SegmentNotFound { to_block, retries });
            }

            let from_block = to_block.saturating_sub(self.window);
            let logs = self
                .source
                .get_logs(&self.filter(from_block, to_block, SEGMENT_TOPIC))
                .await?;

            // Le dernier marqueur de la fenêtre fait foi
            if let Some(marker) = logs.last() {
                let close_price =
                    abi::format_units(abi::word(&marker.data, SEGMENT_CLOSE_WORD)?, self.decimals);
                let target_price =
                    abi::format_units(abi::word(&marker.data, SEGMENT_TARGET_WORD)?, self.decimals);

                debug!(
                    block = marker.block_number,
                    markers_in_window = logs.len(),
                    target_price,
                    close_price,
                    "Segment marker found"
                );

                return Ok(Segment::new(marker.block_number, target_price, close_price));
            }

            if from_block == 0 {
                warn!(retries, "Reached genesis without a segment marker");
                return Err(ChainError::SegmentNotFound {
                    to_block: from_block,
                    retries,
                });
            }

            debug!(from_block, to_block, retries, "No marker in window, stepping back");
            to_block = from_block;
            retries += 1;
        }
    }

    /// Collecte les prix "NewPrice" de `from_block` à `to_block_limit` inclus
    ///
    /// Fenêtres [from, min(from + window, limit)] sans chevauchement.
    /// Pas de retry : la première requête en échec interrompt le scan.
    #[instrument(skip(self))]
    pub async fn load_price_updates(
        &self,
        from_block: u64,
        to_block_limit: u64,
    ) -> Result<Vec<f64>, ChainError> {
        let mut prices = Vec::new();
        let mut from = from_block;

        while from <= to_block_limit {
            let to = from.saturating_add(self.window).min(to_block_limit);
            let logs = self
                .source
                .get_logs(&self.filter(from, to, NEW_PRICE_TOPIC))
                .await?;

            for log in &logs {
                prices.push(abi::format_units(abi::word(&log.data, 0)?, self.decimals));
            }

            debug!(from, to, updates = logs.len(), "Scanned price window");

            match to.checked_add(1) {
                Some(next) => from = next,
                None => break,
            }
        }

        Ok(prices)
    }

    /// Cycle complet : dernier bloc, marqueur, timestamp, prix, agrégation
    #[instrument(skip(self), fields(contract = %self.contract))]
    pub async fn locate(&self) -> Result<SegmentReport, ChainError> {
        let latest_block = self.source.block_number().await?;
        let segment = self.find_segment_start(latest_block, self.max_retries).await?;

        let block = self.source.block(segment.start_block).await?;
        let started_at = DateTime::from_timestamp(block.timestamp, 0).ok_or_else(|| {
            ChainError::Decode(format!("invalid block timestamp {}", block.timestamp))
        })?;

        let prices = self
            .load_price_updates(segment.start_block + 1, latest_block)
            .await?;
        let snapshot = PriceSnapshot::aggregate(&segment, &prices);

        info!(
            start_block = segment.start_block,
            latest_block,
            updates = prices.len(),
            close = snapshot.close,
            target = snapshot.target,
            "Segment located"
        );

        Ok(SegmentReport {
            segment,
            latest_block,
            started_at,
            snapshot,
        })
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::abi::{SEGMENT_WORDS, WORD_SIZE};
    use crate::api::{BlockInfo, LogEntry};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const DECIMALS: u32 = 9;

    /// Source de logs synthétique : journal en mémoire + trace des requêtes
    struct MockSource {
        logs: Vec<LogEntry>,
        latest: u64,
        fail_after: Option<usize>,
        queries: Mutex<Vec<LogFilter>>,
    }

    impl MockSource {
        fn new(latest: u64, logs: Vec<LogEntry>) -> Self {
            Self {
                logs,
                latest,
                fail_after: None,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn query_count(&self) -> usize {
            self.queries.lock().unwrap().len()
        }

        fn queries(&self) -> Vec<LogFilter> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LogSource for MockSource {
        async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, ChainError> {
            let mut queries = self.queries.lock().unwrap();
            if let Some(limit) = self.fail_after {
                if queries.len() >= limit {
                    return Err(ChainError::LogQuery("query returned more than 10000 results".into()));
                }
            }
            queries.push(filter.clone());

            Ok(self
                .logs
                .iter()
                .filter(|log| {
                    log.block_number >= filter.from_block
                        && log.block_number <= filter.to_block
                        && log.topics.first() == Some(&filter.topic)
                })
                .cloned()
                .collect())
        }

        async fn block_number(&self) -> Result<u64, ChainError> {
            Ok(self.latest)
        }

        async fn block(&self, number: u64) -> Result<BlockInfo, ChainError> {
            Ok(BlockInfo {
                number,
                timestamp: 1_700_000_000 + number as i64 * 2,
            })
        }
    }

    fn encode_price(value: f64) -> Vec<u8> {
        let raw = (value * 10f64.powi(DECIMALS as i32)).round() as u128;
        let mut word = vec![0u8; 16];
        word.extend_from_slice(&raw.to_be_bytes());
        word
    }

    fn marker(block: u64, target: f64, close: f64) -> LogEntry {
        let mut data = vec![0xeeu8; WORD_SIZE * SEGMENT_WORDS];
        data[SEGMENT_CLOSE_WORD * WORD_SIZE..(SEGMENT_CLOSE_WORD + 1) * WORD_SIZE]
            .copy_from_slice(&encode_price(close));
        data[SEGMENT_TARGET_WORD * WORD_SIZE..(SEGMENT_TARGET_WORD + 1) * WORD_SIZE]
            .copy_from_slice(&encode_price(target));
        LogEntry {
            block_number: block,
            log_index: 0,
            topics: vec![SEGMENT_TOPIC.to_string()],
            data,
        }
    }

    fn price(block: u64, value: f64) -> LogEntry {
        LogEntry {
            block_number: block,
            log_index: 0,
            topics: vec![NEW_PRICE_TOPIC.to_string()],
            data: encode_price(value),
        }
    }

    fn config() -> ChainConfig {
        ChainConfig {
            price_decimals: DECIMALS,
            ..ChainConfig::default()
        }
    }

    #[tokio::test]
    async fn test_find_marker_in_first_window() {
        let source = MockSource::new(5000, vec![marker(100, 10.0, 9.5)]);
        let config = config();
        let locator = SegmentLocator::new(&source, &config);

        let segment = locator.find_segment_start(5000, 10).await.unwrap();

        assert_eq!(segment, Segment::new(100, 10.0, 9.5));
        assert_eq!(source.query_count(), 1);
    }

    #[tokio::test]
    async fn test_find_marker_steps_back_once_per_window() {
        let source = MockSource::new(25_000, vec![marker(100, 10.0, 9.5)]);
        let config = config();
        let locator = SegmentLocator::new(&source, &config);

        let segment = locator.find_segment_start(25_000, 10).await.unwrap();
        assert_eq!(segment.start_block, 100);

        // [15000, 25000] -> [5000, 15000] -> [0, 5000]
        let queries = source.queries();
        let ranges: Vec<(u64, u64)> = queries.iter().map(|q| (q.from_block, q.to_block)).collect();
        assert_eq!(ranges, vec![(15_000, 25_000), (5_000, 15_000), (0, 5_000)]);
        assert!(queries.iter().all(|q| q.topic == SEGMENT_TOPIC));
    }

    #[tokio::test]
    async fn test_most_recent_marker_wins() {
        let source = MockSource::new(
            20_000,
            vec![marker(12_000, 10.0, 9.5), marker(18_000, 11.0, 10.5)],
        );
        let config = config();
        let locator = SegmentLocator::new(&source, &config);

        let segment = locator.find_segment_start(20_000, 10).await.unwrap();
        assert_eq!(segment, Segment::new(18_000, 11.0, 10.5));
    }

    #[tokio::test]
    async fn test_segment_not_found_after_retry_budget() {
        let source = MockSource::new(150_000, vec![price(149_000, 1.0)]);
        let config = config();
        let locator = SegmentLocator::new(&source, &config);

        let err = locator.find_segment_start(150_000, 10).await.unwrap_err();

        assert!(matches!(err, ChainError::SegmentNotFound { retries: 11, .. }));
        // 11 fenêtres : tentatives 0 à 10
        assert_eq!(source.query_count(), 11);
    }

    #[tokio::test]
    async fn test_segment_not_found_at_genesis() {
        let source = MockSource::new(15_000, vec![]);
        let config = config();
        let locator = SegmentLocator::new(&source, &config);

        let err = locator.find_segment_start(15_000, 10).await.unwrap_err();
        assert!(matches!(err, ChainError::SegmentNotFound { .. }));
        assert_eq!(source.query_count(), 2);
    }

    #[tokio::test]
    async fn test_truncated_marker_payload() {
        let mut bad = marker(100, 10.0, 9.5);
        bad.data.truncate(WORD_SIZE * 5);
        let source = MockSource::new(5000, vec![bad]);
        let config = config();
        let locator = SegmentLocator::new(&source, &config);

        let err = locator.find_segment_start(5000, 10).await.unwrap_err();
        assert!(matches!(err, ChainError::Decode(_)));
    }

    #[tokio::test]
    async fn test_load_price_updates_inclusive_limit() {
        let source = MockSource::new(
            30_000,
            vec![price(100, 1.0), price(15_000, 2.0), price(26_000, 3.0)],
        );
        let config = config();
        let locator = SegmentLocator::new(&source, &config);

        let prices = locator.load_price_updates(100, 25_000).await.unwrap();
        assert_eq!(prices, vec![1.0, 2.0]);

        // Aucune fenêtre ne dépasse la limite, aucune ne se chevauche
        let queries = source.queries();
        let ranges: Vec<(u64, u64)> = queries.iter().map(|q| (q.from_block, q.to_block)).collect();
        assert_eq!(
            ranges,
            vec![(100, 10_100), (10_101, 20_101), (20_102, 25_000)]
        );
    }

    #[tokio::test]
    async fn test_load_price_updates_boundary_once() {
        let source = MockSource::new(30_000, vec![price(10_100, 4.0), price(25_000, 5.0)]);
        let config = config();
        let locator = SegmentLocator::new(&source, &config);

        let prices = locator.load_price_updates(100, 25_000).await.unwrap();
        assert_eq!(prices, vec![4.0, 5.0]);
    }

    #[tokio::test]
    async fn test_load_price_updates_empty_range() {
        let source = MockSource::new(30_000, vec![price(100, 1.0)]);
        let config = config();
        let locator = SegmentLocator::new(&source, &config);

        let prices = locator.load_price_updates(200, 100).await.unwrap();
        assert!(prices.is_empty());
        assert_eq!(source.query_count(), 0);
    }

    #[tokio::test]
    async fn test_query_failure_propagates() {
        let mut source = MockSource::new(
            30_000,
            vec![price(100, 1.0), price(15_000, 2.0)],
        );
        source.fail_after = Some(1);
        let config = config();
        let locator = SegmentLocator::new(&source, &config);

        let err = locator.load_price_updates(100, 25_000).await.unwrap_err();
        assert!(err.is_query_error());
        assert_eq!(source.query_count(), 1);
    }

    #[tokio::test]
    async fn test_backward_search_aborts_on_query_failure() {
        // Première fenêtre vide, la seconde requête échoue : pas de nouvel essai
        let mut source = MockSource::new(50_000, Vec::new());
        source.fail_after = Some(1);
        let config = config();
        let locator = SegmentLocator::new(&source, &config);

        let err = locator.find_segment_start(50_000, 10).await.unwrap_err();
        assert!(err.is_query_error());
        assert!(!matches!(err, ChainError::SegmentNotFound { .. }));
        assert_eq!(source.query_count(), 1);
    }

    #[tokio::test]
    async fn test_locate_full_cycle() {
        let source = MockSource::new(
            12_000,
            vec![
                marker(1_000, 10.0, 9.5),
                price(1_000, 42.0), // même bloc que le marqueur : ignoré
                price(1_500, 9.8),
                price(11_000, 10.3),
                price(11_500, 9.7),
            ],
        );
        let config = config();
        let locator = SegmentLocator::new(&source, &config);

        let report = locator.locate().await.unwrap();

        assert_eq!(report.latest_block, 12_000);
        assert_eq!(report.segment.start_block, 1_000);
        assert_eq!(report.started_at.timestamp(), 1_700_002_000);
        assert_eq!(report.snapshot, PriceSnapshot::new(9.5, 10.3, 9.5, 9.7, 10.0));
    }
}
