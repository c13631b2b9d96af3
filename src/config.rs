// ============================================================================
// Configuration
// ============================================================================
// Lue depuis les variables d'environnement (et un fichier .env optionnel)
//
// CONCEPT RUST : Injection de la source de variables
// - from_vars() prend une closure `Fn(&str) -> Option<String>`
// - En production : std::env::var ; en test : une HashMap
// - Aucune variable globale à manipuler dans les tests
// ============================================================================

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::api::abi;
use crate::models::{band_color, Band};
use crate::ui::candle::RenderConfig;

/// Endpoint JSON-RPC par défaut (Base mainnet)
pub const DEFAULT_RPC_URL: &str = "https://base-rpc.publicnode.com";

/// Contrat émetteur des événements Segment / NewPrice
pub const DEFAULT_CONTRACT: &str = "0xDa915F510Daf9Bf404915E651EeDcE46Dcb8Fe7e";

/// Token ERC-20 converti par la vue Wrap
pub const DEFAULT_TOKEN: &str = "0x0356Ee6D5c0a53f43D1AC2022B3d5bA7acf7e697";

/// Version wrappée du token (aussi le spender de l'allowance)
pub const DEFAULT_WRAPPED_TOKEN: &str = "0x8aca2445f2af7ae603651883c4fe89322bfc95bb";

/// Paramètres de lecture de la chaîne
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    /// URL HTTP du noeud JSON-RPC
    pub rpc_url: String,

    /// Adresse du contrat
    pub contract: String,

    /// Décimales des prix dans les logs (propre au contrat déployé)
    pub price_decimals: u32,

    /// Taille d'une fenêtre de scan en blocs
    pub block_window: u64,

    /// Fenêtres vides tolérées en remontant avant d'abandonner
    pub max_retries: u32,

    pub token: String,

    pub wrapped_token: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            contract: DEFAULT_CONTRACT.to_string(),
            price_decimals: 9,
            block_window: 10_000,
            max_retries: 10,
            token: DEFAULT_TOKEN.to_string(),
            wrapped_token: DEFAULT_WRAPPED_TOKEN.to_string(),
        }
    }
}

/// Configuration complète de l'application
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub chain: ChainConfig,
    pub render: RenderConfig,

    /// Intervalle entre deux cycles de polling
    pub poll_interval: Duration,

    /// Bandes de seuil ; None = ticks fixes
    pub bands: Option<Vec<Band>>,

    /// Répertoire des fichiers de logs
    pub log_dir: PathBuf,
}

impl Config {
    /// Charge la configuration depuis l'environnement du process
    pub fn from_env() -> Result<Self> {
        // .env est optionnel : l'absence du fichier n'est pas une erreur
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Construit la configuration à partir d'une fonction de lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ChainConfig::default();
        let render_defaults = RenderConfig::default();

        let chain = ChainConfig {
            rpc_url: lookup("CANDLEWATCH_RPC_URL").unwrap_or(defaults.rpc_url),
            contract: lookup("CANDLEWATCH_CONTRACT").unwrap_or(defaults.contract),
            price_decimals: parse_var(&lookup, "CANDLEWATCH_PRICE_DECIMALS", defaults.price_decimals)?,
            block_window: parse_var(&lookup, "CANDLEWATCH_BLOCK_WINDOW", defaults.block_window)?,
            max_retries: parse_var(&lookup, "CANDLEWATCH_MAX_RETRIES", defaults.max_retries)?,
            token: lookup("CANDLEWATCH_TOKEN").unwrap_or(defaults.token),
            wrapped_token: lookup("CANDLEWATCH_WRAPPED_TOKEN").unwrap_or(defaults.wrapped_token),
        };

        if chain.block_window == 0 {
            anyhow::bail!("CANDLEWATCH_BLOCK_WINDOW doit être strictement positif");
        }

        // Le token wrappé sert aussi de spender : il doit être une adresse
        abi::parse_address(&chain.wrapped_token)
            .context("CANDLEWATCH_WRAPPED_TOKEN n'est pas une adresse valide")?;

        let render = RenderConfig {
            digits: parse_var(&lookup, "CANDLEWATCH_DIGITS", render_defaults.digits)?,
            currency_prefix: parse_var(
                &lookup,
                "CANDLEWATCH_CURRENCY_PREFIX",
                render_defaults.currency_prefix,
            )?,
            padding_fraction: parse_var(
                &lookup,
                "CANDLEWATCH_PADDING",
                render_defaults.padding_fraction,
            )?,
            ..render_defaults
        };

        let poll_secs: u64 = parse_var(&lookup, "CANDLEWATCH_POLL_SECS", 15)?;

        let bands = match lookup("CANDLEWATCH_BANDS") {
            Some(raw) if !raw.trim().is_empty() => Some(parse_bands(&raw)?),
            _ => None,
        };

        let log_dir = lookup("CANDLEWATCH_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_log_dir);

        Ok(Self {
            chain,
            render,
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            bands,
            log_dir,
        })
    }
}

/// Répertoire de logs par défaut
///
/// - Linux : ~/.local/share/candlewatch/logs
/// - macOS : ~/Library/Application Support/candlewatch/logs
/// - Sinon : ./logs
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("candlewatch").join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

/// Lit une variable typée, avec valeur par défaut si absente
fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Valeur invalide pour {} : {:?}", key, raw)),
        None => Ok(default),
    }
}

/// Parse "0.005,0.015,0.03" en bandes ordonnées
fn parse_bands(raw: &str) -> Result<Vec<Band>> {
    let mut bands = Vec::new();
    let mut previous = 0.0;

    for (i, part) in raw.split(',').enumerate() {
        let distance: f64 = part
            .trim()
            .parse()
            .with_context(|| format!("Distance de bande invalide : {:?}", part))?;

        if distance <= previous {
            anyhow::bail!(
                "Les bandes doivent être strictement croissantes et positives ({} après {})",
                distance,
                previous
            );
        }

        bands.push(Band::new(distance, band_color(i)));
        previous = distance;
    }

    Ok(bands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.chain, ChainConfig::default());
        assert_eq!(config.chain.block_window, 10_000);
        assert_eq!(config.chain.max_retries, 10);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.render, RenderConfig::default());
        assert!(config.bands.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CANDLEWATCH_PRICE_DECIMALS", "18"),
            ("CANDLEWATCH_POLL_SECS", "30"),
            ("CANDLEWATCH_CURRENCY_PREFIX", "true"),
            ("CANDLEWATCH_PADDING", "0.02"),
            ("CANDLEWATCH_BANDS", "0.005, 0.015, 0.03"),
            ("CANDLEWATCH_LOG_DIR", "/tmp/cw"),
        ])
        .unwrap();

        assert_eq!(config.chain.price_decimals, 18);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert!(config.render.currency_prefix);
        assert_eq!(config.render.padding_fraction, 0.02);
        assert_eq!(config.log_dir, PathBuf::from("/tmp/cw"));

        let bands = config.bands.unwrap();
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[1].distance, 0.015);
        assert_eq!(bands[1].color_key, "primary");
    }

    #[test]
    fn test_invalid_values() {
        let err = config_from(&[("CANDLEWATCH_MAX_RETRIES", "many")]).unwrap_err();
        assert!(err.to_string().contains("CANDLEWATCH_MAX_RETRIES"));

        assert!(config_from(&[("CANDLEWATCH_BLOCK_WINDOW", "0")]).is_err());
        assert!(config_from(&[("CANDLEWATCH_BANDS", "0.03,0.01")]).is_err());
        assert!(config_from(&[("CANDLEWATCH_BANDS", "abc")]).is_err());
        assert!(config_from(&[("CANDLEWATCH_WRAPPED_TOKEN", "0x1234")]).is_err());
    }

    #[test]
    fn test_token_overrides() {
        let config = config_from(&[
            ("CANDLEWATCH_TOKEN", "0x1111111111111111111111111111111111111111"),
            ("CANDLEWATCH_WRAPPED_TOKEN", "0x2222222222222222222222222222222222222222"),
        ])
        .unwrap();

        assert_eq!(config.chain.token, "0x1111111111111111111111111111111111111111");
        assert_eq!(config.chain.wrapped_token, "0x2222222222222222222222222222222222222222");
        assert_eq!(config_from(&[]).unwrap().chain.wrapped_token, DEFAULT_WRAPPED_TOKEN);
    }
}
