//! Instrument resolution
//!
//! Maps a headline and summary to a tradable perpetual symbol. Explicit
//! aliases are tried first in priority order; only when none matches is the
//! analyst asked for a guess, which must then clear every guard.

mod text;


pub use text::TokenizedText;

use crate::client::{MarketData, NewsAnalyst};
use crate::error::Result;
use crate::types::{Provenance, Resolution};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Quote currency every resolvable symbol trades against
pub const QUOTE_SUFFIX: &str = "USDT";

/// Built-in table used until (or when) the exchange universe can't be loaded.
/// Order is priority: earlier entries win when a text names several assets.
const FALLBACK_ALIASES: &[(&str, &str)] = &[
    ("BTC", "BTCUSDT"),
    ("BITCOIN", "BTCUSDT"),
    ("ETH", "ETHUSDT"),
    ("ETHEREUM", "ETHUSDT"),
    ("SOL", "SOLUSDT"),
    ("BNB", "BNBUSDT"),
    ("ADA", "ADAUSDT"),
    ("DOGE", "DOGEUSDT"),
    ("XRP", "XRPUSDT"),
    ("AVAX", "AVAXUSDT"),
    ("DOT", "DOTUSDT"),
    ("MATIC", "MATICUSDT"),
    ("LTC", "LTCUSDT"),
    ("LINK", "LINKUSDT"),
    ("UNI", "UNIUSDT"),
    ("SHIB", "SHIBUSDT"),
    ("PEPE", "PEPEUSDT"),
    ("ARB", "ARBUSDT"),
    ("OP", "OPUSDT"),
    ("APT", "APTUSDT"),
    ("SUI", "SUIUSDT"),
    ("RNDR", "RNDRUSDT"),
    ("FET", "FETUSDT"),
    ("INJ", "INJUSDT"),
    ("NEAR", "NEARUSDT"),
    ("GRT", "GRTUSDT"),
    ("IMX", "IMXUSDT"),
    ("FIL", "FILUSDT"),
    ("STX", "STXUSDT"),
    ("TON", "TONUSDT"),
];

/// Common names for base tokens. Used both as exact aliases and when
/// checking that a symbol is really what the text talks about.
const TOKEN_NAMES: &[(&str, &[&str])] = &[
    ("BTC", &["BITCOIN"]),
    ("ETH", &["ETHEREUM"]),
    ("XRP", &["RIPPLE"]),
    ("DOGE", &["DOGECOIN"]),
    ("SHIB", &["SHIBA INU", "SHIBA"]),
    ("PEPE", &["PEPECOIN"]),
    ("ADA", &["CARDANO"]),
    ("SOL", &["SOLANA"]),
    ("BNB", &["BINANCE COIN", "BSC"]),
    ("DOT", &["POLKADOT"]),
    ("LTC", &["LITECOIN"]),
    ("AVAX", &["AVALANCHE"]),
    ("MATIC", &["POLYGON"]),
];

/// Priority given to aliases derived from the exchange listing, after
/// every curated entry.
const UNIVERSE_PRIORITY_BASE: u32 = 1_000;

/// Listed bases shorter than this (T, W, S, ...) never match on their own
const MIN_LISTED_BASE_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    /// Upper-case phrase, possibly several words
    pub phrase: String,
    pub symbol: String,
    /// Lower wins
    pub priority: u32,
}

/// Tradable symbols and the base token each one represents.
#[derive(Debug, Clone, Default)]
pub struct SymbolUniverse {
    bases: BTreeMap<String, String>,
}

impl SymbolUniverse {
    pub fn fallback() -> Self {
        Self::from_symbols(FALLBACK_ALIASES.iter().map(|(_, s)| s.to_string()))
    }

    /// Build from raw exchange symbols. Non-USDT pairs are ignored and a
    /// `1000` multiplier prefix is stripped from the base (1000PEPE -> PEPE).
    pub fn from_symbols(symbols: impl IntoIterator<Item = String>) -> Self {
        let mut bases = BTreeMap::new();
        for symbol in symbols {
            let symbol = symbol.to_uppercase();
            let Some(base) = symbol.strip_suffix(QUOTE_SUFFIX) else {
                continue;
            };
            let base = base.strip_prefix("1000").unwrap_or(base);
            if base.is_empty() {
                continue;
            }
            bases.insert(symbol.clone(), base.to_string());
        }
        Self { bases }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.bases.contains_key(symbol)
    }

    pub fn base_of(&self, symbol: &str) -> Option<&str> {
        self.bases.get(symbol).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Symbol for a base token, preferring the plain contract over the
    /// `1000`-multiplied one
    fn symbol_for_base(&self, base: &str) -> Option<&str> {
        let plain = format!("{}{}", base, QUOTE_SUFFIX);
        if self.bases.contains_key(&plain) {
            return self.bases.get_key_value(&plain).map(|(k, _)| k.as_str());
        }
        let scaled = format!("1000{}{}", base, QUOTE_SUFFIX);
        self.bases.get_key_value(&scaled).map(|(k, _)| k.as_str())
    }

    fn symbols(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bases.iter().map(|(s, b)| (s.as_str(), b.as_str()))
    }
}

pub struct InstrumentResolver {
    aliases: Vec<AliasEntry>,
    universe: SymbolUniverse,
    allow_list: HashSet<String>,
    names: HashMap<String, Vec<String>>,
    ambiguous: HashSet<String>,
    /// Phrases from the built-in tables; these match unqualified
    curated: HashSet<String>,
}

impl InstrumentResolver {
    pub fn new(
        universe: SymbolUniverse,
        allow_list: impl IntoIterator<Item = String>,
        ambiguous: impl IntoIterator<Item = String>,
    ) -> Self {
        let names: HashMap<String, Vec<String>> = TOKEN_NAMES
            .iter()
            .map(|&(base, names)| (base.to_string(), names.iter().map(|n| n.to_string()).collect()))
            .collect();

        let mut aliases = Vec::new();
        let mut taken: HashSet<String> = HashSet::new();
        let mut push = |phrase: &str, symbol: &str, priority: u32| {
            if taken.insert(phrase.to_string()) {
                aliases.push(AliasEntry {
                    phrase: phrase.to_string(),
                    symbol: symbol.to_string(),
                    priority,
                });
            }
        };

        let mut priority = 0;
        for &(phrase, symbol) in FALLBACK_ALIASES {
            let base = symbol.strip_suffix(QUOTE_SUFFIX).unwrap_or(symbol);
            if let Some(listed) = universe.symbol_for_base(base) {
                push(phrase, listed, priority);
                priority += 1;
            }
        }
        for &(base, base_names) in TOKEN_NAMES {
            if let Some(listed) = universe.symbol_for_base(base) {
                for name in base_names {
                    push(name, listed, priority);
                    priority += 1;
                }
            }
        }
        for (i, (symbol, base)) in universe.symbols().enumerate() {
            if base.len() >= MIN_LISTED_BASE_LEN {
                push(base, symbol, UNIVERSE_PRIORITY_BASE + i as u32);
            }
        }
        aliases.sort_by_key(|a| a.priority);

        let curated: HashSet<String> = FALLBACK_ALIASES
            .iter()
            .map(|(phrase, _)| phrase.to_string())
            .chain(TOKEN_NAMES.iter().map(|(base, _)| base.to_string()))
            .collect();

        Self {
            aliases,
            universe,
            allow_list: allow_list.into_iter().map(|s| s.to_uppercase()).collect(),
            names,
            ambiguous: ambiguous.into_iter().map(|s| s.to_uppercase()).collect(),
            curated,
        }
    }

    /// Resolver over the built-in table; every listed symbol counts as liquid.
    pub fn with_fallback(ambiguous: impl IntoIterator<Item = String>) -> Self {
        let universe = SymbolUniverse::fallback();
        let allow: Vec<String> = universe.symbols().map(|(s, _)| s.to_string()).collect();
        Self::new(universe, allow, ambiguous)
    }

    /// Load the live perpetual universe and volume ranking. Falls back to
    /// the built-in table if the exchange can't be reached.
    pub async fn load(
        market: &dyn MarketData,
        top_volume: usize,
        ambiguous: Vec<String>,
    ) -> Self {
        let symbols = match market.perpetual_symbols().await {
            Ok(s) if !s.is_empty() => s,
            Ok(_) => {
                tracing::warn!("Exchange returned no symbols, using built-in alias table");
                return Self::with_fallback(ambiguous);
            }
            Err(e) => {
                tracing::warn!("Symbol universe refresh failed ({}), using built-in alias table", e);
                return Self::with_fallback(ambiguous);
            }
        };

        let universe = SymbolUniverse::from_symbols(symbols);
        let allow = match market.top_volume_symbols(top_volume).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("Volume ranking unavailable ({}), allow-list limited to built-ins", e);
                SymbolUniverse::fallback()
                    .symbols()
                    .map(|(s, _)| s.to_string())
                    .collect()
            }
        };

        tracing::info!(
            "🔎 Symbol universe loaded: {} symbols, {} liquid",
            universe.len(),
            allow.len()
        );
        Self::new(universe, allow, ambiguous)
    }

    pub fn aliases(&self) -> &[AliasEntry] {
        &self.aliases
    }

    pub fn universe(&self) -> &SymbolUniverse {
        &self.universe
    }

    /// Highest-priority alias named in the headline
    pub fn exact_match(&self, title: &str) -> Option<&AliasEntry> {
        let text = TokenizedText::new(title);
        self.aliases.iter().find(|entry| self.mentions(&text, &entry.phrase))
    }

    /// Apply every guard to an analyst's guess
    pub fn validate_guess(&self, guess: &str, title: &str, body: &str) -> Option<String> {
        let guess = guess.trim().to_uppercase();
        if guess.is_empty() || guess == "NONE" {
            return None;
        }
        if !guess.ends_with(QUOTE_SUFFIX) {
            tracing::debug!("Guess {} rejected: wrong quote", guess);
            return None;
        }
        if !self.universe.contains(&guess) {
            tracing::warn!("⚠️ Analyst guessed unlisted symbol: {}", guess);
            return None;
        }
        if !self.allow_list.contains(&guess) {
            tracing::warn!("⚠️ Analyst guessed low-volume symbol (filtered): {}", guess);
            return None;
        }
        if !self.is_consistent(&guess, title, body) {
            tracing::warn!("⚠️ Guess {} not referenced by the text", guess);
            return None;
        }
        Some(guess)
    }

    /// The symbol's base token, or one of its common names, must appear in
    /// the text as a whole word. Ambiguous bases need a qualified mention.
    pub fn is_consistent(&self, symbol: &str, title: &str, body: &str) -> bool {
        let Some(base) = self.universe.base_of(symbol) else {
            return false;
        };
        let text = TokenizedText::new(&format!("{} {}", title, body));
        if self.mentions(&text, base) {
            return true;
        }
        self.names
            .get(base)
            .map(|names| names.iter().any(|n| text.contains_phrase(n)))
            .unwrap_or(false)
    }

    fn mentions(&self, text: &TokenizedText, phrase: &str) -> bool {
        if self.ambiguous.contains(phrase) && !self.curated.contains(phrase) {
            text.is_qualified(phrase)
        } else {
            text.contains_phrase(phrase) || text.is_qualified(phrase)
        }
    }

    /// Exact alias in the headline first, then a guarded analyst guess
    /// over headline and summary.
    pub async fn resolve(
        &self,
        title: &str,
        body: &str,
        analyst: &dyn NewsAnalyst,
    ) -> Result<Option<Resolution>> {
        if let Some(entry) = self.exact_match(title) {
            return Ok(Some(Resolution {
                symbol: entry.symbol.clone(),
                provenance: Provenance::ExactMatch,
            }));
        }

        let guess = analyst.guess_instrument(title, body).await?;
        Ok(guess
            .and_then(|g| self.validate_guess(&g, title, body))
            .map(|symbol| Resolution {
                symbol,
                provenance: Provenance::Inferred,
            }))
    }
}

/// Shared resolver that can be swapped after a universe refresh.
pub struct ResolverHandle {
    current: RwLock<Arc<InstrumentResolver>>,
}

impl ResolverHandle {
    pub fn new(resolver: InstrumentResolver) -> Self {
        Self {
            current: RwLock::new(Arc::new(resolver)),
        }
    }

    pub fn current(&self) -> Arc<InstrumentResolver> {
        self.current.read().clone()
    }

    pub fn replace(&self, resolver: InstrumentResolver) {
        *self.current.write() = Arc::new(resolver);
    }
}
