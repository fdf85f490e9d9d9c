use greenscan_common::config::DirectoryConfig;
use serde::Deserialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

const BUILTIN: &str = include_str!("../data/parent_companies.toml");

/// Result of mapping a brand to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyMatch {
    /// Parent company name, or the original brand when nothing matched.
    pub company: String,
    /// `None` when unmatched or when the owner is not publicly traded.
    pub ticker: Option<String>,
    /// Whether the brand was found in the directory at all.
    pub matched: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to read company directory {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse company directory: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    company: Vec<CompanyEntry>,
}

#[derive(Debug, Deserialize)]
struct CompanyEntry {
    name: String,
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    brands: Vec<String>,
}

#[derive(Debug, Clone)]
struct Listing {
    company: String,
    ticker: Option<String>,
}

/// Immutable brand-fragment to parent company table.
///
/// Built once at startup and handed to whatever needs it.
#[derive(Debug, Clone)]
pub struct ParentCompanyDirectory {
    exact: BTreeMap<String, Listing>,
    /// Same entries, longest fragment first, for substring matching.
    by_length: Vec<(String, Listing)>,
}

impl ParentCompanyDirectory {
    pub fn from_toml_str(content: &str) -> Result<Self, DirectoryError> {
        let file: DirectoryFile =
            toml::from_str(content).map_err(|e| DirectoryError::Parse(e.to_string()))?;

        let mut exact = BTreeMap::new();
        for entry in file.company {
            let ticker = entry
                .ticker
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
            for brand in &entry.brands {
                let fragment = normalize(brand);
                if fragment.is_empty() {
                    continue;
                }
                let listing = Listing {
                    company: entry.name.clone(),
                    ticker: ticker.clone(),
                };
                if let Some(prev) = exact.insert(fragment.clone(), listing) {
                    warn!(
                        fragment,
                        previous = prev.company,
                        company = entry.name,
                        "duplicate brand fragment, keeping the later entry"
                    );
                }
            }
        }

        let mut by_length: Vec<_> = exact.iter().map(|(f, l)| (f.clone(), l.clone())).collect();
        by_length.sort_by(|(a, _), (b, _)| {
            (Reverse(a.chars().count()), a).cmp(&(Reverse(b.chars().count()), b))
        });

        Ok(Self { exact, by_length })
    }

    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DirectoryError::ReadFile(path.display().to_string(), e))?;
        Self::from_toml_str(&content)
    }

    /// The table shipped with the binary.
    pub fn builtin() -> Result<Self, DirectoryError> {
        Self::from_toml_str(BUILTIN)
    }

    /// Load the file named in `[directory] path`, or the built-in table.
    pub fn from_config(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        let directory = match &config.path {
            Some(path) => Self::load(path)?,
            None => Self::builtin()?,
        };
        info!(
            fragments = directory.len(),
            source = config
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in".into()),
            "company directory loaded"
        );
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// Map a brand to its parent company.
    ///
    /// Tries the whole brand string, then each comma-separated item: exact
    /// fragment match first, then substring match in either direction.
    pub fn resolve(&self, brand: &str) -> CompanyMatch {
        let whole = std::iter::once(brand);
        let items = brand.split(',').filter(|_| brand.contains(','));
        for candidate in whole.chain(items) {
            if let Some((fragment, listing)) = self.find(candidate) {
                debug!(brand, fragment, company = listing.company, "brand matched");
                return CompanyMatch {
                    company: listing.company.clone(),
                    ticker: listing.ticker.clone(),
                    matched: true,
                };
            }
        }
        debug!(brand, "no parent company for brand");
        CompanyMatch {
            company: brand.trim().to_string(),
            ticker: None,
            matched: false,
        }
    }

    fn find(&self, brand: &str) -> Option<(&str, &Listing)> {
        let key = normalize(brand);
        if key.is_empty() {
            return None;
        }
        if let Some((fragment, listing)) = self.exact.get_key_value(&key) {
            return Some((fragment.as_str(), listing));
        }
        self.by_length
            .iter()
            .find(|(fragment, _)| key.contains(fragment.as_str()) || fragment.contains(key.as_str()))
            .map(|(fragment, listing)| (fragment.as_str(), listing))
    }
}

fn normalize(brand: &str) -> String {
    brand.trim().to_lowercase()
}
