use std::{collections::HashSet, fs, path::PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::Deserialize;

use super::{
    DomainListRepository, DomainLists, UrlPattern, DEFAULT_SHORTENERS, DEFAULT_SUSPICIOUS_TLDS,
    DEFAULT_TRUSTED_DOMAINS,
};

/// Loads domain lists from plain-text files and a JSON5 pattern file under a base directory.
///
/// Every file is optional; a missing file keeps the built-in list for that category.
pub struct FileListRepository {
    base_path: PathBuf,
    cache: OnceCell<DomainLists>,
}

impl FileListRepository {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            cache: OnceCell::new(),
        }
    }

    fn load_entries(&self, file_name: &str, defaults: &[&str]) -> Result<Vec<String>> {
        let path = self.base_path.join(file_name);
        if !path.exists() {
            return Ok(defaults.iter().map(|entry| entry.to_string()).collect());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read domain list at {}", path.display()))?;
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for line in content.lines() {
            let trimmed = line.split('#').next().unwrap_or_default().trim();
            if trimmed.is_empty() {
                continue;
            }
            let entry = trimmed.to_ascii_lowercase();
            if seen.insert(entry.clone()) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn load_patterns(&self) -> Result<Vec<UrlPattern>> {
        let path = self.base_path.join("patterns.json");
        if !path.exists() {
            return Ok(super::default_patterns());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read pattern file at {}", path.display()))?;
        let items: Vec<JsonPattern> = json5::from_str(&raw).with_context(|| {
            format!("invalid JSON structure in pattern file at {}", path.display())
        })?;
        let mut seen = HashSet::new();
        let mut patterns = Vec::with_capacity(items.len());
        for item in items {
            if !seen.insert(item.id.clone()) {
                return Err(anyhow::anyhow!("duplicate pattern id `{}`", item.id));
            }
            patterns.push(UrlPattern::new(item.id, item.description, item.pattern)?);
        }
        Ok(patterns)
    }
}

#[async_trait::async_trait]
impl DomainListRepository for FileListRepository {
    async fn load_lists(&self) -> Result<DomainLists> {
        let lists = self.cache.get_or_try_init(|| {
            Ok::<_, anyhow::Error>(DomainLists {
                shorteners: self.load_entries("shorteners.txt", DEFAULT_SHORTENERS)?,
                suspicious_tlds: self
                    .load_entries("suspicious_tlds.txt", DEFAULT_SUSPICIOUS_TLDS)?,
                trusted_domains: self
                    .load_entries("trusted_domains.txt", DEFAULT_TRUSTED_DOMAINS)?,
                patterns: self.load_patterns()?,
            })
        })?;
        Ok(lists.clone())
    }
}

#[derive(Deserialize)]
struct JsonPattern {
    id: String,
    #[serde(default)]
    description: String,
    pattern: String,
}
