//! TLE file loading. Accepts plain two-line sets, named three-line sets,
//! and the "0 "-prefixed 3LE variant, mixed freely in one file.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use satrig_core::SatElements;
use tracing::warn;

pub struct TleCatalog {
    entries: Vec<Arc<SatElements>>,
}

impl TleCatalog {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read TLE file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in TLE file {}", path.display()))
    }

    /// Entries that fail to parse are skipped with a warning; only a file
    /// yielding nothing at all is an error.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        let mut name: Option<String> = None;
        let mut line1: Option<String> = None;

        for raw in text.lines() {
            let line = raw.trim_end();
            if line.is_empty() {
                continue;
            }
            if line.starts_with("1 ") {
                if line1.is_some() {
                    warn!("discarding TLE line 1 with no matching line 2");
                    skipped += 1;
                }
                line1 = Some(line.to_string());
            } else if line.starts_with("2 ") {
                match line1.take() {
                    Some(l1) => match parse_pair(name.take(), &l1, line) {
                        Ok(sat) => entries.push(Arc::new(sat)),
                        Err(reason) => {
                            warn!("skipping unusable TLE entry: {reason}");
                            skipped += 1;
                        }
                    },
                    None => {
                        warn!("discarding TLE line 2 with no matching line 1");
                        skipped += 1;
                    }
                }
            } else {
                // name line; amateur distributions sometimes carry the 3LE "0 " prefix
                let n = line.strip_prefix("0 ").unwrap_or(line).trim();
                name = Some(n.to_string());
                line1 = None;
            }
        }

        if entries.is_empty() {
            anyhow::bail!("no usable TLE entries ({skipped} skipped)");
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Arc<SatElements>] {
        &self.entries
    }

    /// Look a satellite up by NORAD number or by name. Name matching is
    /// case-insensitive and falls back to a substring match, so "so-50"
    /// finds "SO-50 (SAUDISAT 1C)".
    pub fn find(&self, query: &str) -> Option<Arc<SatElements>> {
        let query = query.trim();
        if let Ok(id) = query.parse::<u64>() {
            if let Some(sat) = self.entries.iter().find(|s| s.norad_id() == id) {
                return Some(Arc::clone(sat));
            }
        }
        if let Some(sat) = self
            .entries
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(query))
        {
            return Some(Arc::clone(sat));
        }
        let upper = query.to_ascii_uppercase();
        self.entries
            .iter()
            .find(|s| s.name().to_ascii_uppercase().contains(&upper))
            .map(Arc::clone)
    }
}

fn parse_pair(name: Option<String>, line1: &str, line2: &str) -> Result<SatElements, String> {
    let elements = sgp4::Elements::from_tle(name, line1.as_bytes(), line2.as_bytes())
        .map_err(|e| e.to_string())?;
    SatElements::new(elements).map_err(|e| e.to_string())
}
