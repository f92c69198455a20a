//! Fund universe: the set of codes a scan runs over.
//!
//! Loaded from a CSV export of a fund registry (or a previous scan's
//! output). Codes are normalized through [`InstrumentId::parse`]; blank
//! codes are skipped and duplicates collapse onto the first occurrence.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::domain::InstrumentId;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse universe CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("universe CSV has no '{0}' column")]
    MissingColumn(String),
}

/// Codes plus optional display names, ordered by code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Universe {
    funds: BTreeMap<InstrumentId, Option<String>>,
    skipped: usize,
}

impl Universe {
    /// Build from bare codes; unparseable codes are counted in `skipped()`.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut u = Self::default();
        for code in codes {
            u.insert(code.as_ref(), None);
        }
        u
    }

    /// Load from a CSV file with a header row.
    pub fn from_csv_path(
        path: &Path,
        code_column: &str,
        name_column: Option<&str>,
    ) -> Result<Self, UniverseError> {
        let file = std::fs::File::open(path).map_err(|source| UniverseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_csv_reader(file, code_column, name_column)
    }

    /// Load from any CSV source. A missing name column is tolerated.
    pub fn from_csv_reader<R: Read>(
        reader: R,
        code_column: &str,
        name_column: Option<&str>,
    ) -> Result<Self, UniverseError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers()?.clone();

        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let code_idx = find(code_column)
            .ok_or_else(|| UniverseError::MissingColumn(code_column.to_string()))?;
        let name_idx = name_column.and_then(find);

        let mut u = Self::default();
        for record in rdr.records() {
            let record = record?;
            let code = record.get(code_idx).unwrap_or("");
            let name = name_idx
                .and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from);
            u.insert(code, name);
        }
        Ok(u)
    }

    fn insert(&mut self, code: &str, name: Option<String>) {
        match InstrumentId::parse(code) {
            Ok(id) => {
                self.funds.entry(id).or_insert(name);
            }
            Err(_) => self.skipped += 1,
        }
    }

    pub fn ids(&self) -> BTreeSet<InstrumentId> {
        self.funds.keys().cloned().collect()
    }

    /// Registry display name, if the source carried one.
    pub fn name(&self, id: &InstrumentId) -> Option<&str> {
        self.funds.get(id).and_then(|n| n.as_deref())
    }

    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.funds.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.funds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funds.is_empty()
    }

    /// Rows dropped because their code was blank or malformed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_registry_columns() {
        let csv = "Fon Adı,Fon Kodu\nAk Portföy Para Piyasası,aak\nTürkiye Teknoloji,TTE\n";
        let u = Universe::from_csv_reader(csv.as_bytes(), "Fon Kodu", Some("Fon Adı")).unwrap();
        assert_eq!(u.len(), 2);
        let aak = InstrumentId::parse("AAK").unwrap();
        assert_eq!(u.name(&aak), Some("Ak Portföy Para Piyasası"));
    }

    #[test]
    fn blank_codes_are_skipped_and_duplicates_collapse() {
        let csv = "code,name\nAAK,First\n  ,Blank\naak,Second\nTTE,\n";
        let u = Universe::from_csv_reader(csv.as_bytes(), "code", Some("name")).unwrap();
        assert_eq!(u.len(), 2);
        assert_eq!(u.skipped(), 1);
        let aak = InstrumentId::parse("AAK").unwrap();
        assert_eq!(u.name(&aak), Some("First"));
        let tte = InstrumentId::parse("TTE").unwrap();
        assert_eq!(u.name(&tte), None);
    }

    #[test]
    fn missing_code_column_is_an_error() {
        let csv = "symbol,name\nAAK,x\n";
        let err = Universe::from_csv_reader(csv.as_bytes(), "code", None).unwrap_err();
        assert!(matches!(err, UniverseError::MissingColumn(c) if c == "code"));
    }

    #[test]
    fn missing_name_column_is_tolerated() {
        let csv = "code,total\nAAK,3.1\n";
        let u = Universe::from_csv_reader(csv.as_bytes(), "code", Some("name")).unwrap();
        assert_eq!(u.len(), 1);
    }

    #[test]
    fn from_codes_normalizes() {
        let u = Universe::from_codes(["aak", "AAK", " tte ", ""]);
        let ids: Vec<String> = u.ids().into_iter().map(String::from).collect();
        assert_eq!(ids, vec!["AAK", "TTE"]);
        assert_eq!(u.skipped(), 1);
    }

    #[test]
    fn path_like_codes_are_skipped() {
        let csv = "code,name\n../secret,Escape\nsub/AAK,Nested\nTTE,Teknoloji\n";
        let u = Universe::from_csv_reader(csv.as_bytes(), "code", Some("name")).unwrap();
        let ids: Vec<String> = u.ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["TTE"]);
        assert_eq!(u.skipped(), 2);
    }
}
