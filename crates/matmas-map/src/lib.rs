#![deny(unsafe_code)]

//! Mapping tables: key->value lookups sourced from external worksheets,
//! cached per converter instance.
//!
//! Lookups match on the trimmed, upper-cased source value. Any failure to
//! read a mapping sheet degrades to an **empty table** rather than an error;
//! the degradation is cached (so a broken workbook is not re-read per rule)
//! and surfaced as a `tracing::warn!` diagnostic.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use calamine::{Data, Reader, open_workbook_auto};
use tracing::warn;

use matmas_model::LookupSpec;

/// Normalized key -> trimmed value, from one worksheet.
pub type MappingTable = HashMap<String, String>;

/// Read-through cache of mapping tables, keyed by the full lookup spec.
///
/// Cache entries are immutable once computed; population is guarded by a
/// mutex around the check-then-insert sequence, so an instance can be shared
/// by a parallel batch even though the sequential driver never needs it.
#[derive(Debug)]
pub struct MappingService {
    base_folder: PathBuf,
    cache: Mutex<HashMap<LookupSpec, Arc<MappingTable>>>,
}

impl MappingService {
    pub fn new(base_folder: impl Into<PathBuf>) -> Self {
        Self {
            base_folder: base_folder.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a mapping table, loading and caching it on first use.
    ///
    /// Never fails: unreadable workbooks, missing sheets and missing key or
    /// value columns all yield an (also cached) empty table.
    pub fn resolve(&self, spec: &LookupSpec) -> Arc<MappingTable> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| {
            // A panic while holding the lock cannot leave a half-written
            // entry: tables are inserted fully built.
            poisoned.into_inner()
        });
        if let Some(table) = cache.get(spec) {
            return Arc::clone(table);
        }
        let table = Arc::new(self.load(spec));
        cache.insert(spec.clone(), Arc::clone(&table));
        table
    }

    fn load(&self, spec: &LookupSpec) -> MappingTable {
        let path = self.base_folder.join(&spec.file);
        let mut workbook = match open_workbook_auto(&path) {
            Ok(workbook) => workbook,
            Err(error) => {
                warn!(
                    file = %path.display(),
                    %error,
                    "mapping workbook unreadable, using empty table"
                );
                return MappingTable::new();
            }
        };

        let range = match &spec.sheet {
            Some(name) => workbook.worksheet_range(name),
            // No sheet configured: first sheet of the workbook.
            None => match workbook.sheet_names().first().cloned() {
                Some(first) => workbook.worksheet_range(&first),
                None => {
                    warn!(file = %path.display(), "mapping workbook has no sheets");
                    return MappingTable::new();
                }
            },
        };
        let range = match range {
            Ok(range) => range,
            Err(error) => {
                warn!(
                    file = %path.display(),
                    sheet = spec.sheet.as_deref().unwrap_or("<first>"),
                    %error,
                    "mapping sheet unreadable, using empty table"
                );
                return MappingTable::new();
            }
        };

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return MappingTable::new();
        };
        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell_text(cell).trim().to_string())
            .collect();
        let key_idx = headers.iter().position(|h| *h == spec.key_column);
        let value_idx = headers.iter().position(|h| *h == spec.value_column);
        let (Some(key_idx), Some(value_idx)) = (key_idx, value_idx) else {
            warn!(
                file = %path.display(),
                key = %spec.key_column,
                value = %spec.value_column,
                "mapping sheet lacks the configured columns, using empty table"
            );
            return MappingTable::new();
        };

        let mut table = MappingTable::new();
        for row in rows {
            let key = row
                .get(key_idx)
                .map(|cell| cell_text(cell).trim().to_uppercase())
                .unwrap_or_default();
            if key.is_empty() {
                continue;
            }
            let value = row
                .get(value_idx)
                .map(|cell| cell_text(cell).trim().to_string())
                .unwrap_or_default();
            // Duplicate keys: later rows win, matching sheet order.
            table.insert(key, value);
        }
        table
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(v) => {
            let s = format!("{v}");
            if s.contains('.') {
                s.trim_end_matches('0').trim_end_matches('.').to_string()
            } else {
                s
            }
        }
        Data::Int(v) => v.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn write_uom_workbook(path: &std::path::Path) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("UOM").unwrap();
        sheet.write_string(0, 0, "Legacy").unwrap();
        sheet.write_string(0, 1, "SAP").unwrap();
        sheet.write_string(1, 0, " kg ").unwrap();
        sheet.write_string(1, 1, " KGM ").unwrap();
        sheet.write_string(2, 0, "doos").unwrap();
        sheet.write_string(2, 1, "KAR").unwrap();
        // Duplicate key: the later row must win.
        sheet.write_string(3, 0, "DOOS").unwrap();
        sheet.write_string(3, 1, "CT").unwrap();
        // Empty key rows are dropped.
        sheet.write_string(4, 0, "  ").unwrap();
        sheet.write_string(4, 1, "IGNORED").unwrap();
        workbook.save(path).unwrap();
    }

    fn uom_spec() -> LookupSpec {
        LookupSpec {
            file: "uom.xlsx".to_string(),
            sheet: Some("UOM".to_string()),
            key_column: "Legacy".to_string(),
            value_column: "SAP".to_string(),
        }
    }

    #[test]
    fn loads_normalized_table() {
        let dir = tempfile::tempdir().unwrap();
        write_uom_workbook(&dir.path().join("uom.xlsx"));
        let service = MappingService::new(dir.path());

        let table = service.resolve(&uom_spec());
        assert_eq!(table.get("KG").map(String::as_str), Some("KGM"));
        assert_eq!(table.get("DOOS").map(String::as_str), Some("CT"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn resolve_is_idempotent_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uom.xlsx");
        write_uom_workbook(&path);
        let service = MappingService::new(dir.path());

        let first = service.resolve(&uom_spec());
        // Remove the workbook: a second resolve must come from the cache.
        std::fs::remove_file(&path).unwrap();
        let second = service.resolve(&uom_spec());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_workbook_yields_cached_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let service = MappingService::new(dir.path());

        let table = service.resolve(&uom_spec());
        assert!(table.is_empty());

        // The failure is cached too: writing the workbook afterwards does
        // not change the entry for this converter instance.
        write_uom_workbook(&dir.path().join("uom.xlsx"));
        let again = service.resolve(&uom_spec());
        assert!(again.is_empty());
    }

    #[test]
    fn missing_columns_yield_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        write_uom_workbook(&dir.path().join("uom.xlsx"));
        let service = MappingService::new(dir.path());

        let spec = LookupSpec {
            key_column: "DoesNotExist".to_string(),
            ..uom_spec()
        };
        assert!(service.resolve(&spec).is_empty());
    }

    #[test]
    fn first_sheet_is_used_when_none_configured() {
        let dir = tempfile::tempdir().unwrap();
        write_uom_workbook(&dir.path().join("uom.xlsx"));
        let service = MappingService::new(dir.path());

        let spec = LookupSpec {
            sheet: None,
            ..uom_spec()
        };
        let table = service.resolve(&spec);
        assert_eq!(table.get("KG").map(String::as_str), Some("KGM"));
    }
}
