//! Source record ingestion: workbook first, sibling CSVs as fallback,
//! then the left-outer join of Locations (driving) with Articles.

use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use polars::prelude::{DataFrame, IntoLazy, JoinArgs, JoinType, col};
use tracing::{debug, warn};

use matmas_model::columns::JOIN_COLUMN;

use crate::error::IngestError;
use crate::frame::frame_from_columns;
use crate::workbook::{normalize_header, read_sheet};

const ARTICLE_SHEETS: [&str; 2] = ["Artikels", "Articles"];
const LOCATION_SHEETS: [&str; 2] = ["Locatie", "Locations"];

/// Load and join the two source record sets behind `path`.
///
/// Tries the workbook's Articles/Locations sheets; on any failure falls back
/// to sibling `Artikels.csv`/`Locatie.csv` (or the English spellings) in the
/// same directory. When neither source is readable, returns an **empty
/// DataFrame** rather than an error: callers treat "no data" as a terminal,
/// non-exceptional outcome. A missing join column, by contrast, is a hard
/// error below the fallback chain.
pub fn ingest(path: &Path) -> Result<DataFrame, IngestError> {
    let (locations, articles) = match read_workbook_sets(path) {
        Ok(sets) => sets,
        Err(error) => {
            debug!(%error, "workbook read failed, trying sibling csv files");
            match read_csv_sets(path) {
                Ok(sets) => sets,
                Err(error) => {
                    warn!(%error, path = %path.display(), "no readable source data, yielding empty record set");
                    return Ok(DataFrame::empty());
                }
            }
        }
    };
    join_sources(locations, articles)
}

fn read_workbook_sets(path: &Path) -> Result<(DataFrame, DataFrame), IngestError> {
    let locations = read_sheet(path, &LOCATION_SHEETS)?;
    let articles = read_sheet(path, &ARTICLE_SHEETS)?;
    Ok((locations, articles))
}

fn read_csv_sets(path: &Path) -> Result<(DataFrame, DataFrame), IngestError> {
    let folder = path.parent().unwrap_or_else(|| Path::new("."));
    let locations = read_csv_frame(&sibling_csv(
        folder,
        &["Locatie.csv", "Locations.csv"],
        "Locations",
    )?)?;
    let articles = read_csv_frame(&sibling_csv(
        folder,
        &["Artikels.csv", "Articles.csv"],
        "Articles",
    )?)?;
    Ok((locations, articles))
}

fn sibling_csv(
    folder: &Path,
    candidates: &[&str],
    name: &'static str,
) -> Result<PathBuf, IngestError> {
    for candidate in candidates {
        let path = folder.join(candidate);
        if path.exists() {
            return Ok(path);
        }
    }
    Err(IngestError::CsvNotFound {
        path: folder.to_path_buf(),
        name,
    })
}

/// Read a flat delimited file into an all-string DataFrame, trimming
/// headers and cells and skipping fully empty lines.
pub fn read_csv_frame(path: &Path) -> Result<DataFrame, IngestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| IngestError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut headers: Vec<String> = Vec::new();
    let mut columns: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| IngestError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        if headers.is_empty() {
            headers = record.iter().map(normalize_header).collect();
            columns = vec![Vec::new(); headers.len()];
            continue;
        }
        for (idx, slot) in columns.iter_mut().enumerate() {
            let value = record.get(idx).unwrap_or("");
            slot.push(value.trim().to_string());
        }
    }
    if headers.is_empty() {
        return Ok(DataFrame::empty());
    }
    frame_from_columns(headers, columns).map_err(IngestError::from)
}

/// Left-outer join with Locations as the driving side.
///
/// Unmatched article references leave the article-derived columns null.
pub fn join_sources(locations: DataFrame, articles: DataFrame) -> Result<DataFrame, IngestError> {
    for (frame, side) in [(&locations, "Locations"), (&articles, "Articles")] {
        if frame.column(JOIN_COLUMN).is_err() {
            return Err(IngestError::JoinColumnMissing {
                column: JOIN_COLUMN.to_string(),
                side,
            });
        }
    }
    let joined = locations
        .lazy()
        .join(
            articles.lazy(),
            [col(JOIN_COLUMN)],
            [col(JOIN_COLUMN)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::column_value;
    use std::fs;

    #[test]
    fn falls_back_to_sibling_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Locatie.csv"),
            "ArtikelNr,Kast\nA1,K-01\nA2,K-02\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("Artikels.csv"),
            "ArtikelNr,Naam\nA1,Gauze\n",
        )
        .unwrap();

        // The workbook itself does not exist; the csv fallback must kick in.
        let df = ingest(&dir.path().join("Inventaris_ZH01.xlsx")).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(column_value(&df, "Naam", 0), "Gauze");
        // Unmatched article reference: article-derived column stays empty.
        assert_eq!(column_value(&df, "Naam", 1), "");
    }

    #[test]
    fn missing_everything_yields_empty_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let df = ingest(&dir.path().join("Inventaris_ZH01.xlsx")).unwrap();
        assert_eq!(df.height(), 0);
    }

    #[test]
    fn join_requires_the_article_identifier() {
        let locations = frame_from_columns(
            vec!["Kast".to_string()],
            vec![vec!["K-01".to_string()]],
        )
        .unwrap();
        let articles = frame_from_columns(
            vec!["ArtikelNr".to_string()],
            vec![vec!["A1".to_string()]],
        )
        .unwrap();
        let error = join_sources(locations, articles).unwrap_err();
        assert!(matches!(error, IngestError::JoinColumnMissing { side: "Locations", .. }));
    }

    #[test]
    fn csv_cells_and_headers_are_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Artikels.csv");
        fs::write(&path, " ArtikelNr ,Naam\n A1 , Gauze \n").unwrap();

        let df = read_csv_frame(&path).unwrap();
        assert_eq!(column_value(&df, "ArtikelNr", 0), "A1");
        assert_eq!(column_value(&df, "Naam", 0), "Gauze");
    }
}
