//! Batch runs against real workbook fixtures on disk.

use std::fs;
use std::path::Path;

use matmas_cli::batch::{BatchOptions, run_batch};
use rust_xlsxwriter::Workbook;

fn write_input(path: &Path, article: &str) {
    let mut workbook = Workbook::new();

    let articles = workbook.add_worksheet();
    articles.set_name("Artikels").unwrap();
    for (col, header) in ["ArtikelNr", "Naam", "Actief", "EindDat"].iter().enumerate() {
        articles.write_string(0, col as u16, *header).unwrap();
    }
    articles.write_string(1, 0, article).unwrap();
    articles.write_string(1, 1, "Gauze 10x10").unwrap();
    articles.write_string(1, 2, "J").unwrap();
    articles.write_string(1, 3, "").unwrap();

    let locations = workbook.add_worksheet();
    locations.set_name("Locatie").unwrap();
    locations.write_string(0, 0, "ArtikelNr").unwrap();
    locations.write_string(0, 1, "Kast").unwrap();
    locations.write_string(1, 0, article).unwrap();
    locations.write_string(1, 1, "K-01").unwrap();

    workbook.save(path).unwrap();
}

fn write_template(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "MATMAS import template").unwrap();
    for (col, header) in ["MATNR", "MAKTX", "WERKS"].iter().enumerate() {
        sheet.write_string(4, col as u16, *header).unwrap();
    }
    workbook.save(path).unwrap();
}

fn write_settings(dir: &Path) -> std::path::PathBuf {
    let template = dir.join("template.xlsx");
    write_template(&template);
    let settings = serde_json::json!({
        "mapping_folder": dir.to_str().unwrap(),
        "template_file": template.to_str().unwrap(),
        "mappings": {
            "WERKS": {"type": "filename_extraction"},
            "MATNR": {"type": "direct", "source": "ArtikelNr"},
            "MAKTX": {"type": "direct", "source": "Naam"}
        }
    });
    let path = dir.join("settings.json");
    fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();
    path
}

#[test]
fn batch_converts_matching_workbooks_only() {
    let dir = tempfile::tempdir().unwrap();
    let input_dir = dir.path().join("input");
    fs::create_dir_all(&input_dir).unwrap();
    write_input(&input_dir.join("Inventaris_ZH01.xlsx"), "A1");
    write_input(&input_dir.join("Inventaris_ZH02.xlsx"), "B1");
    // No site suffix: must be skipped.
    write_input(&input_dir.join("scratchpad.xlsx"), "C1");
    let settings = write_settings(dir.path());

    let result = run_batch(&BatchOptions {
        input_folder: input_dir.clone(),
        output_dir: None,
        settings,
        date: Some("2024-06-01".to_string()),
    })
    .unwrap();

    assert_eq!(result.reports.len(), 2);
    assert!(!result.has_errors());
    assert_eq!(result.output_dir, input_dir.join("output"));

    for (report, site) in result.reports.iter().zip(["ZH01", "ZH02"]) {
        assert_eq!(report.site_code, site);
        assert_eq!(report.rows, 1);
        let output = report.output.as_ref().unwrap();
        let name = output.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(&format!("Inventaris_{site}_SAP_")));
        assert!(name.ends_with(".csv"));
        let content = fs::read(output).unwrap();
        assert_eq!(&content[..3], [0xEF, 0xBB, 0xBF]);
        let text = String::from_utf8(content[3..].to_vec()).unwrap();
        assert!(text.starts_with("MATNR;MAKTX;WERKS"));
        assert!(text.contains(&format!(";{site}")));
    }

    let summary = result.summary_file.unwrap();
    let summary_text = fs::read_to_string(summary).unwrap();
    assert!(summary_text.contains("2 file(s)"));
    assert!(summary_text.contains("1 rows ->"));
}

#[test]
fn empty_folder_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input_dir = dir.path().join("input");
    fs::create_dir_all(&input_dir).unwrap();
    let settings = write_settings(dir.path());

    let result = run_batch(&BatchOptions {
        input_folder: input_dir,
        output_dir: None,
        settings,
        date: None,
    })
    .unwrap();

    assert!(result.reports.is_empty());
    assert!(result.summary_file.is_none());
}

#[test]
fn missing_settings_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_batch(&BatchOptions {
        input_folder: dir.path().to_path_buf(),
        output_dir: None,
        settings: dir.path().join("nope.json"),
        date: None,
    });
    assert!(result.is_err());
}

#[test]
fn unreadable_workbook_yields_empty_report_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let input_dir = dir.path().join("input");
    fs::create_dir_all(&input_dir).unwrap();
    // Not a real workbook, and no sibling csv fallback either.
    fs::write(input_dir.join("Broken_ZH09.xlsx"), b"not a workbook").unwrap();
    let settings = write_settings(dir.path());

    let result = run_batch(&BatchOptions {
        input_folder: input_dir,
        output_dir: None,
        settings,
        date: None,
    })
    .unwrap();

    assert_eq!(result.reports.len(), 1);
    assert!(!result.has_errors());
    assert!(result.reports[0].output.is_none());
    assert_eq!(result.reports[0].rows, 0);
}
