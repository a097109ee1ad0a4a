//! End-to-end conversion runs against real workbook fixtures.

use std::path::Path;

use matmas_ingest::column_value;
use matmas_model::Settings;
use matmas_transform::Converter;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

fn write_input(path: &Path) {
    let mut workbook = Workbook::new();

    let articles = workbook.add_worksheet();
    articles.set_name("Artikels").unwrap();
    for (col, header) in ["ArtikelNr", "Naam", "Eenheid", "Actief", "EindDat"]
        .iter()
        .enumerate()
    {
        articles.write_string(0, col as u16, *header).unwrap();
    }
    let rows = [
        ["A1", "Gauze 10x10", "kg", "J", ""],
        ["A2", "Syringe 5ml", "box", "J", "2020-01-01"],
        ["A3", "Very long article description that exceeds forty characters easily", "st", "J", ""],
        ["A4", "Inactive item", "st", "N", ""],
    ];
    for (row, values) in rows.iter().enumerate() {
        for (col, value) in values.iter().enumerate() {
            articles
                .write_string(row as u32 + 1, col as u16, *value)
                .unwrap();
        }
    }

    let locations = workbook.add_worksheet();
    locations.set_name("Locatie").unwrap();
    locations.write_string(0, 0, "ArtikelNr").unwrap();
    locations.write_string(0, 1, "Kast").unwrap();
    for (row, (nr, kast)) in [("A1", "K-01"), ("A2", "K-02"), ("A3", "K-03"), ("A4", "K-04")]
        .iter()
        .enumerate()
    {
        locations.write_string(row as u32 + 1, 0, *nr).unwrap();
        locations.write_string(row as u32 + 1, 1, *kast).unwrap();
    }

    workbook.save(path).unwrap();
}

fn write_uom_mapping(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("UOM").unwrap();
    sheet.write_string(0, 0, "Legacy").unwrap();
    sheet.write_string(0, 1, "SAP").unwrap();
    for (row, (legacy, sap)) in [("KG", "KG"), ("ST", "ST")].iter().enumerate() {
        sheet.write_string(row as u32 + 1, 0, *legacy).unwrap();
        sheet.write_string(row as u32 + 1, 1, *sap).unwrap();
    }
    workbook.save(path).unwrap();
}

fn write_template(path: &Path, headers: &[&str]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "MATMAS import template").unwrap();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(4, col as u16, *header).unwrap();
    }
    workbook.save(path).unwrap();
}

fn settings(dir: &TempDir) -> Settings {
    let template = dir.path().join("template.xlsx");
    let config = serde_json::json!({
        "mapping_folder": dir.path().to_str().unwrap(),
        "template_file": template.to_str().unwrap(),
        "mappings": {
            "WERKS": {"type": "filename_extraction"},
            "MATNR": {"type": "direct", "source": "ArtikelNr"},
            "MAKTX": {"type": "logic_length", "source": "Naam", "max_length": 40},
            "MEINS": {
                "type": "map",
                "source": "Eenheid",
                "map_file": "uom.xlsx",
                "sheet_name": "UOM",
                "map_key": "Legacy",
                "map_value": "SAP",
                "fallback_strategy": "error"
            },
            "LGORT": {"type": "direct", "source": "Kast"}
        },
        "custom_calculations": [
            {"target_column": "MAKTX2", "formula": "upper(row.Naam)"}
        ]
    });
    serde_json::from_value(config).unwrap()
}

#[test]
fn converts_a_workbook_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Inventaris_ZH05.xlsx");
    write_input(&input);
    write_uom_mapping(&dir.path().join("uom.xlsx"));
    write_template(
        &dir.path().join("template.xlsx"),
        &["MATNR", "MAKTX", "MAKTX2", "MEINS", "WERKS", "LGORT", "BKLAS"],
    );

    let converter = Converter::from_settings(settings(&dir));
    let outcome = converter.run(&input, Some("2024-06-01")).unwrap();

    // A2 expired, A4 inactive.
    assert_eq!(outcome.data.height(), 2);
    assert!(outcome.faults.is_empty());

    let names: Vec<&str> = outcome.data.get_column_names_str();
    assert_eq!(
        names,
        vec!["MATNR", "MAKTX", "MAKTX2", "MEINS", "WERKS", "LGORT", "BKLAS"]
    );

    assert_eq!(column_value(&outcome.data, "MATNR", 0), "A1");
    assert_eq!(column_value(&outcome.data, "MEINS", 0), "KG");
    assert_eq!(column_value(&outcome.data, "WERKS", 0), "ZH05");
    assert_eq!(column_value(&outcome.data, "LGORT", 0), "K-01");
    assert_eq!(column_value(&outcome.data, "MAKTX2", 0), "GAUZE 10X10");
    // Template column no rule produced stays empty.
    assert_eq!(column_value(&outcome.data, "BKLAS", 0), "");

    // Long description truncated to the configured limit.
    assert_eq!(column_value(&outcome.data, "MATNR", 1), "A3");
    assert_eq!(column_value(&outcome.data, "MAKTX", 1).chars().count(), 40);
    // "st" hits the mapping case-insensitively.
    assert_eq!(column_value(&outcome.data, "MEINS", 1), "ST");
}

#[test]
fn lookup_miss_yields_err_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Inventaris_ZH05.xlsx");
    write_input(&input);
    // No uom.xlsx on disk: every lookup misses.
    write_template(&dir.path().join("template.xlsx"), &["MATNR", "MEINS", "WERKS"]);

    let converter = Converter::from_settings(settings(&dir));
    let outcome = converter.run(&input, Some("2024-06-01")).unwrap();

    assert_eq!(column_value(&outcome.data, "MEINS", 0), "ERR");
    assert_eq!(column_value(&outcome.data, "MEINS", 1), "ERR");
}

#[test]
fn unreadable_input_yields_empty_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let converter = Converter::from_settings(settings(&dir));
    let outcome = converter
        .run(&dir.path().join("Missing_ZH01.xlsx"), Some("2024-06-01"))
        .unwrap();
    assert!(outcome.is_empty());
}

#[test]
fn reference_date_defaults_to_today() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Inventaris_ZH05.xlsx");
    write_input(&input);
    write_template(&dir.path().join("template.xlsx"), &["MATNR", "WERKS"]);

    let converter = Converter::from_settings(settings(&dir));
    let outcome = converter.run(&input, None).unwrap();
    // A2's 2020 end date is long past; A1 and A3 stay.
    assert_eq!(outcome.data.height(), 2);
}
