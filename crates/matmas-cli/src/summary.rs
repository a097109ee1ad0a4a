use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use matmas_cli::batch::{BatchResult, FileReport};

pub fn print_summary(result: &BatchResult) {
    println!("Output: {}", result.output_dir.display());
    if let Some(path) = &result.summary_file {
        println!("Summary log: {}", path.display());
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("File"),
        header_cell("Site"),
        header_cell("Rows"),
        header_cell("Faults"),
        header_cell("Status"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);

    let mut total_rows = 0usize;
    let mut total_faults = 0usize;
    for report in &result.reports {
        total_rows += report.rows;
        total_faults += report.faulted_fields.len();
        let file = report
            .input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| report.input.display().to_string());
        table.add_row(vec![
            Cell::new(file),
            Cell::new(&report.site_code)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(report.rows),
            fault_cell(report.faulted_fields.len()),
            status_cell(report),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(total_rows).add_attribute(Attribute::Bold),
        fault_cell(total_faults).add_attribute(Attribute::Bold),
        dim_cell("-"),
    ]);
    println!("{table}");

    if result.has_errors() {
        eprintln!("Errors:");
        for report in &result.reports {
            if let Some(error) = &report.error {
                eprintln!("- {}: {error}", report.input.display());
            }
        }
    }
}

fn status_cell(report: &FileReport) -> Cell {
    if report.error.is_some() {
        Cell::new("FAILED")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold)
    } else if report.output.is_some() {
        Cell::new("✓")
            .fg(Color::Green)
            .add_attribute(Attribute::Bold)
    } else {
        dim_cell("empty")
    }
}

fn fault_cell(count: usize) -> Cell {
    if count > 0 {
        Cell::new(count).fg(Color::Yellow).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

fn header_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).add_attribute(Attribute::Bold)
}
