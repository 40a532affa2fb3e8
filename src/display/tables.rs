//! Table formatting for search results and index status.

use crate::search::SearchPage;
use crate::semantic::CacheState;
use crate::vector::IndexStatus;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { table: styled() }
    }

    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        self.table.set_header(bold_cells(headers));
        self
    }

    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    pub fn build(self) -> String {
        self.table.to_string()
    }
}

fn styled() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table
}

fn bold_cells(headers: Vec<&str>) -> Vec<Cell> {
    headers
        .into_iter()
        .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
        .collect()
}

/// Formats a price in pesos with thousands separators: `$1.250.000`.
pub fn format_price(price: u64) -> String {
    let digits = price.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push('$');
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// One row per listing on the page.
pub fn create_results_table(page: &SearchPage) -> String {
    let mut table = styled();
    table.set_header(bold_cells(vec![
        "Id", "Title", "Location", "Type", "Price", "m²", "Rooms", "Baths",
    ]));

    for record in &page.items {
        table.add_row(vec![
            Cell::new(record.id),
            Cell::new(record.title.as_deref().unwrap_or("(untitled)")),
            Cell::new(record.location.as_deref().unwrap_or("-")),
            Cell::new(record.property_type.as_deref().unwrap_or("-")),
            Cell::new(record.price.map_or_else(|| "-".to_string(), format_price))
                .set_alignment(CellAlignment::Right),
            Cell::new(or_dash(record.area_m2.map(|a| format!("{a:.0}"))))
                .set_alignment(CellAlignment::Right),
            Cell::new(or_dash(record.rooms)).set_alignment(CellAlignment::Right),
            Cell::new(or_dash(record.bathrooms)).set_alignment(CellAlignment::Right),
        ]);
    }

    table.to_string()
}

/// Summary of the persisted snapshot and the in-memory cache.
pub fn create_status_table(status: &IndexStatus, state: CacheState, records: usize) -> String {
    let mut table = styled();
    table.set_header(bold_cells(vec!["Property", "Value"]));

    table.add_row(vec!["Index path".to_string(), status.path.display().to_string()]);
    table.add_row(vec!["Records".to_string(), records.to_string()]);
    table.add_row(vec!["Cache state".to_string(), state.to_string()]);

    let (presence, color) = if status.present {
        ("present", Color::Green)
    } else {
        ("missing", Color::Yellow)
    };
    table.add_row(vec![
        Cell::new("Snapshot"),
        Cell::new(presence).fg(color).add_attribute(Attribute::Bold),
    ]);

    if let Some(generation) = &status.generation {
        table.add_row(vec!["Generation".to_string(), generation.clone()]);
    }

    if let Some(meta) = &status.metadata {
        table.add_row(vec!["Model".to_string(), meta.model_name.clone()]);
        table.add_row(vec!["Dimension".to_string(), meta.dimension.to_string()]);
        table.add_row(vec!["Embeddings".to_string(), meta.embedding_count.to_string()]);
        let updated = chrono::DateTime::from_timestamp(meta.updated_at as i64, 0)
            .map_or_else(|| meta.updated_at.to_string(), |t| t.to_rfc3339());
        table.add_row(vec!["Updated".to_string(), updated]);
    }

    table.to_string()
}
