//! Terminal output for the CLI: result tables, spinners and colors.

pub mod progress;
pub mod tables;
pub mod theme;

pub use progress::{create_spinner, with_spinner};
pub use tables::{TableBuilder, create_results_table, create_status_table, format_price};
pub use theme::{THEME, Theme};
