//! Tables: layout configuration, data building, validation and helpers

mod builder;
mod format;
mod model;
mod utils;
mod validate;

pub use builder::{extract_year, row_from, BuiltTable, TableBuilder};
pub use format::{format_cell, group_thousands};
pub use model::{
    ColumnSpec, ColumnType, FooterKind, FooterRowSpec, InstanceRange, LayoutKind, Row, RowSpec,
    TableConfig, TableParameters, TablesConfig, DEFAULT_MAX_INSTANCES,
};
pub use utils::{
    aggregate_column, create_empty_row, create_table_template, filter_rows, records_to_rows,
    rows_to_records, sort_rows, to_html, to_markdown, Aggregate,
};
pub use validate::{validate_table_data, validate_table_row};
