pub mod errors;
pub mod model;
mod reader;
mod values;

pub use errors::{ReaderError, RowIssue};
pub use model::{ColumnKind, ParsedTable, ReadOptions, DEFAULT_NA_VALUES};
pub use reader::{parse_table, read_table};
pub use values::{parse_optional_f64, parse_timestamp};

#[cfg(test)]
mod tests;
