mod reader;
mod writer;

pub use reader::{RecordSource, SourceOptions, open_input};
pub use writer::JsonLinesWriter;

use std::path::Path;

/// Inputs and outputs ending in `.gz` are gzip-compressed.
pub(crate) fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}
