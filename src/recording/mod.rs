//! Recording of Elasticsearch exchanges into profiler sessions

mod diagnostic;
mod recorder;

pub use diagnostic::{build_diagnostic_text, build_diagnostic_text_with, TRUNCATION_MARKER};
pub use recorder::ResponseRecorder;

/// Category label for every timing this crate records
pub const ELASTICSEARCH_CATEGORY: &str = "elasticsearch";
