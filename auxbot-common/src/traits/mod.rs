pub mod reporter;

pub use reporter::{ErrorReporter, ErrorTags, TracingReporter};
