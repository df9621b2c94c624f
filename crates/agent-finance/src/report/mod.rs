//! Report model, compilation and rendering

pub mod compiler;
pub mod model;
pub mod render;

pub use compiler::ReportCompiler;
pub use model::{Block, Report, Section, SectionKind};
pub use render::{OutputFormat, ReportWriter, file_stem, to_markdown};
