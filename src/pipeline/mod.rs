pub mod document;
pub mod page;

pub use document::DocumentPipeline;
