/// Post-scan helpers over a finished [`DirTree`](crate::model::DirTree).

pub mod file_types;
pub mod top_files;

pub use file_types::{analyse_file_types, categorise_extension, extension_of, CategoryStats, FileCategory};
pub use top_files::{top_files, LargestFile};
