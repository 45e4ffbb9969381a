//! Versioned stage prompts and their checksums

mod catalog;
mod templates;

pub use catalog::{
    checksum, BuiltinPromptCatalog, DirectoryPromptCatalog, PromptCatalog, PromptError,
    PromptProvenance, PromptRef, PromptTemplate,
};
pub use templates::BUILTIN_VERSION;
