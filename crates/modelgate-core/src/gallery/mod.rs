//! Gallery catalogs, model descriptors and reference resolution.

mod overrides;
mod reference;
mod resolver;
mod types;

pub use overrides::{apply_overrides, merge_overrides};
pub use reference::GalleryReference;
pub use resolver::{GalleryResolver, HttpGalleryResolver};
pub(crate) use types::validate_relative_name;
pub use types::{
    Gallery, GalleryModel, GalleryOp, ModelConfig, ModelFile, OpStatus, PromptTemplate,
};
