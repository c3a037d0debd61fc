//! Catalog codecs: dot-key flattening of JSON locale documents and the
//! JSON↔PO transforms.
//!
//! Everything in here is a pure synchronous transform; file I/O stays
//! in the pipeline stages.

pub mod keys;
pub mod po;

pub use keys::{
    TranslationKeyRecord, collect_leaf_values, flatten, merge_documents,
    reconstruct_with_updated_values, unflatten,
};
pub use po::{PoEntry, parse_po, render_po};
