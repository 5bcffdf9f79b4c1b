//! Reading uploaded workbooks and the shared styling of generated ones.
//!
//! Uploaded workbooks are never edited in place: values come from calamine,
//! pictures from the drawing parts, and the result is written afresh with
//! `rust_xlsxwriter`.

pub mod drawing;
pub mod reader;
pub mod style;
pub mod writer;

pub use drawing::{AnchoredImage, read_anchored_images};
pub use reader::{SheetModel, WorkbookModel};
pub use writer::{TableLayout, write_table};
