//! Word documents built from `.docx` templates.

pub mod annexure;
pub mod dates;
pub mod document;
pub mod report;
pub mod table;

pub use annexure::{AnnexureImage, annexure_order, insert_annexures};
pub use document::{DocxPackage, replace_placeholders};
pub use report::build_cyber_security_report;
pub use table::{insert_table, set_poc_attached};
