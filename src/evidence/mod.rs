//! Evidence archives: extraction, file-name rules and placement into
//! checklist workbooks.

pub mod archive;
pub mod attach;
pub mod naming;

pub use archive::{EvidenceImage, extract_images, extract_poc_folder};
pub use attach::{AttachOutcome, attach_evidence};
pub use naming::{EvidenceGroup, EvidenceProfile, group_by_base_number};
