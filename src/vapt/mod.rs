//! Public IP VAPT follow-up audit: scanner parsing, catalog matching,
//! auditor curation and the follow-up workbook.

pub mod catalog;
pub mod followup;
pub mod merge;
pub mod metadata;
pub mod nessus;
pub mod nmap;
pub mod report;

pub use catalog::{MatchOutcome, MatchedGroup, VulnerabilityCatalog};
pub use followup::{OldReport, RiskCounts, compare_vulnerabilities};
pub use merge::{MergeReply, MergeState, VulnerabilityDetails};
pub use nessus::{Finding, NessusExport, parse_nessus_archive};
pub use nmap::{NmapScan, parse_nmap_archive};
pub use report::{FollowupInput, build_followup_workbook};
