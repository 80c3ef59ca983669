//! utils is a tool module, for now it only hosts the optional status report.
#[cfg(feature = "status-report")]
pub mod status_report;
