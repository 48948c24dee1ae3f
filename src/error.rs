use thiserror::Error;

/// Why a single attachment or message did not produce a stored report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
	/// The payload or the XML inside it could not be turned into a valid report.
	#[error("invalid report data: {0}")]
	InvalidReportData(String),

	/// The attachment is neither a ZIP archive nor a GZIP stream.
	#[error("unsupported attachment: {0}")]
	UnsupportedAttachment(String),

	/// A report with the same domain and report ID is already stored.
	#[error("{domain} {report_id} is already imported")]
	DuplicateReport { domain: String, report_id: String },
}

/// A report field held a value outside of its enumeration.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {field} value '{value}'")]
pub struct UnknownValue {
	pub field: &'static str,
	pub value: String,
}

impl From<UnknownValue> for ReportError {
	fn from(err: UnknownValue) -> Self {
		ReportError::InvalidReportData(err.to_string())
	}
}
