use flate2::read::GzDecoder;
use log::debug;
use std::io::{prelude::*, Cursor};
use zip;

use crate::error::ReportError;

/// Container formats a report can arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFileType {
	Gzip,
	Zip,
}

impl ReportFileType {
	/// Sniffs the container format from the leading bytes of the content.
	pub fn detect(data: &[u8]) -> Option<ReportFileType> {
		match data {
			[0x1f, 0x8b, ..] => Some(ReportFileType::Gzip),
			[b'P', b'K', 3, 4, ..] | [b'P', b'K', 5, 6, ..] => Some(ReportFileType::Zip),
			_ => None,
		}
	}

	pub fn mime_type(&self) -> &'static str {
		match self {
			ReportFileType::Gzip => "application/gzip",
			ReportFileType::Zip => "application/zip",
		}
	}
}

/// One attachment of a mail message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
	pub filename: String,
	pub content: Vec<u8>,
}

/// Turns report attachments into XML text.
#[derive(Debug, Clone)]
pub struct Extractor {
	max_size: u64,
}

impl Extractor {
	/// `max_size` caps the decompressed size of a single report, in bytes.
	pub fn new(max_size: u64) -> Extractor {
		Extractor { max_size }
	}

	/// Given an attachment, decompresses the report into a String containing XML.
	pub fn extract(&self, attachment: &Attachment) -> Result<String, ReportError> {
		let report_type = ReportFileType::detect(&attachment.content).ok_or_else(|| {
			ReportError::UnsupportedAttachment(format!("{} is neither zip nor gzip", attachment.filename))
		})?;
		debug!("{} detected as {}", attachment.filename, report_type.mime_type());

		let data = self.read_report(report_type, &attachment.content)?;
		String::from_utf8(data).map_err(|e| {
			ReportError::InvalidReportData(format!("{} is not valid UTF-8: {}", attachment.filename, e))
		})
	}

	fn read_report(&self, report_type: ReportFileType, data: &[u8]) -> Result<Vec<u8>, ReportError> {
		let body_reader = Cursor::new(data);
		match report_type {
			ReportFileType::Gzip => {
				let d = GzDecoder::new(body_reader);
				self.read_capped(d)
			},
			ReportFileType::Zip => {
				let mut archive = zip::ZipArchive::new(body_reader)
					.map_err(|e| ReportError::InvalidReportData(format!("unreadable zip archive: {}", e)))?;

				if archive.len() == 0 {
					return Err(ReportError::InvalidReportData("zip archive has no files".to_string()));
				}
				if archive.len() > 1 {
					debug!("zip archive has {} files, reading the first", archive.len());
				}

				let report_file = archive
					.by_index(0)
					.map_err(|e| ReportError::InvalidReportData(format!("no readable file in zip: {}", e)))?;
				self.read_capped(report_file)
			}
		}
	}

	fn read_capped<R: Read>(&self, reader: R) -> Result<Vec<u8>, ReportError> {
		let mut result = Vec::new();
		reader
			.take(self.max_size + 1)
			.read_to_end(&mut result)
			.map_err(|e| ReportError::InvalidReportData(format!("decompression failed: {}", e)))?;

		if result.len() as u64 > self.max_size {
			return Err(ReportError::InvalidReportData(format!(
				"report exceeds {} bytes once decompressed",
				self.max_size
			)));
		}
		Ok(result)
	}
}
