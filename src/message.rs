use imap_proto::types::{BodyContentCommon, BodyStructure, ContentEncoding};
use regex::Regex;

/// How the bytes of a part are encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
	Base64,
	/// 7bit, 8bit, binary or anything we pass through untouched.
	Raw,
}

/// An attachment located in a message's body structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
	/// IMAP section path, e.g. `[2, 1]` for `BODY[2.1]`.
	pub section: Vec<u32>,
	pub filename: String,
	pub encoding: TransferEncoding,
}

impl AttachmentPart {
	pub fn section_name(&self) -> String {
		self.section.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(".")
	}
}

/// Searches the given IMAP BodyStructure for attachments.
pub fn find_attachments(body_structure: &BodyStructure) -> Vec<AttachmentPart> {
	let mut found = Vec::new();
	walk(body_structure, Vec::new(), &mut found);
	found
}

fn walk(body_structure: &BodyStructure, prefix: Vec<u32>, found: &mut Vec<AttachmentPart>) {
	// a message that is not multipart has its only body at section 1
	let section = if prefix.is_empty() { vec![1] } else { prefix.clone() };

	match body_structure {
		BodyStructure::Multipart { bodies, .. } => {
			// unwrap the multipart message
			for (i, body) in bodies.iter().enumerate() {
				let mut part = prefix.clone();
				part.push(i as u32 + 1);
				walk(body, part, found);
			}
		},

		BodyStructure::Basic { common, other, .. } => {
			// anything non-text might be a report, the extractor decides
			found.push(AttachmentPart {
				section,
				filename: filename(common).unwrap_or_default(),
				encoding: transfer_encoding(&other.transfer_encoding),
			});
		},

		BodyStructure::Text { common, other, .. } => {
			// text is usually the human-readable message, unless it was attached
			let attached = common
				.disposition
				.as_ref()
				.map_or(false, |d| d.ty.eq_ignore_ascii_case("attachment"));
			let name = filename(common);
			if attached || name.is_some() {
				found.push(AttachmentPart {
					section,
					filename: name.unwrap_or_default(),
					encoding: transfer_encoding(&other.transfer_encoding),
				});
			}
		},

		BodyStructure::Message { .. } => {
			// forwarded messages are not reports
			// ignore it
		},
	}
}

fn filename(common: &BodyContentCommon) -> Option<String> {
	let from_disposition = common
		.disposition
		.as_ref()
		.and_then(|d| d.params.as_ref())
		.and_then(|params| param(params, "filename"));

	from_disposition.or_else(|| common.ty.params.as_ref().and_then(|params| param(params, "name")))
}

fn param<K, V>(params: &[(K, V)], key: &str) -> Option<String>
where
	K: AsRef<str>,
	V: AsRef<str>,
{
	params
		.iter()
		.find(|(k, _)| k.as_ref().eq_ignore_ascii_case(key))
		.map(|(_, v)| v.as_ref().to_string())
}

fn transfer_encoding(encoding: &ContentEncoding) -> TransferEncoding {
	match encoding {
		ContentEncoding::Base64 => TransferEncoding::Base64,
		_ => TransferEncoding::Raw,
	}
}

/// Undoes the transfer encoding of a fetched part.
pub fn decode_part(encoding: TransferEncoding, data: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
	match encoding {
		TransferEncoding::Base64 => {
			let body_no_lines: Vec<u8> = data.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
			base64::decode(&body_no_lines)
		},
		TransferEncoding::Raw => Ok(data.to_vec()),
	}
}

/// Pulls the `Report-ID:` marker many senders put in the subject.
#[derive(Debug, Clone)]
pub struct SubjectReportId {
	re: Regex,
}

impl SubjectReportId {
	pub fn new() -> SubjectReportId {
		SubjectReportId {
			re: Regex::new(r"Report-ID:\s*<?([^\s<>]+)>?").expect("report id pattern is valid"),
		}
	}

	pub fn find<'s>(&self, subject: &'s str) -> Option<&'s str> {
		self.re.captures(subject).and_then(|c| c.get(1)).map(|m| m.as_str())
	}
}

impl Default for SubjectReportId {
	fn default() -> Self {
		SubjectReportId::new()
	}
}
