//! Raw shape of an aggregate report as it appears on the wire.
//!
//! Everything is read as text with defaults so that missing elements come out
//! empty; validation happens in the parser.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReportDateRange {
	pub begin: String,
	pub end: String
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReportMetadata {
	pub org_name: String,
	pub email: String,
	pub extra_contact_info: String,
	pub report_id: String,
	pub date_range: ReportDateRange
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Policy {
	pub domain: String,
	pub adkim: String,
	pub aspf: String,
	pub p: String,
	pub sp: String,
	pub pct: String
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PolicyReason {
	#[serde(rename = "type")]
	pub ty: String,
	pub comment: String
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordRowPolicy {
	pub disposition: String,
	pub dkim: String,
	pub spf: String,
	pub reason: Vec<PolicyReason>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordRow {
	pub source_ip: String,
	pub count: String,
	pub policy_evaluated: RecordRowPolicy
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordIdentifiers {
	pub header_from: String
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordDKIMResult {
	pub domain: String,
	pub result: String,
	pub selector: String
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordSPFResult {
	pub domain: String,
	pub scope: String,
	pub result: String
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordResults {
	pub dkim: Vec<RecordDKIMResult>,
	pub spf: Vec<RecordSPFResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Record {
	pub row: RecordRow,
	pub identifiers: RecordIdentifiers,
	pub auth_results: RecordResults
}

/// The `feedback` root element.
///
/// `policy_published` is a list because some senders repeat it; a lone
/// element deserializes into a list of one.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Feedback {
	pub report_metadata: ReportMetadata,
	pub policy_published: Vec<Policy>,
	pub record: Vec<Record>
}
