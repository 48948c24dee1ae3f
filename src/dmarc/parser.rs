use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use xml::reader::{ParserConfig, XmlEvent};

use super::report::{Alignment, Record, Report, Verdicts};
use super::types;
use crate::error::{ReportError, UnknownValue};

/// Parses the XML of an aggregate report into a validated [`Report`].
///
/// A single bad record (unparseable source IP, unknown verdict, missing
/// alignment) rejects the whole document.
pub fn parse(xml: &str) -> Result<Report, ReportError> {
	check_well_formed(xml)?;

	// senders order policy_published, record and the auth_results entries freely
	let mut deserializer = serde_xml_rs::Deserializer::new_from_reader(xml.as_bytes())
		.non_contiguous_seq_elements(true);
	let feedback = types::Feedback::deserialize(&mut deserializer)
		.map_err(|e| ReportError::InvalidReportData(format!("invalid xml: {}", e)))?;

	let metadata = feedback.report_metadata;
	// senders disagree on whether policy_published repeats; only the first counts
	let policy = feedback.policy_published.into_iter().next().unwrap_or_default();

	let records = feedback.record
		.iter()
		.map(parse_record)
		.collect::<Result<Vec<_>, _>>()?;

	Ok(Report {
		report_id: metadata.report_id.trim().to_string(),
		domain: policy.domain.trim().to_string(),
		org: metadata.org_name.trim().to_string(),
		min_date: parse_timestamp(&metadata.date_range.begin, "date_range/begin")?,
		max_date: parse_timestamp(&metadata.date_range.end, "date_range/end")?,
		email: non_empty(&metadata.email),
		extra_contact_info: non_empty(&metadata.extra_contact_info),
		policy_adkim: non_empty(&policy.adkim),
		policy_aspf: non_empty(&policy.aspf),
		policy_p: non_empty(&policy.p),
		policy_sp: non_empty(&policy.sp),
		policy_pct: non_empty(&policy.pct)
			.map(|pct| parse_pct(&pct))
			.transpose()?,
		raw_xml: xml.to_string(),
		records,
	})
}

/// The deserializer stops at the end of the root element, so the rest of the
/// document is checked here.
fn check_well_formed(xml: &str) -> Result<(), ReportError> {
	let mut reader = ParserConfig::new()
		.allow_multiple_root_elements(false)
		.create_reader(xml.as_bytes());

	loop {
		match reader.next() {
			Ok(XmlEvent::EndDocument) => return Ok(()),
			Ok(_) => {},
			Err(e) => return Err(ReportError::InvalidReportData(format!("invalid xml: {}", e))),
		}
	}
}

fn parse_record(record: &types::Record) -> Result<Record, ReportError> {
	let row = &record.row;
	let evaluated = &row.policy_evaluated;

	let source_ip = row.source_ip.trim();
	let source_ip = source_ip
		.parse::<IpAddr>()
		.map_err(|_| ReportError::InvalidReportData(format!("invalid IP address: '{}'", source_ip)))?;

	let dkim = &record.auth_results.dkim;
	let spf = &record.auth_results.spf;

	Ok(Record {
		source_ip,
		row_count: parse_number(&row.count, "row/count")?,
		disposition: non_empty(&evaluated.disposition)
			.map(|value| value.parse())
			.transpose()?,
		reason: non_empty(&join(evaluated.reason.iter().map(|r| r.ty.as_str()))),
		dkim_domain: non_empty(&join(dkim.iter().map(|r| r.domain.as_str()))),
		dkim_result: Verdicts::parse_joined(&join(dkim.iter().map(|r| r.result.as_str())))?,
		spf_domain: non_empty(&join(spf.iter().map(|r| r.domain.as_str()))),
		spf_result: Verdicts::parse_joined(&join(spf.iter().map(|r| r.result.as_str())))?,
		spf_align: parse_alignment(&evaluated.spf, "policy_evaluated/spf")?,
		dkim_align: parse_alignment(&evaluated.dkim, "policy_evaluated/dkim")?,
		identifier_header_from: non_empty(&record.identifiers.header_from),
	})
}

fn parse_alignment(text: &str, field: &'static str) -> Result<Alignment, UnknownValue> {
	text.parse().map_err(|e: UnknownValue| UnknownValue { field, ..e })
}

/// Missing numbers read as zero, anything else must parse.
fn parse_number<T>(text: &str, field: &str) -> Result<T, ReportError>
where
	T: FromStr + Default,
{
	let text = text.trim();
	if text.is_empty() {
		return Ok(T::default());
	}

	text.parse()
		.map_err(|_| ReportError::InvalidReportData(format!("invalid {} value '{}'", field, text)))
}

fn parse_pct(text: &str) -> Result<u8, ReportError> {
	let pct = parse_number::<u8>(text, "policy_published/pct")?;
	if pct > 100 {
		return Err(ReportError::InvalidReportData(format!("policy_published/pct out of range: {}", pct)));
	}
	Ok(pct)
}

fn parse_timestamp(text: &str, field: &str) -> Result<DateTime<Utc>, ReportError> {
	let seconds = parse_number::<i64>(text, field)?;
	Utc.timestamp_opt(seconds, 0)
		.single()
		.ok_or_else(|| ReportError::InvalidReportData(format!("{} out of range: {}", field, seconds)))
}

fn join<'a>(values: impl Iterator<Item = &'a str>) -> String {
	values.map(str::trim).collect::<Vec<_>>().join("/")
}

fn non_empty(text: &str) -> Option<String> {
	match text.trim() {
		"" => None,
		text => Some(text.to_string()),
	}
}
