use std::io::{Cursor, Write};

use chrono::{TimeZone, Utc};
use herald_dmarc::dmarc::{self, Alignment, Disposition, DkimResult, Record, Report, SpfResult, Verdicts};
use herald_dmarc::error::ReportError;
use herald_dmarc::payload::{Attachment, Extractor};
use zip::write::FileOptions;

const ONE_RECORD: &str = include_str!("fixtures/report_one_record.xml");
const MULTIPLE_RECORDS: &str = include_str!("fixtures/report_multiple_records.xml");

fn passing_record(source_ip: &str) -> Record {
	Record {
		source_ip: source_ip.parse().unwrap(),
		row_count: 1,
		disposition: Some(Disposition::None),
		reason: None,
		dkim_domain: Some("example.com".to_string()),
		dkim_result: Some(Verdicts::single(DkimResult::Pass)),
		spf_domain: Some("example.com".to_string()),
		spf_result: Some(Verdicts::single(SpfResult::Pass)),
		spf_align: Alignment::Pass,
		dkim_align: Alignment::Pass,
		identifier_header_from: Some("example.com".to_string()),
	}
}

#[test]
fn report_with_one_record() {
	let report = dmarc::parse(ONE_RECORD).unwrap();

	let expected = Report {
		report_id: "8e65e066109d4eb0b0f71197b6e17722".to_string(),
		domain: "example.com".to_string(),
		org: "Enterprise Outlook".to_string(),
		min_date: Utc.with_ymd_and_hms(2025, 4, 16, 2, 0, 0).unwrap(),
		max_date: Utc.with_ymd_and_hms(2025, 4, 17, 2, 0, 0).unwrap(),
		email: Some("dmarcreport@microsoft.com".to_string()),
		extra_contact_info: None,
		policy_adkim: Some("r".to_string()),
		policy_aspf: Some("r".to_string()),
		policy_p: Some("quarantine".to_string()),
		policy_sp: Some("none".to_string()),
		policy_pct: Some(100),
		raw_xml: ONE_RECORD.to_string(),
		records: vec![passing_record("127.0.0.1")],
	};

	assert_eq!(report, expected);
	assert_eq!(report.records[0].ipv4(), Some(2130706433));
	assert_eq!(report.records[0].ipv6(), None);
}

#[test]
fn report_with_multiple_records() {
	let report = dmarc::parse(MULTIPLE_RECORDS).unwrap();

	assert_eq!(report.report_id, "szn_example.com-2025-04-17");
	assert_eq!(report.org, "seznam.cz a.s.");
	assert_eq!(report.email.as_deref(), Some("abuse@seznam.cz"));
	assert_eq!(report.extra_contact_info, None);
	assert_eq!(report.min_date, Utc.with_ymd_and_hms(2025, 4, 17, 0, 0, 0).unwrap());
	assert_eq!(report.max_date, Utc.with_ymd_and_hms(2025, 4, 18, 0, 0, 0).unwrap());
	assert_eq!(report.policy_sp, None);
	assert_eq!(report.policy_pct, Some(100));

	assert_eq!(
		report.records,
		vec![
			passing_record("2a01:111:f403:c20c::1"),
			passing_record("2a01:111:f403:c20b::1"),
			passing_record("40.107.149.128"),
		]
	);

	let first = &report.records[0];
	assert_eq!(first.ipv4(), None);
	assert_eq!(
		first.ipv6(),
		Some([0x2a, 0x01, 0x01, 0x11, 0xf4, 0x03, 0xc2, 0x0c, 0, 0, 0, 0, 0, 0, 0, 0x01])
	);
	assert_eq!(report.records[2].ipv4(), Some(678139264));
	assert_eq!(report.records[2].ipv6(), None);
}

#[test]
fn parsing_is_deterministic() {
	assert_eq!(dmarc::parse(MULTIPLE_RECORDS).unwrap(), dmarc::parse(MULTIPLE_RECORDS).unwrap());
}

#[test]
fn zipped_fixture_extracts_and_parses() {
	let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
	writer.start_file("enterprise.protection.outlook.com!example.com!1744768800!1744855200.xml", FileOptions::default()).unwrap();
	writer.write_all(ONE_RECORD.as_bytes()).unwrap();
	let content = writer.finish().unwrap().into_inner();

	let attachment = Attachment { filename: "report.zip".to_string(), content };
	let xml = Extractor::new(1024 * 1024).extract(&attachment).unwrap();

	assert_eq!(xml, ONE_RECORD);
	assert_eq!(dmarc::parse(&xml).unwrap().records.len(), 1);
}

#[test]
fn uncompressed_xml_is_not_parsed() {
	let attachment = Attachment {
		filename: "report.xml".to_string(),
		content: ONE_RECORD.as_bytes().to_vec(),
	};

	match Extractor::new(1024 * 1024).extract(&attachment) {
		Err(ReportError::UnsupportedAttachment(reason)) => assert!(reason.contains("report.xml")),
		other => panic!("expected an unsupported attachment, got {:?}", other),
	}
}
