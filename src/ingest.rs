use std::error::Error;
use std::fmt;

use log::{info, warn};

use crate::config::ImportConfig;
use crate::dmarc;
use crate::error::ReportError;
use crate::mailbox::{Mailbox, MessageId};
use crate::payload::{Attachment, Extractor};
use crate::store::{ReportStore, StoreOutcome};

/// Counts of what a run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
	pub messages: usize,
	pub stored: usize,
	pub duplicates: usize,
	pub unsupported: usize,
	pub invalid: usize,
}

impl fmt::Display for Summary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} messages, {} reports stored, {} duplicates skipped, {} unsupported and {} invalid attachments skipped",
			self.messages, self.stored, self.duplicates, self.unsupported, self.invalid
		)
	}
}

/// Moves reports from a mailbox folder into a store.
pub struct Importer {
	extractor: Extractor,
	read_folder: String,
	move_folder: String,
	dry_run: bool,
}

impl Importer {
	pub fn new(config: &ImportConfig, dry_run: bool) -> Importer {
		Importer {
			extractor: Extractor::new(config.max_report_size),
			read_folder: config.read_folder.to_string(),
			move_folder: config.move_folder.to_string(),
			dry_run,
		}
	}

	/// Processes every message in the read folder once.
	///
	/// Only mailbox and store failures end the run early; bad attachments and
	/// duplicates are counted and the message is moved on regardless.
	pub fn run(&self, mailbox: &mut dyn Mailbox, store: &mut dyn ReportStore) -> Result<Summary, Box<dyn Error>> {
		// a fixed list, so moving messages out of the folder can't shift what comes next
		let message_ids = mailbox.list_messages(&self.read_folder)?;
		info!("Found {} messages in {}", message_ids.len(), self.read_folder);

		let mut summary = Summary::default();
		for (i, id) in message_ids.iter().enumerate() {
			info!("Processing message {} of {}: UID {}", i + 1, message_ids.len(), id);
			self.process_message(mailbox, store, *id, &mut summary)?;
			summary.messages += 1;
		}

		Ok(summary)
	}

	fn process_message(
		&self,
		mailbox: &mut dyn Mailbox,
		store: &mut dyn ReportStore,
		id: MessageId,
		summary: &mut Summary,
	) -> Result<(), Box<dyn Error>> {
		let attachments = mailbox.fetch_attachments(id)?;
		if attachments.is_empty() {
			warn!("Message UID {} has no attachments", id);
		}

		for attachment in &attachments {
			match self.import_attachment(store, attachment)? {
				Ok(()) => summary.stored += 1,
				Err(ReportError::UnsupportedAttachment(reason)) => {
					warn!("Skipping attachment '{}' of UID {}: {}", attachment.filename, id, reason);
					summary.unsupported += 1;
				},
				Err(ReportError::InvalidReportData(reason)) => {
					warn!("Skipping attachment '{}' of UID {}: {}", attachment.filename, id, reason);
					summary.invalid += 1;
				},
				Err(duplicate @ ReportError::DuplicateReport { .. }) => {
					// the rest of this message was imported along with the first copy
					info!("{}. Skipping.", duplicate);
					summary.duplicates += 1;
					break;
				},
			}
		}

		if !self.dry_run {
			mailbox.move_message(id, &self.move_folder)?;
		}
		Ok(())
	}

	/// The outer error aborts the run, the inner one only this attachment.
	fn import_attachment(
		&self,
		store: &mut dyn ReportStore,
		attachment: &Attachment,
	) -> Result<Result<(), ReportError>, Box<dyn Error>> {
		let report = match self.extractor.extract(attachment).and_then(|xml| dmarc::parse(&xml)) {
			Ok(report) => report,
			Err(e) => return Ok(Err(e)),
		};

		let duplicate = || ReportError::DuplicateReport {
			domain: report.domain.clone(),
			report_id: report.report_id.clone(),
		};

		if store.exists(&report.domain, &report.report_id)? {
			return Ok(Err(duplicate()));
		}

		if self.dry_run {
			info!(
				"Would store report {} for {} from {} ({} records)",
				report.report_id,
				report.domain,
				report.org,
				report.records.len()
			);
			return Ok(Ok(()));
		}

		match store.store(&report)? {
			StoreOutcome::Stored => {
				info!(
					"Stored report {} for {} from {} ({} records)",
					report.report_id,
					report.domain,
					report.org,
					report.records.len()
				);
				Ok(Ok(()))
			},
			StoreOutcome::Duplicate => Ok(Err(duplicate())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::DEFAULT;
	use crate::dmarc::Report;
	use flate2::write::GzEncoder;
	use flate2::Compression;
	use simple_error::SimpleError;
	use std::collections::BTreeMap;
	use std::io::Write;

	#[derive(Default)]
	struct FakeMailbox {
		messages: BTreeMap<MessageId, Vec<Attachment>>,
		moved: Vec<(MessageId, String)>,
		fetched: Vec<MessageId>,
	}

	impl Mailbox for FakeMailbox {
		fn list_messages(&mut self, _folder: &str) -> Result<Vec<MessageId>, Box<dyn Error>> {
			Ok(self.messages.keys().copied().collect())
		}

		fn fetch_attachments(&mut self, id: MessageId) -> Result<Vec<Attachment>, Box<dyn Error>> {
			self.fetched.push(id);
			// moved messages are gone from the folder
			self.messages.remove(&id).ok_or_else(|| SimpleError::new("no such message").into())
		}

		fn move_message(&mut self, id: MessageId, folder: &str) -> Result<(), Box<dyn Error>> {
			self.moved.push((id, folder.to_string()));
			Ok(())
		}

		fn folder_exists(&mut self, _folder: &str) -> Result<bool, Box<dyn Error>> {
			Ok(true)
		}

		fn logout(&mut self) -> Result<(), Box<dyn Error>> {
			Ok(())
		}
	}

	/// Keeps reports in memory and enforces uniqueness the way the database does.
	#[derive(Default)]
	struct MemoryStore {
		reports: Vec<Report>,
		skip_exists_check: bool,
	}

	impl ReportStore for MemoryStore {
		fn exists(&mut self, domain: &str, report_id: &str) -> Result<bool, Box<dyn Error>> {
			if self.skip_exists_check {
				return Ok(false);
			}
			Ok(self.reports.iter().any(|r| r.domain == domain && r.report_id == report_id))
		}

		fn store(&mut self, report: &Report) -> Result<StoreOutcome, Box<dyn Error>> {
			if self.reports.iter().any(|r| r.domain == report.domain && r.report_id == report.report_id) {
				return Ok(StoreOutcome::Duplicate);
			}
			self.reports.push(report.clone());
			Ok(StoreOutcome::Stored)
		}
	}

	fn report_xml(report_id: &str) -> String {
		format!(
			"<?xml version=\"1.0\"?>
			<feedback>
				<report_metadata>
					<org_name>Example Org</org_name>
					<report_id>{}</report_id>
					<date_range><begin>1744768800</begin><end>1744855200</end></date_range>
				</report_metadata>
				<policy_published><domain>example.com</domain><p>none</p></policy_published>
				<record>
					<row>
						<source_ip>192.0.2.1</source_ip>
						<count>1</count>
						<policy_evaluated><disposition>none</disposition><dkim>pass</dkim><spf>pass</spf></policy_evaluated>
					</row>
					<identifiers><header_from>example.com</header_from></identifiers>
				</record>
			</feedback>",
			report_id
		)
	}

	fn gzipped(name: &str, xml: &str) -> Attachment {
		let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
		encoder.write_all(xml.as_bytes()).unwrap();
		Attachment { filename: name.to_string(), content: encoder.finish().unwrap() }
	}

	fn plain(name: &str) -> Attachment {
		Attachment { filename: name.to_string(), content: b"Hello, this is your report.".to_vec() }
	}

	fn importer(dry_run: bool) -> Importer {
		Importer::new(&DEFAULT.import, dry_run)
	}

	#[test]
	fn stores_reports_and_moves_every_message() {
		let mut mailbox = FakeMailbox::default();
		mailbox.messages.insert(3, vec![plain("readme.txt"), gzipped("a.xml.gz", &report_xml("a"))]);
		mailbox.messages.insert(1, vec![gzipped("b.xml.gz", &report_xml("b"))]);
		mailbox.messages.insert(2, vec![]);
		let mut store = MemoryStore::default();

		let summary = importer(false).run(&mut mailbox, &mut store).unwrap();

		assert_eq!(summary, Summary { messages: 3, stored: 2, duplicates: 0, unsupported: 1, invalid: 0 });
		assert_eq!(mailbox.fetched, vec![1, 2, 3]);
		assert_eq!(
			mailbox.moved,
			vec![(1, "INBOX.processed".to_string()), (2, "INBOX.processed".to_string()), (3, "INBOX.processed".to_string())]
		);
		let ids: Vec<&str> = store.reports.iter().map(|r| r.report_id.as_str()).collect();
		assert_eq!(ids, vec!["b", "a"]);
	}

	#[test]
	fn invalid_attachment_does_not_stop_the_message() {
		let mut mailbox = FakeMailbox::default();
		mailbox.messages.insert(1, vec![
			gzipped("broken.xml.gz", "<feedback><report_metadata>"),
			gzipped("good.xml.gz", &report_xml("good")),
		]);
		let mut store = MemoryStore::default();

		let summary = importer(false).run(&mut mailbox, &mut store).unwrap();

		assert_eq!(summary.invalid, 1);
		assert_eq!(summary.stored, 1);
		assert_eq!(mailbox.moved.len(), 1);
	}

	#[test]
	fn duplicate_stops_the_message_but_not_the_run() {
		let mut mailbox = FakeMailbox::default();
		mailbox.messages.insert(1, vec![gzipped("a.xml.gz", &report_xml("a"))]);
		mailbox.messages.insert(2, vec![gzipped("a.xml.gz", &report_xml("a")), gzipped("c.xml.gz", &report_xml("c"))]);
		mailbox.messages.insert(3, vec![gzipped("d.xml.gz", &report_xml("d"))]);
		let mut store = MemoryStore::default();

		let summary = importer(false).run(&mut mailbox, &mut store).unwrap();

		assert_eq!(summary, Summary { messages: 3, stored: 2, duplicates: 1, unsupported: 0, invalid: 0 });
		assert_eq!(store.reports.len(), 2);
		assert!(!store.reports.iter().any(|r| r.report_id == "c"));
		assert_eq!(mailbox.moved.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![1, 2, 3]);
	}

	#[test]
	fn storage_constraint_catches_what_the_check_missed() {
		let mut mailbox = FakeMailbox::default();
		mailbox.messages.insert(1, vec![gzipped("a.xml.gz", &report_xml("a")), gzipped("a2.xml.gz", &report_xml("a"))]);
		let mut store = MemoryStore { skip_exists_check: true, ..MemoryStore::default() };

		let summary = importer(false).run(&mut mailbox, &mut store).unwrap();

		assert_eq!(summary.stored, 1);
		assert_eq!(summary.duplicates, 1);
		assert_eq!(store.reports.len(), 1);
	}

	#[test]
	fn dry_run_neither_stores_nor_moves() {
		let mut mailbox = FakeMailbox::default();
		mailbox.messages.insert(1, vec![gzipped("a.xml.gz", &report_xml("a"))]);
		let mut store = MemoryStore::default();

		let summary = importer(true).run(&mut mailbox, &mut store).unwrap();

		assert_eq!(summary.stored, 1);
		assert!(store.reports.is_empty());
		assert!(mailbox.moved.is_empty());
	}

	#[test]
	fn mailbox_failure_aborts_the_run() {
		struct Unreachable;

		impl Mailbox for Unreachable {
			fn list_messages(&mut self, _folder: &str) -> Result<Vec<MessageId>, Box<dyn Error>> {
				Err(SimpleError::new("connection reset").into())
			}
			fn fetch_attachments(&mut self, _id: MessageId) -> Result<Vec<Attachment>, Box<dyn Error>> {
				unreachable!()
			}
			fn move_message(&mut self, _id: MessageId, _folder: &str) -> Result<(), Box<dyn Error>> {
				unreachable!()
			}
			fn folder_exists(&mut self, _folder: &str) -> Result<bool, Box<dyn Error>> {
				Ok(false)
			}
			fn logout(&mut self) -> Result<(), Box<dyn Error>> {
				Ok(())
			}
		}

		let result = importer(false).run(&mut Unreachable, &mut MemoryStore::default());
		assert_eq!(result.unwrap_err().to_string(), "connection reset");
	}

	#[test]
	fn summary_reads_well() {
		let summary = Summary { messages: 4, stored: 2, duplicates: 1, unsupported: 1, invalid: 0 };
		assert_eq!(
			summary.to_string(),
			"4 messages, 2 reports stored, 1 duplicates skipped, 1 unsupported and 0 invalid attachments skipped"
		);
	}
}
