use std::error::Error;
use std::io::{Read, Write};
use std::net::TcpStream;

use imap;
use imap_proto::types::SectionPath;
use log::{debug, info, warn};
use native_tls::TlsConnector;
use simple_error::SimpleError;

use crate::config::IMAPConfig;
use crate::message::{self, SubjectReportId};
use crate::payload::Attachment;

/// IMAP UID of a message.
pub type MessageId = u32;

/// The mailbox operations the importer needs.
pub trait Mailbox {
	/// UIDs of all messages in `folder`, oldest first. Selects the folder.
	fn list_messages(&mut self, folder: &str) -> Result<Vec<MessageId>, Box<dyn Error>>;

	/// Attachments of a message in the selected folder.
	fn fetch_attachments(&mut self, id: MessageId) -> Result<Vec<Attachment>, Box<dyn Error>>;

	fn move_message(&mut self, id: MessageId, folder: &str) -> Result<(), Box<dyn Error>>;

	fn folder_exists(&mut self, folder: &str) -> Result<bool, Box<dyn Error>>;

	fn logout(&mut self) -> Result<(), Box<dyn Error>>;
}

pub struct ImapMailbox<T: Read + Write> {
	session: imap::Session<T>,
	can_move: bool,
	subject_report_id: SubjectReportId,
}

/// Connects and logs in, with or without TLS depending on the config.
pub fn connect(config: &IMAPConfig) -> Result<Box<dyn Mailbox>, Box<dyn Error>> {
	info!("Connecting to IMAP server {}:{}", config.host, config.port);

	if config.tls {
		let tls = TlsConnector::builder().build()?;
		let client = imap::connect((config.host, config.port), config.host, &tls)?;
		let session = client.login(config.username, config.password).map_err(|e| e.0)?;
		Ok(Box::new(ImapMailbox::new(session)?))
	} else {
		let stream = TcpStream::connect((config.host, config.port))?;
		let mut client = imap::Client::new(stream);
		client.read_greeting()?;
		let session = client.login(config.username, config.password).map_err(|e| e.0)?;
		Ok(Box::new(ImapMailbox::new(session)?))
	}
}

impl<T: Read + Write> ImapMailbox<T> {
	pub fn new(mut session: imap::Session<T>) -> Result<ImapMailbox<T>, Box<dyn Error>> {
		let can_move = session.capabilities()?.has_str("MOVE");
		debug!("IMAP server supports MOVE: {}", can_move);

		Ok(ImapMailbox {
			session,
			can_move,
			subject_report_id: SubjectReportId::new(),
		})
	}
}

impl<T: Read + Write> Mailbox for ImapMailbox<T> {
	fn list_messages(&mut self, folder: &str) -> Result<Vec<MessageId>, Box<dyn Error>> {
		self.session.select(folder)?;

		let mut uids: Vec<MessageId> = self.session.uid_search("ALL")?.into_iter().collect();
		uids.sort_unstable();
		Ok(uids)
	}

	fn fetch_attachments(&mut self, id: MessageId) -> Result<Vec<Attachment>, Box<dyn Error>> {
		let fetch_results = self.session.uid_fetch(id.to_string(), "(ENVELOPE BODYSTRUCTURE)")?;
		let fetch_result = fetch_results
			.iter()
			.find(|f| f.bodystructure().is_some())
			.ok_or_else(|| SimpleError::new(format!("no body structure for message UID {}", id)))?;

		if let Some(envelope) = fetch_result.envelope() {
			let subject_text = envelope
				.subject
				.as_ref()
				.map(|s| String::from_utf8_lossy(s).into_owned())
				.unwrap_or_default();
			match self.subject_report_id.find(&subject_text) {
				Some(report_id) => info!("Message UID {}: {} (Report-ID {})", id, subject_text, report_id),
				None => info!("Message UID {}: {}", id, subject_text),
			}
		}

		let parts = match fetch_result.bodystructure() {
			Some(bodystructure) => message::find_attachments(bodystructure),
			None => Vec::new(),
		};

		let mut attachments = Vec::with_capacity(parts.len());
		for part in parts {
			let section = format!("BODY.PEEK[{}]", part.section_name());
			let part_results = self.session.uid_fetch(id.to_string(), section)?;
			let body_data = part_results
				.iter()
				.find_map(|f| f.section(&SectionPath::Part(part.section.clone(), None)));

			let body_data = match body_data {
				Some(data) => data,
				None => {
					warn!("Message UID {} has no data for part {}", id, part.section_name());
					continue;
				},
			};

			match message::decode_part(part.encoding, body_data) {
				Ok(content) => attachments.push(Attachment {
					filename: part.filename,
					content,
				}),
				Err(e) => {
					// treat it as opaque bytes, the extractor will reject it
					warn!("Couldn't decode base64 in message UID {} part {}: {}", id, part.section_name(), e);
					attachments.push(Attachment {
						filename: part.filename,
						content: body_data.to_vec(),
					});
				},
			}
		}

		Ok(attachments)
	}

	fn move_message(&mut self, id: MessageId, folder: &str) -> Result<(), Box<dyn Error>> {
		debug!("Moving message UID {} to {}", id, folder);

		if self.can_move {
			self.session.uid_mv(id.to_string(), folder)?;
		} else {
			self.session.uid_copy(id.to_string(), folder)?;
			self.session.uid_store(id.to_string(), "+FLAGS (\\Deleted)")?;
			self.session.expunge()?;
		}
		Ok(())
	}

	fn folder_exists(&mut self, folder: &str) -> Result<bool, Box<dyn Error>> {
		match self.session.examine(folder) {
			Ok(_) => Ok(true),
			Err(imap::error::Error::No(_)) => Ok(false),
			Err(e) => Err(e.into()),
		}
	}

	fn logout(&mut self) -> Result<(), Box<dyn Error>> {
		self.session.logout()?;
		Ok(())
	}
}
