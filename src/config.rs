use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize)]
pub struct Config<'a> {
	#[serde(borrow)]
	pub database: DatabaseConfig<'a>,

	#[serde(borrow)]
	pub imap: IMAPConfig<'a>,

	#[serde(borrow, default)]
	pub import: ImportConfig<'a>
}

#[derive(Deserialize, Serialize)]
pub struct DatabaseConfig<'a> {
	pub host: &'a str,
	pub username: &'a str,
	pub password: &'a str,
	pub database: &'a str
}

#[derive(Deserialize, Serialize)]
pub struct IMAPConfig<'a> {
	pub host: &'a str,
	pub port: u16,
	pub tls: bool,
	pub username: &'a str,
	pub password: &'a str
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportConfig<'a> {
	/// Folder the reports arrive in.
	pub read_folder: &'a str,
	/// Folder every processed message is moved to.
	pub move_folder: &'a str,
	/// Upper bound for a decompressed report, in bytes.
	pub max_report_size: u64
}

impl<'a> Default for ImportConfig<'a> {
	fn default() -> Self {
		DEFAULT.import
	}
}

pub const DEFAULT: Config = Config{
	database: DatabaseConfig{
		host: "localhost",
		username: "username",
		password: "password123",
		database: "herald"
	},
	imap: IMAPConfig{
		host: "localhost",
		port: 993,
		tls: true,
		username: "reports@dmarc.some-cool-address.invalid",
		password: "password123"
	},
	import: ImportConfig{
		read_folder: "INBOX",
		move_folder: "INBOX.processed",
		max_report_size: 32 * 1024 * 1024
	}
};
