//! Connectivity check for the database and the IMAP folders.

use log::error;

use crate::config::Config;
use crate::mailbox::{self, Mailbox};
use crate::store::MysqlStore;

/// Runs every check and prints the outcome. Returns whether all passed.
pub fn run(config: &Config) -> bool {
	let database = check_database(config);
	let imap = check_imap(config);

	if database && imap {
		println!("\nConfiguration is valid.");
	} else {
		println!("\nSome problems have been found.");
	}
	database && imap
}

fn check_database(config: &Config) -> bool {
	println!("Check database connection");

	let result = MysqlStore::connect(&config.database).and_then(|store| store.ping());
	match result {
		Ok(()) => {
			println!("✅ OK");
			true
		},
		Err(e) => {
			error!("Database check failed: {}", e);
			println!("❌ Error: {}", e);
			false
		},
	}
}

fn check_imap(config: &Config) -> bool {
	println!("Check IMAP connection");

	let mut mailbox = match mailbox::connect(&config.imap) {
		Ok(mailbox) => mailbox,
		Err(e) => {
			error!("IMAP check failed: {}", e);
			println!("❌ Error while connecting: {}", e);
			return false;
		},
	};

	let valid = check_folders(mailbox.as_mut(), &[config.import.read_folder, config.import.move_folder]);
	if let Err(e) = mailbox.logout() {
		error!("IMAP logout failed: {}", e);
	}
	if valid {
		println!("✅ OK");
	}
	valid
}

/// Every folder has to exist for an import to work.
pub fn check_folders(mailbox: &mut dyn Mailbox, folders: &[&str]) -> bool {
	for folder in folders {
		match mailbox.folder_exists(folder) {
			Ok(true) => {},
			Ok(false) => {
				println!("❌ Error opening IMAP folder: {}", folder);
				return false;
			},
			Err(e) => {
				error!("Could not open IMAP folder {}: {}", folder, e);
				println!("❌ Error opening IMAP folder {}: {}", folder, e);
				return false;
			},
		}
	}
	true
}
