use std::error::Error;
use std::fs;
use std::path::Path;
use std::process;

use clap::{Arg, ArgAction, ArgMatches, Command};
use env_logger::Env;
use log::{error, info, LevelFilter};
use simple_error::bail;
use toml;

use herald_dmarc::config;
use herald_dmarc::ingest::Importer;
use herald_dmarc::mailbox;
use herald_dmarc::store::MysqlStore;
use herald_dmarc::check;

fn main() {
	let matches = Command::new("herald-dmarc")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Imports DMARC aggregate reports from IMAP into MySQL")
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.help("Configuration file path, created with defaults if missing")
				.default_value("config.toml")
				.global(true),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.help("Enable debug logging")
				.action(ArgAction::SetTrue)
				.global(true),
		)
		.subcommand(
			Command::new("import")
				.about("Import reports from IMAP")
				.arg(
					Arg::new("dry-run")
						.long("dry-run")
						.help("Parse and check reports without storing or moving anything")
						.action(ArgAction::SetTrue),
				),
		)
		.subcommand(Command::new("check").about("Check that the database and IMAP folders can be reached"))
		.subcommand_required(true)
		.get_matches();

	logger(matches.get_flag("verbose")).init();

	if let Err(e) = run(&matches) {
		error!("{}", e);
		process::exit(1);
	}
}

/// `RUST_LOG` decides the level, `info` when unset; `--verbose` overrides it with `debug`.
fn logger(verbose: bool) -> env_logger::Builder {
	let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
	if verbose {
		builder.filter_level(LevelFilter::Debug);
	}
	builder
}

fn run(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	/*
	 * config parsing
	 */
	let config_path = Path::new(matches.get_one::<String>("config").map(String::as_str).unwrap_or("config.toml"));
	if !config_path.exists() {
		info!("Could not find config, creating default...");
		fs::write(config_path, toml::to_string(&config::DEFAULT)?)?;
	}

	let config_text = fs::read_to_string(config_path)?;
	let config: config::Config = toml::from_str(&config_text)?;

	match matches.subcommand() {
		Some(("import", sub_matches)) => import(&config, sub_matches.get_flag("dry-run")),
		Some(("check", _)) => {
			check::run(&config);
			Ok(())
		},
		_ => bail!("no command given"),
	}
}

fn import(config: &config::Config, dry_run: bool) -> Result<(), Box<dyn Error>> {
	/*
	 * database connection
	 */
	let mut store = MysqlStore::connect(&config.database)?;
	store.create_schema()?;

	/*
	 * imap connection
	 */
	let mut dmarc_mailbox = mailbox::connect(&config.imap)?;

	let importer = Importer::new(&config.import, dry_run);
	let result = importer.run(dmarc_mailbox.as_mut(), &mut store);

	if let Err(e) = dmarc_mailbox.logout() {
		error!("IMAP logout failed: {}", e);
	}

	let summary = result?;
	info!("Import finished: {}", summary);
	println!("{}", summary);
	Ok(())
}
