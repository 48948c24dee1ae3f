use std::error::Error;

use log::debug;
use mysql::prelude::*;
use mysql::{params, OptsBuilder, Pool, TxOpts};
use simple_error::SimpleError;

use crate::config::DatabaseConfig;
use crate::dmarc::Report;

/// MySQL error number for a duplicate key.
const ER_DUP_ENTRY: u16 = 1062;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CREATE_REPORT_TABLE: &str = "CREATE TABLE IF NOT EXISTS report (
	serial INT UNSIGNED NOT NULL AUTO_INCREMENT,
	mindate DATETIME NOT NULL,
	maxdate DATETIME NULL,
	domain VARCHAR(255) NOT NULL,
	org VARCHAR(255) NOT NULL,
	reportid VARCHAR(255) NOT NULL,
	email VARCHAR(255) NULL,
	extra_contact_info VARCHAR(255) NULL,
	policy_adkim VARCHAR(20) NULL,
	policy_aspf VARCHAR(20) NULL,
	policy_p VARCHAR(20) NULL,
	policy_sp VARCHAR(20) NULL,
	policy_pct SMALLINT UNSIGNED NULL,
	raw_xml MEDIUMTEXT NULL,
	PRIMARY KEY (serial),
	UNIQUE KEY domain (domain, reportid)
) DEFAULT CHARSET=utf8mb4";

const CREATE_RECORD_TABLE: &str = "CREATE TABLE IF NOT EXISTS rptrecord (
	id INT UNSIGNED NOT NULL AUTO_INCREMENT,
	serial INT UNSIGNED NOT NULL,
	ip INT UNSIGNED NULL,
	ip6 BINARY(16) NULL,
	rcount INT UNSIGNED NOT NULL,
	disposition VARCHAR(10) NULL,
	reason VARCHAR(255) NULL,
	dkimdomain VARCHAR(255) NULL,
	dkimresult VARCHAR(255) NULL,
	spfdomain VARCHAR(255) NULL,
	spfresult VARCHAR(255) NULL,
	spf_align VARCHAR(10) NOT NULL,
	dkim_align VARCHAR(10) NOT NULL,
	identifier_hfrom VARCHAR(255) NULL,
	PRIMARY KEY (id),
	KEY serial (serial, ip),
	KEY serial6 (serial, ip6),
	CONSTRAINT rptrecord_report FOREIGN KEY (serial) REFERENCES report (serial) ON DELETE CASCADE
) DEFAULT CHARSET=utf8mb4";

const INSERT_REPORT: &str = "INSERT INTO report
	(mindate, maxdate, domain, org, reportid, email, extra_contact_info,
	policy_adkim, policy_aspf, policy_p, policy_sp, policy_pct, raw_xml)
	VALUES (:mindate, :maxdate, :domain, :org, :reportid, :email, :extra_contact_info,
	:policy_adkim, :policy_aspf, :policy_p, :policy_sp, :policy_pct, :raw_xml)";

const INSERT_RECORD: &str = "INSERT INTO rptrecord
	(serial, ip, ip6, rcount, disposition, reason, dkimdomain, dkimresult,
	spfdomain, spfresult, spf_align, dkim_align, identifier_hfrom)
	VALUES (:serial, :ip, :ip6, :rcount, :disposition, :reason, :dkimdomain, :dkimresult,
	:spfdomain, :spfresult, :spf_align, :dkim_align, :identifier_hfrom)";

/// What happened to a report handed to [`ReportStore::store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
	Stored,
	/// The storage's uniqueness constraint already holds this (domain, report ID).
	Duplicate,
}

/// Where reports end up.
///
/// `exists` is only a fast path; `store` must itself refuse a second copy of
/// the same (domain, report ID) and say so with [`StoreOutcome::Duplicate`].
pub trait ReportStore {
	fn exists(&mut self, domain: &str, report_id: &str) -> Result<bool, Box<dyn Error>>;

	/// Stores the report together with all of its records, or nothing.
	fn store(&mut self, report: &Report) -> Result<StoreOutcome, Box<dyn Error>>;
}

pub struct MysqlStore {
	pool: Pool,
}

impl MysqlStore {
	pub fn connect(config: &DatabaseConfig) -> Result<MysqlStore, Box<dyn Error>> {
		let opts = OptsBuilder::new()
			.ip_or_hostname(Some(config.host))
			.user(Some(config.username))
			.pass(Some(config.password))
			.db_name(Some(config.database));

		Ok(MysqlStore { pool: Pool::new(opts)? })
	}

	/// Creates the report tables if they are missing.
	pub fn create_schema(&self) -> Result<(), Box<dyn Error>> {
		let mut db_conn = self.pool.get_conn()?;
		db_conn.query_drop(CREATE_REPORT_TABLE)?;
		db_conn.query_drop(CREATE_RECORD_TABLE)?;
		Ok(())
	}

	pub fn ping(&self) -> Result<(), Box<dyn Error>> {
		let mut db_conn = self.pool.get_conn()?;
		db_conn.query_drop("SELECT 1")?;
		Ok(())
	}
}

impl ReportStore for MysqlStore {
	fn exists(&mut self, domain: &str, report_id: &str) -> Result<bool, Box<dyn Error>> {
		let mut db_conn = self.pool.get_conn()?;
		let found: Option<u32> = db_conn.exec_first(
			"SELECT serial FROM report WHERE domain = :domain AND reportid = :reportid LIMIT 1",
			params! { "domain" => domain, "reportid" => report_id },
		)?;
		Ok(found.is_some())
	}

	fn store(&mut self, report: &Report) -> Result<StoreOutcome, Box<dyn Error>> {
		let mut db_conn = self.pool.get_conn()?;
		let mut tx = db_conn.start_transaction(TxOpts::default())?;

		let inserted = tx.exec_drop(INSERT_REPORT, params! {
			"mindate" => report.min_date.format(DATE_FORMAT).to_string(),
			"maxdate" => report.max_date.format(DATE_FORMAT).to_string(),
			"domain" => report.domain.as_str(),
			"org" => report.org.as_str(),
			"reportid" => report.report_id.as_str(),
			"email" => report.email.as_deref(),
			"extra_contact_info" => report.extra_contact_info.as_deref(),
			"policy_adkim" => report.policy_adkim.as_deref(),
			"policy_aspf" => report.policy_aspf.as_deref(),
			"policy_p" => report.policy_p.as_deref(),
			"policy_sp" => report.policy_sp.as_deref(),
			"policy_pct" => report.policy_pct,
			"raw_xml" => report.raw_xml.as_str(),
		});
		match inserted {
			Err(ref e) if is_duplicate_key(e) => return Ok(StoreOutcome::Duplicate),
			other => other?,
		}

		let serial = tx
			.last_insert_id()
			.ok_or_else(|| SimpleError::new("no serial returned for inserted report"))?;

		for record in &report.records {
			tx.exec_drop(INSERT_RECORD, params! {
				"serial" => serial,
				"ip" => record.ipv4(),
				"ip6" => record.ipv6().map(|b| b.to_vec()),
				"rcount" => record.row_count,
				"disposition" => record.disposition.map(|d| d.as_str()),
				"reason" => record.reason.as_deref(),
				"dkimdomain" => record.dkim_domain.as_deref(),
				"dkimresult" => record.dkim_result.as_ref().map(|v| v.to_string()),
				"spfdomain" => record.spf_domain.as_deref(),
				"spfresult" => record.spf_result.as_ref().map(|v| v.to_string()),
				"spf_align" => record.spf_align.as_str(),
				"dkim_align" => record.dkim_align.as_str(),
				"identifier_hfrom" => record.identifier_header_from.as_deref(),
			})?;
		}

		tx.commit()?;
		debug!("Stored report {} for {} as serial {}", report.report_id, report.domain, serial);
		Ok(StoreOutcome::Stored)
	}
}

fn is_duplicate_key(err: &mysql::Error) -> bool {
	match err {
		mysql::Error::MySqlError(e) => e.code == ER_DUP_ENTRY,
		_ => false,
	}
}
