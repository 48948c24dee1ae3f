//! Validated aggregate report, as handed to storage.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::UnknownValue;

macro_rules! report_enum {
	($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
		pub enum $name {
			$($variant),+
		}

		impl $name {
			/// Lower-case form used in reports and in the database.
			pub fn as_str(&self) -> &'static str {
				match self {
					$($name::$variant => $text),+
				}
			}
		}

		impl FromStr for $name {
			type Err = UnknownValue;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				let value = s.trim();
				$(
					if value.eq_ignore_ascii_case($text) {
						return Ok($name::$variant);
					}
				)+
				Err(UnknownValue { field: $field, value: value.to_string() })
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(self.as_str())
			}
		}
	};
}

report_enum!(
	/// Policy action the receiver applied.
	Disposition, "disposition" {
		None => "none",
		Quarantine => "quarantine",
		Reject => "reject",
	}
);

report_enum!(
	/// Outcome of a single DKIM signature check.
	DkimResult, "dkim result" {
		None => "none",
		Pass => "pass",
		Fail => "fail",
		Neutral => "neutral",
		Policy => "policy",
		TempError => "temperror",
		PermError => "permerror",
	}
);

report_enum!(
	/// Outcome of an SPF check.
	SpfResult, "spf result" {
		None => "none",
		Pass => "pass",
		Fail => "fail",
		SoftFail => "softfail",
		Neutral => "neutral",
		Policy => "policy",
		TempError => "temperror",
		PermError => "permerror",
		Unknown => "unknown",
	}
);

report_enum!(
	/// DMARC alignment verdict for SPF or DKIM.
	Alignment, "alignment" {
		Fail => "fail",
		Pass => "pass",
		Unknown => "unknown",
	}
);

/// Non-empty list of verdicts taken from the `auth_results` entries of a record.
///
/// Displays `/`-joined, which is also how it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdicts<T>(Vec<T>);

impl<T> Verdicts<T>
where
	T: FromStr<Err = UnknownValue>,
{
	/// Parses a `/`-joined list. Empty text means there were no entries.
	pub fn parse_joined(text: &str) -> Result<Option<Self>, UnknownValue> {
		if text.is_empty() {
			return Ok(None);
		}

		let values = text.split('/').map(str::parse).collect::<Result<Vec<T>, _>>()?;
		Ok(Some(Verdicts(values)))
	}
}

impl<T> Verdicts<T> {
	pub fn single(value: T) -> Self {
		Verdicts(vec![value])
	}

	pub fn as_slice(&self) -> &[T] {
		&self.0
	}
}

impl<T: fmt::Display> fmt::Display for Verdicts<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, value) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str("/")?;
			}
			write!(f, "{}", value)?;
		}
		Ok(())
	}
}

/// One `<record>` of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
	pub source_ip: IpAddr,
	pub row_count: u32,
	pub disposition: Option<Disposition>,
	pub reason: Option<String>,
	pub dkim_domain: Option<String>,
	pub dkim_result: Option<Verdicts<DkimResult>>,
	pub spf_domain: Option<String>,
	pub spf_result: Option<Verdicts<SpfResult>>,
	pub spf_align: Alignment,
	pub dkim_align: Alignment,
	pub identifier_header_from: Option<String>,
}

impl Record {
	/// Source address as an unsigned integer in network byte order, if it is IPv4.
	pub fn ipv4(&self) -> Option<u32> {
		match self.source_ip {
			IpAddr::V4(addr) => Some(u32::from(addr)),
			IpAddr::V6(_) => None,
		}
	}

	/// Raw address bytes, if the source is IPv6.
	pub fn ipv6(&self) -> Option<[u8; 16]> {
		match self.source_ip {
			IpAddr::V4(_) => None,
			IpAddr::V6(addr) => Some(addr.octets()),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
	pub report_id: String,
	pub domain: String,
	pub org: String,
	pub min_date: DateTime<Utc>,
	pub max_date: DateTime<Utc>,
	pub email: Option<String>,
	pub extra_contact_info: Option<String>,
	pub policy_adkim: Option<String>,
	pub policy_aspf: Option<String>,
	pub policy_p: Option<String>,
	pub policy_sp: Option<String>,
	pub policy_pct: Option<u8>,
	pub raw_xml: String,
	pub records: Vec<Record>,
}
