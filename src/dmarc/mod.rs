mod parser;
pub mod report;
pub mod types;

pub use parser::parse;
pub use report::{Alignment, Disposition, DkimResult, Record, Report, SpfResult, Verdicts};
