pub mod config;
pub mod error;
pub mod parser;
pub mod record;
pub mod timeparse;

pub use config::LoglensConfig;
pub use error::LoglensError;
pub use parser::{ParseError, parse_line, parse_line_at};
pub use record::{NewRecord, RecordId, RequestRecord, SlimRecord, UNKNOWN};
pub use timeparse::parse_timestamp;
