//! Turning raw playlist text into channel records

pub mod category;
pub mod m3u_parser;
pub mod name_cleaner;

pub use category::CategoryNormalizer;
pub use m3u_parser::{ParserState, PlaylistParser, extract_header_line};
pub use name_cleaner::NameCleaner;
