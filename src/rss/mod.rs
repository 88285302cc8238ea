//! Feed retrieval and normalization.
//!
//! [`Fetcher`] downloads a feed, cleans it up with [`preprocess_xml`] and
//! hands it to [`normalize`], which yields [`FeedItem`]s for RSS 2.0 and Atom
//! alike. Publication dates stay raw until [`parse_date`] is applied.

mod client;
pub mod date;
mod fetcher;
mod parser;
mod types;
mod util;

pub use self::client::{create_http_client, FeedAliases};
pub use self::date::{parse_date, DateParseError, DATE_LAYOUTS};
pub use self::fetcher::Fetcher;
pub use self::parser::normalize;
pub use self::types::*;
pub use self::util::{is_valid_url, preprocess_xml, ENTITY_REPLACEMENTS};
