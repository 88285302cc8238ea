pub mod db;
pub mod environment;
pub mod logging;
pub mod rss;
pub mod workers;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_SCRAPER: &str = "scraper";
