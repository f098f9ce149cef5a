pub mod catalog;
pub mod db;
pub mod fetcher;
pub mod indexer;
pub mod normalize;
pub mod parser_australia;
pub mod parser_canada;
pub mod parser_eu;
pub mod parser_ofac;
pub mod parser_switzerland;
pub mod parser_uk;
pub mod parser_un;

pub use catalog::{Catalog, CatalogHandle, RefreshError};
pub use db::{fingerprint, get_meta, init_schema, load_all, open_db, replace_all, set_meta};
pub use fetcher::fetch_all_sources;
pub use indexer::{query_tokens, scan_candidates, SearchIndex};
pub use normalize::normalize;
pub use parser_australia::parse_australia_xlsx;
pub use parser_canada::parse_canada_xml;
pub use parser_eu::parse_eu_xml;
pub use parser_ofac::parse_ofac_xml;
pub use parser_switzerland::parse_switzerland_xml;
pub use parser_uk::parse_uk_xml;
pub use parser_un::parse_un_xml;
