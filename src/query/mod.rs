pub mod executor;
pub mod glob;
pub mod matcher;

pub use executor::{count, search, QueryExecutor, SearchOptions};
pub use glob::GlobPattern;
pub use matcher::{MatchOptions, PathMatcher};
