use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid {field} pattern {pattern:?}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Predicate deciding whether clusters in an infrastructure account are managed.
pub trait AccountFilter: Send + Sync {
    fn allowed(&self, account: &str) -> bool;
}

impl<F> AccountFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn allowed(&self, account: &str) -> bool {
        self(account)
    }
}

pub const DEFAULT_INCLUDE: &str = ".*";
pub const DEFAULT_EXCLUDE: &str = "^$";

/// An account is allowed when it matches `include` and does not match `exclude`.
#[derive(Clone, Debug)]
pub struct IncludeExcludeFilter {
    include: Regex,
    exclude: Regex,
}

impl IncludeExcludeFilter {
    pub fn new(include: &str, exclude: &str) -> Result<Self, FilterError> {
        Ok(Self {
            include: compile("include", include)?,
            exclude: compile("exclude", exclude)?,
        })
    }
}

impl Default for IncludeExcludeFilter {
    fn default() -> Self {
        Self {
            include: Regex::new(DEFAULT_INCLUDE).expect("default include pattern"),
            exclude: Regex::new(DEFAULT_EXCLUDE).expect("default exclude pattern"),
        }
    }
}

impl AccountFilter for IncludeExcludeFilter {
    fn allowed(&self, account: &str) -> bool {
        self.include.is_match(account) && !self.exclude.is_match(account)
    }
}

fn compile(field: &'static str, pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
        field,
        pattern: pattern.to_string(),
        source,
    })
}
