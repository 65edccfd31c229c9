use crate::errors::FilterError;
use serde_yaml::Value;
use std::fmt::Debug;

/// A unit of work over a document node.
///
/// `Ok(None)` means "no match" and stops a pipe without being an error.
/// Filters that navigate return a borrow into the node they were given;
/// filters that mutate change the node in place and return it.
pub trait Filter: Debug + Send + Sync {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError>;
}
