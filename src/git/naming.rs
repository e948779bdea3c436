// ABOUTME: Bidirectional mapping between task ids and feature-branch names (features/<taskId>)

use thiserror::Error;

pub const DEFAULT_FEATURE_BRANCH_PREFIX: &str = "features/";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NamingError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Stateless naming convention keyed on a fixed branch prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNamingConvention {
    prefix: String,
}

impl Default for BranchNamingConvention {
    fn default() -> Self {
        Self::new(DEFAULT_FEATURE_BRANCH_PREFIX)
    }
}

impl BranchNamingConvention {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the feature branch for a task id. Surrounding whitespace is trimmed.
    pub fn task_id_to_branch_name(&self, task_id: &str) -> Result<String, NamingError> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(NamingError::InvalidArgument(
                "task id must be a non-empty string".to_string(),
            ));
        }
        Ok(format!("{}{}", self.prefix, task_id))
    }

    pub fn is_feature_branch_name(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }

    /// Inverse of [`Self::task_id_to_branch_name`]; `None` for non-feature
    /// branches and for the bare prefix.
    pub fn branch_name_to_task_id(&self, name: &str) -> Option<String> {
        name.strip_prefix(&self.prefix)
            .filter(|id| !id.is_empty())
            .map(ToString::to_string)
    }
}
