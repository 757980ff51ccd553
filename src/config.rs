//! Stage configuration.

use tracing::warn;

/// Configuration for a transform stage
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StageConfig {
    /// Number of concurrent workers. With 1 the stage keeps arrival order.
    pub parallelism: usize,
    /// Name used in log output and metric labels
    pub name: String,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            name: "stage".to_string(),
        }
    }
}

impl StageConfig {
    /// Create a config with the given stage name and a single worker
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the number of concurrent workers
    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Set the stage name
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// The number of workers to spawn; never zero.
    pub(crate) fn workers(&self) -> usize {
        if self.parallelism == 0 {
            warn!(stage = %self.name, "parallelism 0 requested, running one worker");
            return 1;
        }
        self.parallelism
    }
}
