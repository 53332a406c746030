use crate::foundation::error::{BindError, BindResult};

/// Options controlling the native-call worker pool.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeOpts {
    /// Worker threads running native calls. `None` uses rayon's default (one per core).
    pub threads: Option<usize>,
    /// Calls allowed to wait for a worker before submitters block.
    pub max_queued: usize,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for RuntimeOpts {
    fn default() -> Self {
        Self {
            threads: None,
            max_queued: 64,
            thread_name_prefix: "pixbind-worker".to_string(),
        }
    }
}

impl RuntimeOpts {
    pub fn validate(&self) -> BindResult<()> {
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(BindError::validation(
                "runtime 'threads' must be >= 1 when set",
            ));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(BindError::validation(
                "runtime 'thread_name_prefix' must be non-empty",
            ));
        }
        Ok(())
    }

    /// Parse and validate options from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> BindResult<Self> {
        let opts: Self = serde_json::from_str(json)
            .map_err(|e| BindError::validation(format!("invalid runtime options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
