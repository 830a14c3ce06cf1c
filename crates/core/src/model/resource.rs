use url::Url;

use crate::model::ids::ExecutionId;

/// Handle to a running long-lived preview process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    execution_id: ExecutionId,
    address: Url,
}

impl ResourceHandle {
    #[must_use]
    pub fn new(execution_id: ExecutionId, address: Url) -> Self {
        Self {
            execution_id,
            address,
        }
    }

    #[must_use]
    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    /// Where the running app can be reached, e.g. for an iframe.
    #[must_use]
    pub fn address(&self) -> &Url {
        &self.address
    }
}

/// Output of a short-lived run that exited on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl ExecutionReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}
