//! Per-run state shared with the transports

use std::sync::Arc;

use diag_core::DiagnosticSink;
use diag_protocol::CallId;

/// Call-id counter and logging capability for one probe run.
///
/// Owned by the task driving the run and lent to the transport for each
/// call, so ids are handed out strictly in issuance order.
pub struct RunContext {
    next: CallId,
    issued: Vec<CallId>,
    sink: Arc<dyn DiagnosticSink>,
}

impl RunContext {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            next: CallId::FIRST,
            issued: Vec::new(),
            sink,
        }
    }

    /// Allocate the id for the next request
    pub fn next_id(&mut self) -> CallId {
        let id = self.next;
        self.next = id.next();
        self.issued.push(id);
        id
    }

    /// Every id handed out so far, in order
    pub fn issued_ids(&self) -> &[CallId] {
        &self.issued
    }

    pub fn last_issued(&self) -> Option<CallId> {
        self.issued.last().copied()
    }

    pub fn sink(&self) -> &Arc<dyn DiagnosticSink> {
        &self.sink
    }
}
