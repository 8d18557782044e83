//! Claim policies decide which ready task an agent should get.

use padai_core::Task;

/// Orders claim candidates for an agent.
///
/// `ready` is already sorted in claim order. The coordinator tries the
/// returned ids in sequence and skips any that stopped being ready in the
/// meantime. Returning an empty list declines the claim.
pub trait ClaimPolicy: Send + Sync {
    fn name(&self) -> &str;

    fn candidates(&self, agent: &str, ready: &[Task]) -> Vec<String>;
}

/// Hands out ready tasks in list order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstReady;

impl ClaimPolicy for FirstReady {
    fn name(&self) -> &str {
        "first-ready"
    }

    fn candidates(&self, _agent: &str, ready: &[Task]) -> Vec<String> {
        ready.iter().map(|t| t.id.clone()).collect()
    }
}
