//! Named stage timing for one orchestration pass.

use std::future::Future;
use std::time::Instant;

/// Records how long each named stage of a pass took, for the
/// end-of-pass log event.
#[derive(Default)]
pub struct StageTimer {
    results: Vec<(String, u64)>,
}

impl StageTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` and record its wall time under `name`.
    pub async fn time<T, Fut>(&mut self, name: &str, fut: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        let start = Instant::now();
        let out = fut.await;
        self.results
            .push((name.to_string(), start.elapsed().as_millis() as u64));
        out
    }

    /// `(stage name, milliseconds)` pairs in execution order.
    pub fn results(&self) -> &[(String, u64)] {
        &self.results
    }

    pub fn into_results(self) -> Vec<(String, u64)> {
        self.results
    }
}
