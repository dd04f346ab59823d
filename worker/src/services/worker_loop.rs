use std::{future::Future, time::Duration};

use anyhow::Result;
use tracing::{error, info};

/// Runs `task` every `interval` forever. A failed tick is logged and the loop carries on.
pub async fn run_periodic<F, Fut>(name: &'static str, interval: Duration, mut task: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    info!(job = name, interval_secs = interval.as_secs(), "worker: loop started");
    loop {
        if let Err(e) = task().await {
            error!(job = name, error = ?e, "worker: tick failed");
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[tokio::test(start_paused = true)]
    async fn keeps_ticking_after_a_failure() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let handle = tokio::spawn(run_periodic("test", Duration::from_secs(5), move || {
            let counter = Arc::clone(&counter);
            async move {
                let tick = counter.fetch_add(1, Ordering::SeqCst);
                if tick == 0 {
                    Err(anyhow!("first tick fails"))
                } else {
                    Ok(())
                }
            }
        }));

        tokio::time::sleep(Duration::from_secs(11)).await;
        handle.abort();

        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
