use std::sync::Arc;

use anyhow::Context;
use cfg::Cfg;
use clap::Parser;
use prioq::{
    Job, WorkQueue,
    test::stress::{StressTestConfig, run_stress_test},
};
use prioq_sync::{BlockingPriorityQueue, LockedQueue};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub mod cfg;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = cfg::Cfg::parse();
    info!("Running configuration:\n{cfg:#?}");

    let res = match cfg.implementation {
        cfg::Implementation::Blocking => run_blocking(cfg),
        cfg::Implementation::Locked => run_locked(cfg),
    };
    if let Err(e) = res {
        error!("{e:?}");
    }
}

fn run_blocking(cfg: Cfg) -> anyhow::Result<()> {
    let queue = BlockingPriorityQueue::<Job>::with_capacity(cfg.initial_capacity)
        .context("could not create blocking queue")?;
    run(Arc::new(queue), &cfg)
}

fn run_locked(cfg: Cfg) -> anyhow::Result<()> {
    let queue =
        LockedQueue::<Job>::new(cfg.initial_capacity).context("could not create locked queue")?;
    run(Arc::new(queue), &cfg)
}

fn run<T: WorkQueue>(queue: Arc<T>, cfg: &Cfg) -> anyhow::Result<()> {
    cfg.job_num
        .checked_mul(cfg.producer_num)
        .ok_or_else(|| anyhow::anyhow!("Overflow while calculating the total job count"))?;

    let config = StressTestConfig {
        num_producers: cfg.producer_num,
        num_jobs: cfg.job_num,
        num_consumers: cfg.consumer_num,
        payload_size_range: (256, 1_024),
        wait_timeout_ms: cfg.wait_timeout_ms,
        drain_batch_size: cfg.drain_batch_size,
        priority_range: (142, 654),
        run_duration_seconds: cfg.run_duration_seconds,
    };
    let results = run_stress_test(queue, config);
    results.print_summary();

    anyhow::ensure!(
        results.total_delivered() <= results.total_submitted(),
        "delivered {} jobs but only {} were submitted",
        results.total_delivered(),
        results.total_submitted()
    );
    Ok(())
}
