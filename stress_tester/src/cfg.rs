#[derive(Debug, Clone, clap::Parser)]
pub struct Cfg {
    /// The queue implementation to test.
    pub implementation: Implementation,
    /// Number of producers that will submit jobs to the queue.
    #[arg(short, long)]
    pub producer_num: usize,
    /// Number of jobs each producer will submit during the test.
    #[arg(short, long)]
    pub job_num: usize,
    /// Number of consumers that will take jobs from the queue.
    #[arg(short, long, default_value_t = 1)]
    pub consumer_num: usize,
    /// Initial capacity of the queue. Small values exercise growth under contention.
    #[arg(short, long, default_value_t = prioq::DEFAULT_INITIAL_CAPACITY)]
    pub initial_capacity: usize,
    /// How long a consumer waits for the next job before re-checking the deadline.
    #[arg(long, default_value_t = 5)]
    pub wait_timeout_ms: u64,
    /// Number of jobs drained per batch after a consumer received one.
    #[arg(short = 'b', long, default_value_t = 100)]
    pub drain_batch_size: usize,
    // Hard cap on the test's execution time
    #[arg(long, default_value_t = 10)]
    pub run_duration_seconds: u64,
}

#[derive(Debug, Clone, strum::EnumString, clap::ValueEnum)]
pub enum Implementation {
    #[strum(ascii_case_insensitive)]
    Blocking,
    #[strum(ascii_case_insensitive)]
    Locked,
}
