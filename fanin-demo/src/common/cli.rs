use clap::Parser;
use serde::Serialize;

#[derive(Parser, Debug, Serialize, Clone)]
#[command(about = "Fan jobs out over a thread pool and join them with a counted callback")]
pub struct DemoCli {
    /// Number of jobs to start; the barrier waits for exactly this many reports
    #[arg(long, default_value_t = 8)]
    pub jobs: i64,

    /// Worker threads in the pool
    #[arg(long, default_value_t = 4)]
    pub threads: usize,

    /// Every k-th job fails. 0 means no job fails
    #[arg(long, default_value_t = 0)]
    pub fail_every: usize,

    /// Simulated work per job, in milliseconds
    #[arg(long, default_value_t = 10)]
    pub work_ms: u64,

    /// What to do with reports arriving after completion. Valid choices are "ignore" and "reject".
    #[arg(long, default_value = "ignore")]
    pub policy: String,

    /// Extra reports sent to the barrier after it fired, to exercise the policy
    #[arg(long, default_value_t = 0)]
    pub extra_calls: usize,

    /// Output filename for the JSON report. Printed to stdout if empty
    #[arg(long, default_value = "")]
    pub output: String,
}
