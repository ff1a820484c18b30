use super::cli::DemoCli;
use anyhow::{anyhow, bail, Context, Result};
use crossbeam::channel::bounded;
use fanin::{
    Arrival, BarrierConfig, CollatedError, CountedCallback, OverflowPolicy, Payload,
    RecordedCalls,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};
use threadpool::ThreadPool;

const BARRIER_LABEL: &str = "fanin-demo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutput {
    pub id: usize,
    pub value: u64,
    pub elapsed_us: u64,
}

/// One recorded report, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub arrival: usize,
    pub id: Option<usize>,
    pub value: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub cli: DemoCli,
    pub elapsed_ms: u64,
    pub collated_error: Option<String>,
    pub error_count: usize,
    pub records: Vec<JobRecord>,
    pub extra_calls: Vec<String>,
}

pub fn job_fails(id: usize, fail_every: usize) -> bool {
    fail_every > 0 && (id + 1) % fail_every == 0
}

// A failed job still forwards its output after the error slot.
fn run_job(id: usize, work: Duration, fail_every: usize) -> Vec<Payload<JobOutput>> {
    let start = Instant::now();
    thread::sleep(work);
    let output = JobOutput {
        id,
        value: (id as u64) * (id as u64),
        elapsed_us: start.elapsed().as_micros() as u64,
    };
    if job_fails(id, fail_every) {
        vec![
            Payload::error(format!("job {} failed", id)),
            Payload::Value(output),
        ]
    } else {
        vec![Payload::Absent, Payload::Value(output)]
    }
}

pub fn to_records(calls: &RecordedCalls<JobOutput>) -> Vec<JobRecord> {
    calls
        .iter()
        .enumerate()
        .map(|(arrival, args)| {
            let output = args.iter().find_map(Payload::as_value);
            JobRecord {
                arrival,
                id: output.map(|o| o.id),
                value: output.map(|o| o.value),
                error: args
                    .first()
                    .and_then(Payload::error_message)
                    .map(str::to_string),
            }
        })
        .collect()
}

pub fn run(cli: &DemoCli) -> Result<DemoReport> {
    let policy: OverflowPolicy = cli.policy.parse().map_err(|e: String| anyhow!(e))?;
    if cli.threads == 0 {
        bail!("--threads must be >= 1");
    }
    let config = BarrierConfig::default()
        .with_label(BARRIER_LABEL)
        .with_overflow(policy);

    let (done_sender, done_receiver) = bounded(1);
    let join = CountedCallback::with_config(
        cli.jobs,
        Some(
            move |err: Option<CollatedError>, calls: RecordedCalls<JobOutput>| {
                if let Err(e) = done_sender.send((err, calls)) {
                    warn!("completion report dropped: {}", e);
                }
            },
        ),
        config,
    )
    .context("Failed to create barrier")?;

    info!(
        "Starting {} jobs on {} threads",
        join.target(),
        cli.threads
    );
    let pool = ThreadPool::new(cli.threads);
    let start = Instant::now();
    for id in 0..join.target() {
        let join = join.clone();
        let work = Duration::from_millis(cli.work_ms);
        let fail_every = cli.fail_every;
        pool.execute(move || {
            let args = run_job(id, work, fail_every);
            match join.call(args) {
                Ok(Arrival::Fired) => debug!("job {} completed the barrier", id),
                Ok(_) => {}
                Err(e) => warn!("job {}: {}", id, e),
            }
        });
    }
    pool.join();
    let elapsed = start.elapsed();

    let (err, calls) = done_receiver.try_recv().map_err(|_| {
        anyhow!(
            "Only {} of {} jobs reported ({} panicked)",
            join.arrived(),
            join.target(),
            pool.panic_count()
        )
    })?;
    info!("All jobs joined in {:.1?}", elapsed);

    let extra_calls = (0..cli.extra_calls)
        .map(|_| match join.call0() {
            Ok(arrival) => format!("{:?}", arrival),
            Err(e) => e.to_string(),
        })
        .collect();

    Ok(DemoReport {
        cli: cli.clone(),
        elapsed_ms: elapsed.as_millis() as u64,
        error_count: err.as_ref().map_or(0, CollatedError::error_count),
        collated_error: err.map(String::from),
        records: to_records(&calls),
        extra_calls,
    })
}
