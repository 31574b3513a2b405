//! Bounded worker pool running one simulator process per seed.
//!
//! All seeds of a sweep are queued up front. A fixed number of worker
//! threads, never more than the configured core count, pull seeds off the
//! queue one at a time and block on the simulator process for each. The
//! pool lives inside a thread scope, so [`Runner::run`] returns only once
//! every worker has drained the queue and every launched process has exited.
//!
//! A run that fails, never starts, or panics inside the launcher is logged
//! and counted but does not stop the sweep. There are no retries and no timeouts: a simulator that
//! hangs keeps its worker busy until someone kills it.
//!
//! [`Runner::run`]: struct.Runner.html#method.run

use std::any::Any;
use std::fmt;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::command::{build_command, Invocation};
use crate::config::RunConfig;
use crate::Seed;

/// How a single invocation settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Process exited with the given status code.
    Exited(i32),
    /// Process was terminated by a signal.
    Terminated,
    /// Process could not be started.
    SpawnFailed(String),
    /// Launcher panicked while handling the seed.
    Panicked(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Exited(0))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Exited(code) => write!(f, "exited with status {}", code),
            Outcome::Terminated => write!(f, "terminated by signal"),
            Outcome::SpawnFailed(e) => write!(f, "failed to start: {}", e),
            Outcome::Panicked(msg) => write!(f, "launcher panicked: {}", msg),
        }
    }
}

/// Starts an invocation and blocks until it settles.
///
/// Implementations are shared between all workers of a pool.
pub trait Launcher: Sync {
    fn launch(&self, invocation: &Invocation) -> Outcome;
}

impl<L: Launcher + ?Sized> Launcher for &L {
    fn launch(&self, invocation: &Invocation) -> Outcome {
        (**self).launch(invocation)
    }
}

/// What happens to the simulator's stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Discard,
    Inherit,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Discard
    }
}

/// Launches invocations as OS processes.
#[derive(Debug, Default, Clone)]
pub struct ProcessLauncher {
    output: OutputMode,
}

impl ProcessLauncher {
    pub fn new(output: OutputMode) -> ProcessLauncher {
        ProcessLauncher { output }
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, invocation: &Invocation) -> Outcome {
        let mut command = Command::new(invocation.program());
        command.args(invocation.args()).stdin(Stdio::null());
        if self.output == OutputMode::Discard {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        match command.status() {
            Ok(status) => match status.code() {
                Some(code) => Outcome::Exited(code),
                None => Outcome::Terminated,
            },
            Err(e) => Outcome::SpawnFailed(e.to_string()),
        }
    }
}

/// Progress reporting for settled seeds.
///
/// Each settled seed is written on its own line. Write errors are ignored,
/// a closed stdout (`sweep | head -1`) must not stop the sweep.
pub enum Progress {
    Stdout,
    Writer(Mutex<Box<dyn Write + Send>>),
    Silent,
}

impl Progress {
    pub fn writer<W: Write + Send + 'static>(writer: W) -> Progress {
        Progress::Writer(Mutex::new(Box::new(writer)))
    }

    fn seed_settled(&self, seed: Seed) {
        let _ = match self {
            Progress::Stdout => writeln!(io::stdout().lock(), "{}", seed),
            Progress::Writer(writer) => match writer.lock() {
                Ok(mut writer) => writeln!(writer, "{}", seed),
                Err(_) => Ok(()),
            },
            Progress::Silent => Ok(()),
        };
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Stdout => f.write_str("Stdout"),
            Progress::Writer(_) => f.write_str("Writer"),
            Progress::Silent => f.write_str("Silent"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Per-seed outcomes of a finished sweep.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    outcomes: Vec<(Seed, Outcome)>,
    elapsed: Duration,
}

impl RunSummary {
    /// Outcomes ordered by seed.
    pub fn outcomes(&self) -> &[(Seed, Outcome)] {
        &self.outcomes
    }

    pub fn launched(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    /// Seeds whose invocation did not exit cleanly.
    pub fn failed(&self) -> Vec<Seed> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(seed, _)| *seed)
            .collect()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Bounded worker pool driving a single sweep.
pub struct Runner<'c, L> {
    config: &'c RunConfig,
    launcher: L,
    progress: Progress,
}

impl<'c, L: Launcher> Runner<'c, L> {
    pub fn new(config: &'c RunConfig, launcher: L) -> Runner<'c, L> {
        Runner {
            config,
            launcher,
            progress: Progress::Stdout,
        }
    }

    pub fn with_progress(mut self, progress: Progress) -> Runner<'c, L> {
        self.progress = progress;
        self
    }

    /// Runs every seed in `0..repetitions` and waits for all of them.
    ///
    /// At most `cores` invocations are in flight at any time. Seeds settle
    /// in no particular order.
    pub fn run(&self) -> RunSummary {
        let started = Instant::now();
        let total = self.config.repetitions();
        if total == 0 {
            info!("no repetitions configured, nothing to run");
            return RunSummary::default();
        }

        let (sender, queue) = crossbeam_channel::unbounded();
        for seed in 0..total {
            // the queue is held right here, sending can't disconnect
            let _ = sender.send(seed);
        }
        drop(sender);

        let workers = self.config.cores().min(total as usize);
        debug!("dispatching {} seeds to {} workers", total, workers);

        let (report, settled) = crossbeam_channel::unbounded();
        thread::scope(|scope| {
            let handles = (0..workers)
                .map(|id| {
                    let queue = queue.clone();
                    let report = report.clone();
                    scope.spawn(move || self.work(id, queue, report))
                })
                .collect::<Vec<_>>();
            for (id, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    error!("worker {} died outside of a launch", id);
                }
            }
        });
        drop(report);
        let mut outcomes = settled.iter().collect::<Vec<_>>();
        outcomes.sort_by_key(|(seed, _)| *seed);

        let summary = RunSummary {
            outcomes,
            elapsed: started.elapsed(),
        };
        info!(
            "sweep finished: {} launched, {} succeeded, {} failed ({:.1}s)",
            summary.launched(),
            summary.succeeded(),
            summary.launched() - summary.succeeded(),
            summary.elapsed().as_secs_f64(),
        );
        summary
    }

    fn work(&self, id: usize, queue: Receiver<Seed>, report: Sender<(Seed, Outcome)>) {
        for seed in queue.iter() {
            let invocation = build_command(self.config, seed);
            debug!("worker {} starting seed {}: {}", id, seed, invocation);
            let outcome =
                match panic::catch_unwind(AssertUnwindSafe(|| self.launcher.launch(&invocation))) {
                    Ok(outcome) => outcome,
                    Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
                };
            if outcome.is_success() {
                info!("seed {} done", seed);
            } else {
                warn!("seed {} {}", seed, outcome);
            }
            self.progress.seed_settled(seed);
            // the collecting end lives until every worker is joined
            let _ = report.send((seed, outcome));
        }
        trace!("worker {} found the queue empty", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records launches and tracks how many are in flight.
    #[derive(Default)]
    struct Recorder {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        seeds: Mutex<Vec<Seed>>,
        fail_seed: Option<Seed>,
        panic_seed: Option<Seed>,
    }

    impl Launcher for Recorder {
        fn launch(&self, invocation: &Invocation) -> Outcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.seeds.lock().unwrap().push(invocation.seed());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.panic_seed == Some(invocation.seed()) {
                panic!("launcher blew up");
            }
            if self.fail_seed == Some(invocation.seed()) {
                Outcome::Exited(1)
            } else {
                Outcome::Exited(0)
            }
        }
    }

    fn config(cores: usize, repetitions: Seed) -> RunConfig {
        RunConfig::new(cores, repetitions, 600, 15, "RateBasedAdaptationLogic").unwrap()
    }

    #[test]
    fn runs_each_seed_once_within_core_limit() {
        let config = config(2, 5);
        let recorder = Recorder::default();
        let summary = Runner::new(&config, &recorder)
            .with_progress(Progress::Silent)
            .run();

        let mut seeds = recorder.seeds.lock().unwrap().clone();
        seeds.sort();
        assert_eq!(seeds, vec![0, 1, 2, 3, 4]);
        assert!(recorder.max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(recorder.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(summary.launched(), 5);
        assert_eq!(summary.succeeded(), 5);
    }

    #[test]
    fn core_limit_holds_for_various_sizes() {
        for &(cores, repetitions) in &[(1, 4), (3, 10), (8, 3), (4, 4)] {
            let config = config(cores, repetitions);
            let recorder = Recorder::default();
            Runner::new(&config, &recorder)
                .with_progress(Progress::Silent)
                .run();
            let seeds = recorder.seeds.lock().unwrap();
            let unique = seeds.iter().collect::<HashSet<_>>();
            assert_eq!(seeds.len(), repetitions as usize);
            assert_eq!(unique.len(), repetitions as usize);
            assert!(recorder.max_in_flight.load(Ordering::SeqCst) <= cores);
        }
    }

    #[test]
    fn uses_available_parallelism() {
        let config = config(4, 8);
        let recorder = Recorder::default();
        Runner::new(&config, &recorder)
            .with_progress(Progress::Silent)
            .run();
        assert!(recorder.max_in_flight.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn zero_repetitions_launch_nothing() {
        let config = config(2, 0);
        let recorder = Recorder::default();
        let summary = Runner::new(&config, &recorder).run();
        assert!(recorder.seeds.lock().unwrap().is_empty());
        assert_eq!(summary.launched(), 0);
    }

    #[test]
    fn failed_seed_does_not_stop_the_sweep() {
        let config = config(2, 5);
        let recorder = Recorder {
            fail_seed: Some(3),
            ..Default::default()
        };
        let summary = Runner::new(&config, &recorder)
            .with_progress(Progress::Silent)
            .run();
        assert_eq!(summary.launched(), 5);
        assert_eq!(summary.succeeded(), 4);
        assert_eq!(summary.failed(), vec![3]);
        assert_eq!(
            summary.outcomes().iter().map(|(s, _)| *s).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
    }

    #[test]
    fn panicking_launcher_keeps_single_worker_going() {
        let config = config(1, 4);
        let recorder = Recorder {
            panic_seed: Some(0),
            ..Default::default()
        };
        let summary = Runner::new(&config, &recorder)
            .with_progress(Progress::Silent)
            .run();
        assert_eq!(*recorder.seeds.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(summary.launched(), 4);
        assert_eq!(summary.failed(), vec![0]);
        assert_eq!(
            summary.outcomes()[0].1,
            Outcome::Panicked("launcher blew up".to_string())
        );
    }

    #[test]
    fn panicking_launcher_in_wider_pool() {
        let config = config(2, 6);
        let recorder = Recorder {
            panic_seed: Some(1),
            ..Default::default()
        };
        let summary = Runner::new(&config, &recorder)
            .with_progress(Progress::Silent)
            .run();
        assert_eq!(recorder.seeds.lock().unwrap().len(), 6);
        assert_eq!(summary.launched(), 6);
        assert_eq!(summary.failed(), vec![1]);
    }

    /// Cloneable in-memory sink for progress output.
    #[derive(Clone, Default)]
    struct SharedBuf(std::sync::Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Sink that behaves like a closed pipe.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn progress_writes_each_settled_seed() {
        let config = config(2, 5);
        let recorder = Recorder::default();
        let buf = SharedBuf::default();
        Runner::new(&config, &recorder)
            .with_progress(Progress::writer(buf.clone()))
            .run();
        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let mut seeds = text
            .lines()
            .map(|line| line.parse::<Seed>().unwrap())
            .collect::<Vec<_>>();
        seeds.sort();
        assert_eq!(seeds, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn closed_progress_sink_does_not_stop_the_sweep() {
        let config = config(1, 4);
        let recorder = Recorder::default();
        let summary = Runner::new(&config, &recorder)
            .with_progress(Progress::writer(ClosedPipe))
            .run();
        assert_eq!(*recorder.seeds.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(summary.succeeded(), 4);
    }

    #[test]
    fn outcome_display() {
        assert_eq!(Outcome::Exited(2).to_string(), "exited with status 2");
        assert!(Outcome::SpawnFailed("no such file".into())
            .to_string()
            .contains("no such file"));
        assert!(Outcome::Exited(0).is_success());
        assert!(!Outcome::Terminated.is_success());
        assert!(!Outcome::Panicked("boom".into()).is_success());
        assert_eq!(
            Outcome::Panicked("boom".into()).to_string(),
            "launcher panicked: boom"
        );
    }

    #[cfg(unix)]
    #[test]
    fn process_launcher_reports_exit_status() {
        let launcher = ProcessLauncher::default();
        let ok = Invocation::new(0, "true", vec![]);
        let failing = Invocation::new(1, "false", vec![]);
        assert_eq!(launcher.launch(&ok), Outcome::Exited(0));
        assert_eq!(launcher.launch(&failing), Outcome::Exited(1));
    }

    #[cfg(unix)]
    #[test]
    fn process_launcher_reports_missing_program() {
        let launcher = ProcessLauncher::default();
        let missing = Invocation::new(0, "./no-such-simulator", vec!["--run".to_string()]);
        assert!(matches!(launcher.launch(&missing), Outcome::SpawnFailed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn real_processes_settle_before_run_returns() {
        // `false` ignores the `--run` argument and exits 1 for every seed
        let config = config(3, 4).with_program("false");
        let summary = Runner::new(&config, ProcessLauncher::default())
            .with_progress(Progress::Silent)
            .run();
        assert_eq!(summary.launched(), 4);
        assert_eq!(summary.failed(), vec![0, 1, 2, 3]);
    }
}
