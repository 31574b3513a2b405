//! Launcher that only shows what would run.

use sweep::{Invocation, Launcher, Outcome};

/// Prints each invocation to stdout and reports it as finished.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DryRunLauncher;

impl Launcher for DryRunLauncher {
    fn launch(&self, invocation: &Invocation) -> Outcome {
        println!("{}", invocation);
        Outcome::Exited(0)
    }
}
