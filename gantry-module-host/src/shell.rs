//! Host shell seam
//!
//! The outbound collaborator the bootstrap uses to inform the user and to
//! terminate the process. Kept behind one trait so hosts can plug in their
//! own dialog primitives and tests can record the calls.

use std::io::{self, BufRead, Write};

/// Operations the bootstrap requests from its host application
pub trait HostShell {
    /// Present a blocking, single-choice failure dialog
    fn notify_failure(&mut self, message: &str);

    /// Drop any host-side references to loaded modules before the purge
    fn release_modules(&mut self);

    /// Terminate the host process
    fn terminate(&mut self);
}

/// Console-backed shell for plain-process hosts
///
/// The failure dialog degrades to a stderr message acknowledged on stdin;
/// termination exits with a non-zero status.
pub struct ProcessShell;

impl HostShell for ProcessShell {
    fn notify_failure(&mut self, message: &str) {
        let mut stderr = io::stderr();
        let _ = writeln!(stderr, "{}", message);
        let _ = write!(stderr, "Press Enter to close. ");
        let _ = stderr.flush();

        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
    }

    fn release_modules(&mut self) {}

    fn terminate(&mut self) {
        std::process::exit(1);
    }
}
