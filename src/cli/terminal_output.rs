//! Terminal reporter for run progress
//!
//! Prints every execution event as it arrives, separating steps with a rule
//! and keeping an optional progress bar below the output.

use crate::{
    cli::output::{create_progress_bar, format_execution_event},
    execution::ExecutionEvent,
};
use console::style;
use indicatif::ProgressBar;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Displays execution events on the terminal
pub struct TerminalReporter {
    show_progress: bool,
    progress: Mutex<Option<ProgressBar>>,
    warnings: AtomicUsize,
}

impl TerminalReporter {
    /// Create a reporter; `show_progress` adds an indicatif bar
    pub fn new(show_progress: bool) -> Self {
        Self {
            show_progress,
            progress: Mutex::new(None),
            warnings: AtomicUsize::new(0),
        }
    }

    /// Number of warnings seen so far
    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::SeqCst)
    }

    pub fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStarted { total_steps, .. } => {
                self.print_line(&format_execution_event(event));
                if self.show_progress {
                    if let Ok(mut progress) = self.progress.lock() {
                        *progress = Some(create_progress_bar(*total_steps));
                    }
                }
            }
            ExecutionEvent::StepStarted { name, .. } => {
                self.print_line(&separator());
                self.print_line(&format_execution_event(event));
                self.set_message(name);
            }
            ExecutionEvent::StepFinished { .. } => {
                self.print_line(&format_execution_event(event));
                self.advance();
            }
            ExecutionEvent::Warning { .. } => {
                self.warnings.fetch_add(1, Ordering::SeqCst);
                self.print_line(&format_execution_event(event));
            }
            ExecutionEvent::RunFinished { .. } => {
                self.finish_progress();
                self.print_line(&separator());
                self.print_line(&format_execution_event(event));
            }
        }
    }

    /// Print above the progress bar when one is active
    fn print_line(&self, line: &str) {
        let progress = self.progress.lock().ok().and_then(|p| p.clone());
        match progress {
            Some(bar) => bar.println(line),
            None => println!("{}", line),
        }
    }

    fn set_message(&self, name: &str) {
        if let Some(bar) = self.progress.lock().ok().and_then(|p| p.clone()) {
            bar.set_message(name.to_string());
        }
    }

    fn advance(&self) {
        if let Some(bar) = self.progress.lock().ok().and_then(|p| p.clone()) {
            bar.inc(1);
        }
    }

    fn finish_progress(&self) {
        if let Ok(mut progress) = self.progress.lock() {
            if let Some(bar) = progress.take() {
                bar.finish_and_clear();
            }
        }
    }
}

/// Horizontal rule spanning the terminal width
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    style("─".repeat(width)).dim().to_string()
}
