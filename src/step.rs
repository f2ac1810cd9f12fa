use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Optional pause between the steps of a flow so each request can be inspected.
#[derive(Debug, Default)]
pub struct StepController {
    enabled: bool,
    counter: AtomicUsize,
    skip_steps: HashSet<usize>,
}

impl StepController {
    pub fn new(enabled: bool, skip_steps: &[usize]) -> Self {
        Self {
            enabled,
            counter: AtomicUsize::new(0),
            skip_steps: skip_steps.iter().copied().collect(),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Number of steps announced so far.
    pub fn steps_seen(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    /// Announce the next step; waits for Enter when stepping is enabled.
    pub fn pause(&self, description: &str) -> Result<()> {
        let step_number = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        crate::log_info!("Step {}: {}", step_number, description);
        if !self.enabled {
            return Ok(());
        }

        if self.skip_steps.contains(&step_number) {
            println!("\n--- Skipping pause at step {}: {}", step_number, description);
            return Ok(());
        }

        println!("\n=== Step {}: {} ===", step_number, description);
        print!("Press Enter to continue...");
        io::stdout()
            .flush()
            .context("Failed to flush stdout during step-through pause")?;
        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .context("Failed to read input during step-through pause")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_controller_counts_without_blocking() {
        let steps = StepController::disabled();
        steps.pause("one").unwrap();
        steps.pause("two").unwrap();
        assert_eq!(steps.steps_seen(), 2);
    }

    #[test]
    fn skipped_steps_do_not_wait_for_input() {
        let steps = StepController::new(true, &[1, 2]);
        steps.pause("initialize").unwrap();
        steps.pause("submit").unwrap();
        assert_eq!(steps.steps_seen(), 2);
    }
}
