//! Step decay learning rate schedule.

use serde::{Deserialize, Serialize};
use sr_core::TrainingParams;

/// Multiply the learning rate by `decay` at every epoch `e > 0` with
/// `e % step_size == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepDecay {
    pub step_size: usize,
    pub decay: f64,
}

impl StepDecay {
    pub fn new(step_size: usize, decay: f64) -> Self {
        Self {
            step_size: step_size.max(1),
            decay,
        }
    }

    pub fn from_params(params: &TrainingParams) -> Self {
        Self::new(params.learning_rate_step_size, params.learning_rate_decay)
    }

    /// Learning rate for `epoch` (0-based) given the rate of the previous epoch.
    pub fn next_lr(&self, epoch: usize, lr: f64) -> f64 {
        if epoch > 0 && epoch % self.step_size == 0 {
            lr * self.decay
        } else {
            lr
        }
    }
}

/// Learning rate scheduler tracking the current epoch
#[derive(Debug, Clone)]
pub struct LearningRateScheduler {
    schedule: StepDecay,
    current_lr: f64,
    current_epoch: usize,
}

impl LearningRateScheduler {
    pub fn new(schedule: StepDecay, base_lr: f64) -> Self {
        Self {
            schedule,
            current_lr: base_lr,
            current_epoch: 0,
        }
    }

    /// Learning rate of the current epoch
    pub fn get_lr(&self) -> f64 {
        self.current_lr
    }

    /// Advance to the next epoch (call at the end of each epoch)
    pub fn step(&mut self) {
        self.current_epoch += 1;
        self.current_lr = self.schedule.next_lr(self.current_epoch, self.current_lr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_decay() {
        let schedule = StepDecay::new(200, 0.5);
        assert_eq!(schedule.next_lr(0, 1e-3), 1e-3);
        assert_eq!(schedule.next_lr(199, 1e-3), 1e-3);
        assert_eq!(schedule.next_lr(200, 1e-3), 5e-4);
        assert_eq!(schedule.next_lr(400, 5e-4), 2.5e-4);
    }

    #[test]
    fn test_scheduler_over_epochs() {
        let mut scheduler = LearningRateScheduler::new(StepDecay::new(2, 0.1), 1.0);
        let mut rates = vec![scheduler.get_lr()];
        for _ in 0..5 {
            scheduler.step();
            rates.push(scheduler.get_lr());
        }

        let expected = [1.0, 1.0, 0.1, 0.1, 0.01, 0.01];
        for (rate, expected) in rates.iter().zip(expected) {
            assert!((rate - expected).abs() < 1e-12);
        }
        assert_eq!(scheduler.current_epoch, 5);
    }

    #[test]
    fn test_from_params() {
        let params = TrainingParams::default();
        let schedule = StepDecay::from_params(&params);
        assert_eq!(schedule.step_size, 200);
        assert_eq!(schedule.decay, 0.5);
    }
}
