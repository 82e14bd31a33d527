//! Retry planning for transient transport failures.
//!
//! A [`RetryPlan`] is an attempt budget plus an explicit list of
//! inter-attempt delays, one per gap between attempts. The plan is
//! validated when it is attached to a call, so an incomplete delay list
//! is rejected before any network attempt happens.

use std::time::Duration;

use crate::{Error, Result};

/// An attempt budget and the delays slept between attempts.
///
/// A plan of `N` attempts needs `N - 1` delays: `delays[0]` is slept
/// after the first failed attempt, `delays[1]` after the second, and so
/// on. Delays need not be uniform.
///
/// # Examples
///
/// ```
/// use scrivener::RetryPlan;
/// use std::time::Duration;
///
/// // Three attempts, backing off 1s then 5s.
/// let plan = RetryPlan::new(3, vec![Duration::from_secs(1), Duration::from_secs(5)]);
/// assert!(plan.validate().is_ok());
///
/// // Two delays cannot cover four attempts.
/// let short = RetryPlan::new(4, vec![Duration::from_secs(1), Duration::from_secs(1)]);
/// assert!(short.validate().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RetryPlan {
    attempts: usize,
    delays: Vec<Duration>,
}

impl RetryPlan {
    /// Creates a plan of `attempts` attempts with the given inter-attempt
    /// delays. An attempt count of zero is clamped to one.
    pub fn new(attempts: usize, delays: Vec<Duration>) -> Self {
        Self {
            attempts: attempts.max(1),
            delays,
        }
    }

    /// A plan that makes exactly one attempt and never retries.
    pub fn single() -> Self {
        Self {
            attempts: 1,
            delays: Vec::new(),
        }
    }

    /// The effective attempt count. Always at least one.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Checks that the delay list covers every gap between attempts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RetryConfigIncomplete`] when fewer than
    /// `attempts - 1` delays were provided.
    pub fn validate(&self) -> Result<()> {
        if self.delays.len() + 1 < self.attempts {
            return Err(Error::RetryConfigIncomplete {
                attempts: self.attempts,
                delays: self.delays.len(),
            });
        }
        Ok(())
    }

    /// Returns the delay to sleep after the given failed attempt
    /// (1-indexed), or `None` when the budget is exhausted and the
    /// failure is final.
    pub fn delay_after(&self, attempt: usize) -> Option<Duration> {
        if attempt >= self.attempts {
            return None;
        }
        self.delays.get(attempt - 1).copied()
    }
}

impl Default for RetryPlan {
    fn default() -> Self {
        Self::single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_attempts_clamps_to_one() {
        let plan = RetryPlan::new(0, Vec::new());
        assert_eq!(plan.attempts(), 1);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_delay_schedule() {
        let plan = RetryPlan::new(
            3,
            vec![Duration::from_millis(100), Duration::from_millis(500)],
        );

        assert_eq!(plan.delay_after(1), Some(Duration::from_millis(100)));
        assert_eq!(plan.delay_after(2), Some(Duration::from_millis(500)));
        // third attempt is the last one, nothing to sleep for
        assert_eq!(plan.delay_after(3), None);
    }

    #[test]
    fn test_short_delay_list_is_rejected() {
        let plan = RetryPlan::new(3, vec![Duration::from_millis(100)]);

        match plan.validate() {
            Err(Error::RetryConfigIncomplete { attempts, delays }) => {
                assert_eq!(attempts, 3);
                assert_eq!(delays, 1);
            }
            other => panic!("expected RetryConfigIncomplete, got {:?}", other),
        }
    }

    #[test]
    fn test_surplus_delays_are_allowed() {
        let plan = RetryPlan::new(2, vec![Duration::from_millis(10); 5]);
        assert!(plan.validate().is_ok());
        assert_eq!(plan.delay_after(1), Some(Duration::from_millis(10)));
        assert_eq!(plan.delay_after(2), None);
    }

    #[test]
    fn test_single_never_sleeps() {
        let plan = RetryPlan::single();
        assert_eq!(plan.attempts(), 1);
        assert_eq!(plan.delay_after(1), None);
    }
}
