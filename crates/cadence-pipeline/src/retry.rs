use std::time::Duration;

/// Backoff curve applied between failed gateway-send attempts.
///
/// Mirrors the shape of the scheduling/executor retry strategies used
/// elsewhere in this workspace: each variant clamps its computed delay to a
/// configured maximum.
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    Exponential {
        base: Duration,
        max: Duration,
        multiplier: f64,
        jitter: bool,
    },
    Linear {
        delay: Duration,
        max: Duration,
    },
    Constant {
        delay: Duration,
    },
}

impl RetryStrategy {
    /// Computes the delay for the given zero-based `attempt` number.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Exponential {
                base,
                max,
                multiplier,
                jitter,
            } => {
                #[allow(clippy::cast_possible_wrap)]
                let raw = base.as_secs_f64() * multiplier.powi(attempt as i32);
                let adjusted = if *jitter {
                    raw * (1.0 + 0.1 * f64::from(attempt % 5))
                } else {
                    raw
                };
                Duration::from_secs_f64(adjusted.min(max.as_secs_f64()))
            }
            Self::Linear { delay, max } => {
                let raw = delay.as_secs_f64() * f64::from(attempt + 1);
                Duration::from_secs_f64(raw.min(max.as_secs_f64()))
            }
            Self::Constant { delay } => *delay,
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(250),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_per_attempt() {
        let strategy = RetryStrategy::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(strategy.delay_for(0), Duration::from_millis(100));
        assert_eq!(strategy.delay_for(1), Duration::from_millis(200));
        assert_eq!(strategy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn clamps_to_max() {
        let strategy = RetryStrategy::Linear {
            delay: Duration::from_secs(2),
            max: Duration::from_secs(5),
        };
        assert_eq!(strategy.delay_for(10), Duration::from_secs(5));
    }

    #[test]
    fn constant_never_changes() {
        let strategy = RetryStrategy::Constant {
            delay: Duration::from_millis(50),
        };
        assert_eq!(strategy.delay_for(0), strategy.delay_for(9));
    }
}
