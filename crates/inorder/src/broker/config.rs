use crate::{Error, Result};

/// Construction-time tuning for a [`Broker`](crate::Broker).
///
/// The defaults reproduce the broker's native sizing: both the job intake and
/// the result output buffer hold `2 * concurrency` entries, which is the
/// backpressure window between submitters, workers, and the result consumer.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    pub(crate) concurrency: usize,
    pub(crate) intake_capacity: usize,
    pub(crate) output_capacity: usize,
}

impl BrokerConfig {
    /// Creates a config for `concurrency` parallel workers with default
    /// buffer capacities of `2 * concurrency`.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            intake_capacity: concurrency * 2,
            output_capacity: concurrency * 2,
        }
    }

    /// Overrides the bounded intake capacity (submitters block when full).
    #[must_use]
    pub fn intake_capacity(mut self, capacity: usize) -> Self {
        self.intake_capacity = capacity;
        self
    }

    /// Overrides the bounded output capacity (emission stalls when full).
    #[must_use]
    pub fn output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig {
                reason: "concurrency must be positive".to_string(),
            });
        }
        if self.intake_capacity == 0 || self.output_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: "buffer capacities must be positive".to_string(),
            });
        }
        Ok(())
    }
}
