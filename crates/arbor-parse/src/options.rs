use crate::{Resource, ResourceExhaustionError};

/// Driver operations allowed per byte of input under the default budget.
pub const DEFAULT_OPERATIONS_PER_BYTE: u64 = 128;

/// Inputs shorter than this are budgeted as if they had this many bytes.
const MIN_BUDGETED_BYTES: u64 = 64;

/// Upper bounds for a single parse. `None` means unbounded.
///
/// The default budget only caps operations, in proportion to the input, so
/// a table whose reductions cycle without consuming input ends in an error
/// instead of running forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseBudget {
    /// Heads created because the table had more than one action.
    pub max_forks: Option<u64>,
    /// Bytes run through the lexer, reused subtrees excluded.
    pub max_lexed_bytes: Option<u64>,
    /// Shifts, reductions and reused subtrees.
    pub max_operations: Option<u64>,
    /// Like `max_operations`, but per byte of the text being parsed. The
    /// smaller of the two applies.
    pub max_operations_per_byte: Option<u64>,
}

impl Default for ParseBudget {
    fn default() -> Self {
        Self { max_operations_per_byte: Some(DEFAULT_OPERATIONS_PER_BYTE), ..Self::UNLIMITED }
    }
}

impl ParseBudget {
    pub const UNLIMITED: Self = Self {
        max_forks: None,
        max_lexed_bytes: None,
        max_operations: None,
        max_operations_per_byte: None,
    };

    /// Folds the per-byte limit into `max_operations` for a text of `len`
    /// bytes.
    pub(crate) fn for_input(self, len: usize) -> Self {
        let scaled = self
            .max_operations_per_byte
            .map(|per_byte| per_byte.saturating_mul((len as u64).max(MIN_BUDGETED_BYTES)));
        let max_operations = match (self.max_operations, scaled) {
            (Some(limit), Some(scaled)) => Some(limit.min(scaled)),
            (limit, scaled) => limit.or(scaled),
        };
        Self { max_operations, max_operations_per_byte: None, ..self }
    }

    pub(crate) fn check(&self, stats: &ParseStats) -> Result<(), ResourceExhaustionError> {
        let limits = [
            (Resource::Forks, self.max_forks, stats.forks),
            (Resource::LexedBytes, self.max_lexed_bytes, stats.lexed_bytes),
            (Resource::Operations, self.max_operations, stats.operations),
        ];
        for (resource, limit, used) in limits {
            match limit {
                Some(limit) if used > limit => {
                    return Err(ResourceExhaustionError { resource, limit });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub budget: ParseBudget,
    /// Emit the statistics of every parse as an `info` event instead of a
    /// `debug` one.
    pub log_stats: bool,
}

impl ParseOptions {
    #[must_use]
    pub fn with_budget(mut self, budget: ParseBudget) -> Self {
        self.budget = budget;
        self
    }

    #[must_use]
    pub fn with_log_stats(mut self, log_stats: bool) -> Self {
        self.log_stats = log_stats;
        self
    }
}

/// Counters for the last parse run by a [`crate::Parser`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub reused_nodes: u64,
    pub reused_leaves: u64,
    pub lexed_bytes: u64,
    pub forks: u64,
    pub operations: u64,
    pub recoveries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_byte_limit_scales_with_the_input() {
        let budget = ParseBudget::default();
        assert_eq!(budget.for_input(0).max_operations, Some(64 * DEFAULT_OPERATIONS_PER_BYTE));
        assert_eq!(budget.for_input(1000).max_operations, Some(1000 * DEFAULT_OPERATIONS_PER_BYTE));

        let both = ParseBudget { max_operations: Some(500), ..budget };
        assert_eq!(both.for_input(1000).max_operations, Some(500));
        assert_eq!(ParseBudget::UNLIMITED.for_input(1000), ParseBudget::UNLIMITED);
    }
}
