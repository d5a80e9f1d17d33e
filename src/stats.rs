// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt::{Display, Formatter, Result};

/// Counters kept while checking subsumption. Solver failures never surface
/// as errors; these numbers are the only user-visible trace of them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SubsumptionStats {
    /// Subsumption checks performed (one per table entry considered).
    pub checks: u64,
    /// States pruned because a table entry subsumed them.
    pub subsumptions: u64,
    /// Solver calls that returned neither valid nor invalid.
    pub solver_failures: u64,
    /// Table entries created on node removal.
    pub entries_stored: u64,
}

impl Display for SubsumptionStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "checks: {}, subsumed: {}, solver failures: {}, entries: {}",
            self.checks, self.subsumptions, self.solver_failures, self.entries_stored
        )
    }
}
