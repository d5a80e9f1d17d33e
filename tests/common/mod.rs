// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use craig::expression::ExprRef;
use craig::solver::{SmtResult, SubsumptionSolver};

/// A solver double that replays canned answers: each validity query pops the
/// next scripted result, and the unsat core is whatever the test staged.
pub struct ScriptedSolver {
    results: Vec<SmtResult>,
    unsat_core: Vec<ExprRef>,
    pub queries: usize,
    pub quantified_queries: usize,
    pub timeouts_set: Vec<f64>,
}

impl ScriptedSolver {
    pub fn new(results: Vec<SmtResult>) -> ScriptedSolver {
        ScriptedSolver {
            results,
            unsat_core: Vec::new(),
            queries: 0,
            quantified_queries: 0,
            timeouts_set: Vec::new(),
        }
    }

    pub fn with_unsat_core(results: Vec<SmtResult>, unsat_core: Vec<ExprRef>) -> ScriptedSolver {
        let mut solver = ScriptedSolver::new(results);
        solver.unsat_core = unsat_core;
        solver
    }

    fn next_result(&mut self) -> SmtResult {
        if self.results.is_empty() {
            SmtResult::Undefined
        } else {
            self.results.remove(0)
        }
    }
}

impl SubsumptionSolver for ScriptedSolver {
    fn evaluate(&mut self, _constraints: &[ExprRef], _query: &ExprRef) -> SmtResult {
        self.queries += 1;
        self.next_result()
    }

    fn get_value(&mut self, _constraints: &[ExprRef], _expr: &ExprRef) -> Option<ExprRef> {
        None
    }

    fn direct_compute_validity(&mut self, _constraints: &[ExprRef], _query: &ExprRef) -> SmtResult {
        self.queries += 1;
        self.quantified_queries += 1;
        self.next_result()
    }

    fn get_unsat_core(&mut self) -> Vec<ExprRef> {
        self.unsat_core.clone()
    }

    fn set_core_solver_timeout(&mut self, seconds: f64) {
        self.timeouts_set.push(seconds);
    }
}
