// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::expression::ExprRef;

use serde::{Deserialize, Serialize};

/// The outcome of asking the solver whether the path constraints entail a
/// query.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SmtResult {
    /// The constraints entail the query.
    Valid,
    /// There is a countermodel.
    Invalid,
    /// The solver gave up or timed out; treated as "not subsumed, proceed".
    Undefined,
}

/// The capabilities the subsumption core needs from an external solver. The
/// solver is an oracle: it decides entailment and reports unsat cores, and
/// the core never interprets models itself.
pub trait SubsumptionSolver {
    /// Decides whether `constraints` entail `query`. Used for
    /// quantifier-free queries only.
    fn evaluate(&mut self, constraints: &[ExprRef], query: &ExprRef) -> SmtResult;

    /// Concretizes an expression under the constraints, if the solver can.
    fn get_value(&mut self, constraints: &[ExprRef], expr: &ExprRef) -> Option<ExprRef>;

    /// Decides entailment for a quantified query. Implementations must route
    /// this past any pre-solving optimization that assumes quantifier-free
    /// input, typically by instantiating a fresh context per call.
    fn direct_compute_validity(&mut self, constraints: &[ExprRef], query: &ExprRef) -> SmtResult;

    /// The unsat core backing the most recent Valid answer, in assertion
    /// (oldest-first) order.
    fn get_unsat_core(&mut self) -> Vec<ExprRef>;

    /// Sets the per-query timeout; zero means no timeout.
    fn set_core_solver_timeout(&mut self, seconds: f64);
}

/// A solver that never decides anything, for configurations without a real
/// solver backend. Every check falls back to "not subsumed".
#[derive(Debug, Default)]
pub struct SolverStub {}

impl SubsumptionSolver for SolverStub {
    fn evaluate(&mut self, _constraints: &[ExprRef], _query: &ExprRef) -> SmtResult {
        SmtResult::Undefined
    }

    fn get_value(&mut self, _constraints: &[ExprRef], _expr: &ExprRef) -> Option<ExprRef> {
        None
    }

    fn direct_compute_validity(&mut self, _constraints: &[ExprRef], _query: &ExprRef) -> SmtResult {
        SmtResult::Undefined
    }

    fn get_unsat_core(&mut self) -> Vec<ExprRef> {
        Vec::new()
    }

    fn set_core_solver_timeout(&mut self, _seconds: f64) {}
}
