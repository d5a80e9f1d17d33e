// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::allocation_graph::AllocationGraph;
use crate::expression::{Array, ExprRef};
use crate::ir::{Instruction, IrValue, Opcode};
use crate::shadow::ShadowArrays;

use log::trace;
use log_derive::logfn_inputs;
use mirai_annotations::*;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VERSION_ID: AtomicU64 = AtomicU64::new(1);

/// A program value at a specific execution version. Identity is unique per
/// version; the only mutable state is the core flag set during unsat-core
/// flood fill.
pub struct VersionedValue {
    value: Rc<IrValue>,
    expr: ExprRef,
    in_core: Cell<bool>,
    id: u64,
}

impl VersionedValue {
    pub(crate) fn new(value: Rc<IrValue>, expr: ExprRef) -> Rc<VersionedValue> {
        Rc::new(VersionedValue {
            value,
            expr,
            in_core: Cell::new(false),
            id: NEXT_VERSION_ID.fetch_add(1, Ordering::Relaxed),
        })
    }

    pub fn value(&self) -> &Rc<IrValue> {
        &self.value
    }

    pub fn expression(&self) -> &ExprRef {
        &self.expr
    }

    pub fn mark_in_core(&self) {
        self.in_core.set(true);
    }

    pub fn is_in_core(&self) -> bool {
        self.in_core.get()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    fn has_value(&self, value: &Rc<IrValue>) -> bool {
        self.value.id() == value.id()
    }
}

impl Debug for VersionedValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "V{}[{:?}:{:?}]{}",
            self.id,
            self.value,
            self.expr,
            if self.is_in_core() { "(core)" } else { "" }
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AllocationKind {
    /// Scalar object with destructive versioning: the newest version wins.
    Singleton,
    /// Aggregate object, field-insensitive: all stores are kept.
    Composite,
    /// The distinguished environment object.
    Environment,
}

static NEXT_ALLOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// A memory object as seen by the dependency tracker. Singletons get a fresh
/// `Allocation` per version; composites keep one stable identity across
/// updates.
pub struct Allocation {
    site: Rc<IrValue>,
    kind: AllocationKind,
    id: u64,
}

impl Allocation {
    pub(crate) fn new(site: Rc<IrValue>, kind: AllocationKind) -> Rc<Allocation> {
        Rc::new(Allocation {
            site,
            kind,
            id: NEXT_ALLOCATION_ID.fetch_add(1, Ordering::Relaxed),
        })
    }

    pub fn site(&self) -> &Rc<IrValue> {
        &self.site
    }

    pub fn kind(&self) -> AllocationKind {
        self.kind
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Composites (and the environment) aggregate; only singletons are
    /// versioned and destructively updated.
    pub fn is_composite(&self) -> bool {
        self.kind != AllocationKind::Singleton
    }

    fn has_site(&self, site: &Rc<IrValue>) -> bool {
        self.site.id() == site.id()
    }
}

impl Debug for Allocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.kind {
            AllocationKind::Singleton => write!(f, "A(singleton)[{:?}]#{}", self.site, self.id),
            AllocationKind::Composite => write!(f, "A(composite)[{:?}]", self.site),
            AllocationKind::Environment => write!(f, "A[@environ]#{}", self.id),
        }
    }
}

/// "This value points to this allocation."
struct PointerEquality {
    value: Rc<VersionedValue>,
    allocation: Rc<Allocation>,
}

impl PointerEquality {
    fn equals(&self, value: &Rc<VersionedValue>) -> Option<Rc<Allocation>> {
        if self.value.id == value.id {
            Some(self.allocation.clone())
        } else {
            None
        }
    }
}

impl Debug for PointerEquality {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "({:?}=={:?})", self.value, self.allocation)
    }
}

/// "This allocation saw this value stored into it." For singletons the cell
/// with the newest allocation version is the one later reads observe.
struct StorageCell {
    allocation: Rc<Allocation>,
    value: Rc<VersionedValue>,
}

impl StorageCell {
    fn stored_in(&self, allocation: &Rc<Allocation>) -> Option<Rc<VersionedValue>> {
        if self.allocation.id == allocation.id {
            Some(self.value.clone())
        } else {
            None
        }
    }

    fn storage_of(&self, value: &Rc<VersionedValue>) -> Option<Rc<Allocation>> {
        if self.value.id == value.id {
            Some(self.allocation.clone())
        } else {
            None
        }
    }
}

impl Debug for StorageCell {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "[{:?},{:?}]", self.allocation, self.value)
    }
}

/// "The target's symbolic content depends on the source's", possibly routed
/// through an allocation during a load.
struct FlowsTo {
    source: Rc<VersionedValue>,
    target: Rc<VersionedValue>,
    via: Option<Rc<Allocation>>,
}

impl Debug for FlowsTo {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{:?}->{:?}", self.source, self.target)?;
        if let Some(via) = &self.via {
            write!(f, " via {:?}", via)?;
        }
        Ok(())
    }
}

/// The dependency context of one interpolation-tree node: what must hold
/// locally within this path so the generalized interpolant stays sound.
/// Lists are append-only within a node; queries consult the local lists and
/// then recurse into the parent chain.
pub struct Dependency {
    parent: Option<Rc<Dependency>>,
    values: RefCell<Vec<Rc<VersionedValue>>>,
    allocations: RefCell<Vec<Rc<Allocation>>>,
    equalities: RefCell<Vec<PointerEquality>>,
    storage: RefCell<Vec<StorageCell>>,
    flows: RefCell<Vec<FlowsTo>>,
    /// Sites that received a fresh singleton version in this node.
    new_versioned_allocations: RefCell<Vec<Rc<IrValue>>>,
    /// Sites that received a composite allocation in this node.
    new_composite_allocations: RefCell<Vec<Rc<IrValue>>>,
}

impl Dependency {
    pub fn new(parent: Option<Rc<Dependency>>) -> Rc<Dependency> {
        Rc::new(Dependency {
            parent,
            values: RefCell::new(Vec::new()),
            allocations: RefCell::new(Vec::new()),
            equalities: RefCell::new(Vec::new()),
            storage: RefCell::new(Vec::new()),
            flows: RefCell::new(Vec::new()),
            new_versioned_allocations: RefCell::new(Vec::new()),
            new_composite_allocations: RefCell::new(Vec::new()),
        })
    }

    pub fn parent(&self) -> Option<&Rc<Dependency>> {
        self.parent.as_ref()
    }

    fn get_new_versioned_value(&self, value: Rc<IrValue>, expr: ExprRef) -> Rc<VersionedValue> {
        let result = VersionedValue::new(value, expr);
        self.values.borrow_mut().push(result.clone());
        result
    }

    /// Creates the initial allocation for a site. Singleton and composite
    /// sites are registered so that core-expression snapshots can enumerate
    /// them later; the environment is registered in neither list.
    fn get_initial_allocation(
        &self,
        site: Rc<IrValue>,
        kind: AllocationKind,
    ) -> Rc<Allocation> {
        let allocation = Allocation::new(site.clone(), kind);
        trace!("new allocation {:?}", allocation);
        self.allocations.borrow_mut().push(allocation.clone());
        match kind {
            AllocationKind::Singleton => {
                self.new_versioned_allocations.borrow_mut().push(site);
            }
            AllocationKind::Composite => {
                self.new_composite_allocations.borrow_mut().push(site);
            }
            AllocationKind::Environment => {}
        }
        allocation
    }

    fn allocation_kind_for_site(site: &Rc<IrValue>) -> AllocationKind {
        if site.ty.is_composite() {
            AllocationKind::Composite
        } else {
            AllocationKind::Singleton
        }
    }

    /// All singleton sites introduced anywhere on the parent chain,
    /// parent-first.
    pub fn all_versioned_allocations(&self) -> Vec<Rc<IrValue>> {
        let mut result = match &self.parent {
            Some(parent) => parent.all_versioned_allocations(),
            None => Vec::new(),
        };
        result.extend(self.new_versioned_allocations.borrow().iter().cloned());
        result
    }

    /// All composite sites introduced anywhere on the parent chain,
    /// parent-first.
    pub fn all_composite_allocations(&self) -> Vec<Rc<IrValue>> {
        let mut result = match &self.parent {
            Some(parent) => parent.all_composite_allocations(),
            None => Vec::new(),
        };
        result.extend(self.new_composite_allocations.borrow().iter().cloned());
        result
    }

    /// The latest stored expression per singleton site. With
    /// `interpolant_only` the result is restricted to core-marked values and
    /// shadow-renamed for table-entry use.
    pub fn latest_core_expressions(
        &self,
        shadows: &mut ShadowArrays,
        replacements: &mut Vec<Rc<Array>>,
        interpolant_only: bool,
    ) -> HashMap<Rc<IrValue>, ExprRef> {
        let mut result = HashMap::new();
        for site in self.all_versioned_allocations() {
            let allocation = self.get_latest_allocation(&site);
            checked_assume!(allocation.is_some());
            let stored = self.stores(&allocation.unwrap());
            // Singletons are destructively updated; only the latest survives.
            checked_assume!(stored.len() <= 1);
            if let Some(value) = stored.first() {
                if !interpolant_only {
                    result.insert(site, value.expression().clone());
                } else if value.is_in_core() {
                    let renamed = shadows.shadow_expression(value.expression(), replacements);
                    result.insert(site, renamed);
                }
            }
        }
        result
    }

    /// All stored expressions per composite site, aggregated along the parent
    /// chain.
    pub fn composite_core_expressions(
        &self,
        shadows: &mut ShadowArrays,
        replacements: &mut Vec<Rc<Array>>,
        interpolant_only: bool,
    ) -> HashMap<Rc<IrValue>, Vec<ExprRef>> {
        let mut result: HashMap<Rc<IrValue>, Vec<ExprRef>> = HashMap::new();
        for site in self.all_composite_allocations() {
            let allocation = self.get_latest_allocation(&site);
            checked_assume!(allocation.is_some());
            for value in self.stores(&allocation.unwrap()) {
                if !interpolant_only {
                    result
                        .entry(site.clone())
                        .or_insert_with(Vec::new)
                        .push(value.expression().clone());
                } else if value.is_in_core() {
                    let renamed = shadows.shadow_expression(value.expression(), replacements);
                    result
                        .entry(site.clone())
                        .or_insert_with(Vec::new)
                        .push(renamed);
                }
            }
        }
        result
    }

    /// The newest versioned value recorded for the program value, local list
    /// first, then the parent chain.
    pub fn get_latest_value(&self, value: &Rc<IrValue>) -> Option<Rc<VersionedValue>> {
        let local = self
            .values
            .borrow()
            .iter()
            .rev()
            .find(|v| v.has_value(value))
            .cloned();
        if local.is_some() {
            return local;
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.get_latest_value(value))
    }

    /// The newest allocation recorded for the site, local list first, then
    /// the parent chain.
    pub fn get_latest_allocation(&self, site: &Rc<IrValue>) -> Option<Rc<Allocation>> {
        let local = self
            .allocations
            .borrow()
            .iter()
            .rev()
            .find(|a| a.has_site(site))
            .cloned();
        if local.is_some() {
            return local;
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.get_latest_allocation(site))
    }

    fn latest_environment_allocation(&self) -> Option<Rc<Allocation>> {
        let local = self
            .allocations
            .borrow()
            .iter()
            .rev()
            .find(|a| a.kind == AllocationKind::Environment)
            .cloned();
        if local.is_some() {
            return local;
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.latest_environment_allocation())
    }

    /// The allocation the value directly points to, if a pointer equality
    /// exists anywhere on the chain.
    fn resolve_allocation(&self, value: &Rc<VersionedValue>) -> Option<Rc<Allocation>> {
        let local = self
            .equalities
            .borrow()
            .iter()
            .rev()
            .find_map(|eq| eq.equals(value));
        if local.is_some() {
            return local;
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.resolve_allocation(value))
    }

    /// Pointer equalities first; when they yield nothing the leaf flow
    /// sources of the value are resolved instead.
    pub fn resolve_allocation_transitively(
        &self,
        value: &Rc<VersionedValue>,
    ) -> Vec<Rc<Allocation>> {
        if let Some(single) = self.resolve_allocation(value) {
            return vec![single];
        }
        let mut result = Vec::new();
        for source in self.all_flow_sources_ends(value) {
            if let Some(allocation) = self.resolve_allocation(&source) {
                result.push(allocation);
            }
        }
        result
    }

    fn add_pointer_equality(&self, value: Rc<VersionedValue>, allocation: Rc<Allocation>) {
        self.equalities
            .borrow_mut()
            .push(PointerEquality { value, allocation });
    }

    fn update_store(&self, allocation: Rc<Allocation>, value: Rc<VersionedValue>) {
        self.storage
            .borrow_mut()
            .push(StorageCell { allocation, value });
    }

    fn add_flow(&self, source: Rc<VersionedValue>, target: Rc<VersionedValue>) {
        self.flows.borrow_mut().push(FlowsTo {
            source,
            target,
            via: None,
        });
    }

    fn add_flow_via_allocation(
        &self,
        source: Rc<VersionedValue>,
        target: Rc<VersionedValue>,
        via: Rc<Allocation>,
    ) {
        self.flows.borrow_mut().push(FlowsTo {
            source,
            target,
            via: Some(via),
        });
    }

    /// The values stored in the allocation: the whole history for composites
    /// (field-insensitive aggregation, parent chain included), the first
    /// match for singletons (destructive update).
    pub fn stores(&self, allocation: &Rc<Allocation>) -> Vec<Rc<VersionedValue>> {
        if allocation.is_composite() {
            let mut result: Vec<Rc<VersionedValue>> = match &self.parent {
                Some(parent) => parent.stores(allocation),
                None => Vec::new(),
            };
            result.extend(
                self.storage
                    .borrow()
                    .iter()
                    .filter_map(|cell| cell.stored_in(allocation)),
            );
            return result;
        }
        let local = self
            .storage
            .borrow()
            .iter()
            .find_map(|cell| cell.stored_in(allocation));
        if let Some(value) = local {
            return vec![value];
        }
        match &self.parent {
            Some(parent) => parent.stores(allocation),
            None => Vec::new(),
        }
    }

    fn direct_local_flow_sources(&self, target: &Rc<VersionedValue>) -> Vec<Rc<VersionedValue>> {
        self.flows
            .borrow()
            .iter()
            .filter(|flow| flow.target.id == target.id)
            .map(|flow| flow.source.clone())
            .collect()
    }

    fn direct_flow_sources(&self, target: &Rc<VersionedValue>) -> Vec<Rc<VersionedValue>> {
        let mut result = self.direct_local_flow_sources(target);
        if let Some(parent) = &self.parent {
            result.extend(parent.direct_flow_sources(target));
        }
        result
    }

    /// The transitive flow sources of the target, target included, without
    /// duplicates.
    pub fn all_flow_sources(&self, target: &Rc<VersionedValue>) -> Vec<Rc<VersionedValue>> {
        let step_sources = self.direct_flow_sources(target);
        let mut result = step_sources.clone();
        for source in step_sources {
            result.extend(self.all_flow_sources(&source));
        }
        result.push(target.clone());
        result.sort_by_key(|v| v.id);
        result.dedup_by_key(|v| v.id);
        result
    }

    /// The leaves of the flow graph reachable from the target; the target
    /// itself when it has no sources.
    fn all_flow_sources_ends(&self, target: &Rc<VersionedValue>) -> Vec<Rc<VersionedValue>> {
        let step_sources = self.direct_flow_sources(target);
        if step_sources.is_empty() {
            return vec![target.clone()];
        }
        let mut result = Vec::new();
        for source in step_sources {
            result.extend(self.all_flow_sources_ends(&source));
        }
        result.sort_by_key(|v| v.id);
        result.dedup_by_key(|v| v.id);
        result
    }

    /// Builds the actual-argument value list for a call, in reverse operand
    /// order. Actuals with no dependency record (constants) get an
    /// unregistered versioned value carrying the argument expression.
    fn populate_argument_values_list(
        &self,
        site: &Rc<Instruction>,
        arguments: &[ExprRef],
    ) -> Vec<Rc<VersionedValue>> {
        let mut result = Vec::new();
        for i in (0..site.operands.len()).rev() {
            let operand = &site.operands[i];
            match self.get_latest_value(operand) {
                Some(latest) => result.push(latest),
                None => result.push(VersionedValue::new(operand.clone(), arguments[i].clone())),
            }
        }
        result
    }

    /// Binds callee formals to the actuals' versioned values. A call with no
    /// known callee is not tracked.
    #[logfn_inputs(TRACE)]
    pub fn bind_call_arguments(&self, site: &Rc<Instruction>, arguments: &[ExprRef]) {
        if site.opcode != Opcode::Call && site.opcode != Opcode::Invoke {
            return;
        }
        if site.formals.is_empty() {
            return;
        }
        precondition!(site.operands.len() == arguments.len());
        let mut argument_values = self.populate_argument_values_list(site, arguments);
        for formal in site.formals.iter() {
            match argument_values.pop() {
                Some(actual) => {
                    let expr = actual.expression().clone();
                    let target = self.get_new_versioned_value(formal.clone(), expr);
                    self.add_flow(actual, target);
                }
                None => break,
            }
        }
    }

    /// Binds the call site's result to the value returned by the callee.
    #[logfn_inputs(TRACE)]
    pub fn bind_return_value(
        &self,
        site: &Rc<Instruction>,
        ret: &Rc<Instruction>,
        return_value: ExprRef,
    ) {
        if site.opcode != Opcode::Call || ret.opcode != Opcode::Ret {
            return;
        }
        if let Some(returned) = ret.operands.first() {
            if let Some(value) = self.get_latest_value(returned) {
                let target = self.get_new_versioned_value(site.value.clone(), return_value);
                self.add_flow(value, target);
            }
        }
    }

    /// Marks the value's full flow closure as core and records the allocation
    /// edges the closure traverses into the graph.
    #[logfn_inputs(TRACE)]
    pub fn mark_all_values(&self, graph: &mut AllocationGraph, value: &Rc<VersionedValue>) {
        self.build_allocation_graph(graph, value);
        for source in self.all_flow_sources(value) {
            source.mark_in_core();
        }
    }

    /// The direct allocation sources of a value in this context: pairs of
    /// (source value, allocation flowed through). A pair with no source means
    /// the value sits in a store cell; a pair with no allocation means a pure
    /// flow edge that still needs ancestral resolution.
    fn direct_local_allocation_sources(
        &self,
        target: &Rc<VersionedValue>,
    ) -> BTreeMap<Option<u64>, (Option<Rc<VersionedValue>>, Option<Rc<Allocation>>)> {
        let mut result: BTreeMap<Option<u64>, (Option<Rc<VersionedValue>>, Option<Rc<Allocation>>)> =
            BTreeMap::new();
        let flows: Vec<(Rc<VersionedValue>, Option<Rc<Allocation>>)> = self
            .flows
            .borrow()
            .iter()
            .filter(|flow| flow.target.id == target.id)
            .map(|flow| (flow.source.clone(), flow.via.clone()))
            .collect();
        for (source, via) in flows {
            match via {
                None => {
                    let extra = self.direct_local_allocation_sources(&source);
                    if !extra.is_empty() {
                        for (key, entry) in extra {
                            result.entry(key).or_insert(entry);
                        }
                    } else {
                        result.insert(Some(source.id), (Some(source), None));
                    }
                }
                Some(allocation) => {
                    result.insert(Some(source.id), (Some(source), Some(allocation)));
                }
            }
        }
        if result.is_empty() {
            // Fall back to the local store: the value may have been written
            // into an allocation without a recorded source.
            let stored = self
                .storage
                .borrow()
                .iter()
                .find_map(|cell| cell.storage_of(target));
            if let Some(allocation) = stored {
                result.insert(None, (None, Some(allocation)));
            }
        }
        result
    }

    /// Like `direct_local_allocation_sources` but consults the parent chain
    /// and resolves pairs that lack an allocation through ancestors.
    fn direct_allocation_sources(
        &self,
        target: &Rc<VersionedValue>,
    ) -> BTreeMap<Option<u64>, (Option<Rc<VersionedValue>>, Option<Rc<Allocation>>)> {
        let mut result = self.direct_local_allocation_sources(target);
        if result.is_empty() {
            if let Some(parent) = &self.parent {
                return parent.direct_allocation_sources(target);
            }
            return result;
        }
        let unresolved: Vec<Option<u64>> = result
            .iter()
            .filter(|(_, (_, allocation))| allocation.is_none())
            .map(|(key, _)| *key)
            .collect();
        let mut ancestral = BTreeMap::new();
        for key in unresolved {
            if let Some((Some(source), _)) = result.remove(&key) {
                if let Some(parent) = &self.parent {
                    for (k, entry) in parent.direct_allocation_sources(&source) {
                        ancestral.entry(k).or_insert(entry);
                    }
                }
            }
        }
        for (key, entry) in ancestral {
            result.entry(key).or_insert(entry);
        }
        result
    }

    /// Inserts the allocation edges feeding the target into the graph,
    /// returning the allocations that received at least one new edge. The
    /// pruning keeps diamond-shaped flow from exploding the recursion.
    pub fn build_allocation_graph(
        &self,
        graph: &mut AllocationGraph,
        target: &Rc<VersionedValue>,
    ) -> Vec<Rc<Allocation>> {
        trace!("build allocation graph of {:?}", target);
        let mut result = Vec::new();
        let source_edges = self.direct_allocation_sources(target);
        for (_, (source, allocation)) in source_edges {
            let source = match source {
                Some(source) => source,
                None => {
                    if let Some(allocation) = allocation {
                        result.push(allocation);
                    }
                    continue;
                }
            };
            let source_allocations = self.build_allocation_graph(graph, &source);
            if source_allocations.is_empty() {
                if let Some(allocation) = allocation {
                    result.push(allocation);
                }
            } else if let Some(allocation) = allocation {
                let mut new_source_added = false;
                for source_allocation in source_allocations {
                    if source_allocation.id != allocation.id
                        && graph.add_new_edge(&source_allocation, &allocation)
                    {
                        new_source_added = true;
                    }
                }
                if new_source_added {
                    result.push(allocation);
                }
            }
        }
        result
    }

    /// Drains the allocation graph, marking the store cell of every consumed
    /// singleton sink so its symbolic content reaches the next table entry.
    pub fn compute_core_allocations(&self, graph: &mut AllocationGraph) {
        let mut consumed: Vec<u64> = Vec::new();
        loop {
            let sinks: Vec<Rc<Allocation>> = graph
                .sink_allocations()
                .into_iter()
                .filter(|a| !consumed.contains(&a.id))
                .collect();
            if sinks.is_empty() {
                break;
            }
            for allocation in sinks {
                graph.consume_sink_node(&allocation);
                consumed.push(allocation.id);
                if !allocation.is_composite() {
                    if let Some(value) = self.stores(&allocation).first() {
                        value.mark_in_core();
                    }
                }
            }
        }
    }

    /// Load handling: resolve the address transitively; propagate pointer
    /// equalities or flow edges from stored values, or store a fresh value
    /// when the cell was never written. Returns false when the address has no
    /// dependency record at all.
    fn build_load_dependency(
        &self,
        from: &Rc<IrValue>,
        to: &Rc<IrValue>,
        to_expr: &ExprRef,
    ) -> bool {
        let address = match self.get_latest_value(from) {
            Some(address) => address,
            None => return false,
        };
        let allocations = self.resolve_allocation_transitively(&address);
        if allocations.is_empty() {
            return false;
        }
        for allocation in allocations {
            let stored = self.stores(&allocation);
            if stored.is_empty() {
                // Nothing was ever stored here; invent the cell's current
                // content and make the loaded value its first observer.
                let fresh = self.get_new_versioned_value(to.clone(), to_expr.clone());
                self.update_store(allocation.clone(), fresh);
                continue;
            }
            for value in stored {
                let pointed = self.resolve_allocation_transitively(&value);
                if !pointed.is_empty() {
                    let loaded = self.get_new_versioned_value(to.clone(), to_expr.clone());
                    for target_allocation in pointed {
                        self.add_pointer_equality(loaded.clone(), target_allocation);
                    }
                } else {
                    let loaded = self.get_new_versioned_value(to.clone(), to_expr.clone());
                    self.add_flow_via_allocation(value.clone(), loaded, allocation.clone());
                }
            }
        }
        true
    }

    /// Updates the context for one executed instruction. `args[0]` carries
    /// the expression the executor produced for the instruction's result (the
    /// stored data for a store).
    ///
    /// Calls and returns go through `bind_call_arguments`/`bind_return_value`
    /// instead. The traversal results are deliberately not cached in the
    /// relation lists; the quadratic blow-up is confined to queries.
    #[logfn_inputs(TRACE)]
    pub fn execute(&self, instr: &Rc<Instruction>, args: &[ExprRef]) {
        precondition!(
            instr.opcode != Opcode::Call
                && instr.opcode != Opcode::Invoke
                && instr.opcode != Opcode::Ret,
            "calls and returns are bound, not executed"
        );
        precondition!(!args.is_empty());
        let value_expr = &args[0];
        match instr.opcode {
            Opcode::Alloca => {
                let kind = if instr.is_composite_site() {
                    AllocationKind::Composite
                } else {
                    AllocationKind::Singleton
                };
                let allocation = self.get_initial_allocation(instr.value.clone(), kind);
                let value = self.get_new_versioned_value(instr.value.clone(), value_expr.clone());
                self.add_pointer_equality(value, allocation);
            }
            Opcode::Load => {
                if instr.is_environment_load() {
                    // The environment address is never allocated inside the
                    // program; version it on first use.
                    let allocation = match self.latest_environment_allocation() {
                        Some(allocation) => allocation,
                        None => self.get_initial_allocation(
                            instr.value.clone(),
                            AllocationKind::Environment,
                        ),
                    };
                    let value =
                        self.get_new_versioned_value(instr.value.clone(), value_expr.clone());
                    self.add_pointer_equality(value, allocation);
                    return;
                }
                let address = &instr.operands[0];
                if !self.build_load_dependency(address, &instr.value, value_expr) {
                    let kind = Dependency::allocation_kind_for_site(address);
                    let allocation = self.get_initial_allocation(address.clone(), kind);
                    let value =
                        self.get_new_versioned_value(instr.value.clone(), value_expr.clone());
                    self.update_store(allocation, value);
                }
            }
            Opcode::Store => {
                let data_operand = &instr.operands[0];
                let address_operand = &instr.operands[1];
                let data = match self.get_latest_value(data_operand) {
                    Some(data) => data,
                    None => self.get_new_versioned_value(data_operand.clone(), value_expr.clone()),
                };
                let address = self.get_latest_value(address_operand);
                precondition!(address.is_some(), "store address is not tracked");
                let targets = self.resolve_allocation_transitively(&address.unwrap());
                for target in targets {
                    let latest = self.get_latest_allocation(target.site());
                    let allocation = match latest {
                        Some(allocation) if allocation.is_composite() => allocation,
                        _ => {
                            // A singleton gets a fresh version; later reads
                            // observe only this newest binding.
                            let allocation = self.get_initial_allocation(
                                target.site().clone(),
                                AllocationKind::Singleton,
                            );
                            let version = self.get_new_versioned_value(
                                target.site().clone(),
                                value_expr.clone(),
                            );
                            self.add_pointer_equality(version, allocation.clone());
                            allocation
                        }
                    };
                    self.update_store(allocation, data.clone());
                }
            }
            Opcode::GetElementPtr => {
                let base = &instr.operands[0];
                if base.is_constant() {
                    // A constant global is bound field-insensitively: the
                    // element pointer aliases the whole object.
                    let allocation = match self.get_latest_allocation(base) {
                        Some(allocation) => allocation,
                        None => self.get_initial_allocation(
                            base.clone(),
                            Dependency::allocation_kind_for_site(base),
                        ),
                    };
                    let value =
                        self.get_new_versioned_value(instr.value.clone(), value_expr.clone());
                    self.add_pointer_equality(value, allocation);
                    return;
                }
                let argument = self.get_latest_value(base);
                precondition!(argument.is_some(), "pointer arithmetic base not found");
                let argument = argument.unwrap();
                let allocations = self.resolve_allocation_transitively(&argument);
                if !allocations.is_empty() {
                    let value =
                        self.get_new_versioned_value(instr.value.clone(), value_expr.clone());
                    for allocation in allocations {
                        self.add_pointer_equality(value.clone(), allocation);
                    }
                } else {
                    let sources = self.direct_flow_sources(&argument);
                    if !sources.is_empty() {
                        let value =
                            self.get_new_versioned_value(instr.value.clone(), value_expr.clone());
                        for source in sources {
                            self.add_flow(source, value.clone());
                        }
                    }
                }
            }
            opcode if opcode.is_cast() => {
                match self.get_latest_value(&instr.operands[0]) {
                    Some(operand) => {
                        let value =
                            self.get_new_versioned_value(instr.value.clone(), value_expr.clone());
                        self.add_flow(operand, value);
                    }
                    None => {
                        // Constants kill dependencies; anything else missing
                        // is an executor-contract violation.
                        precondition!(
                            instr.operands[0].is_constant(),
                            "cast operand not found"
                        );
                    }
                }
            }
            Opcode::Select => {
                let consequent = self.get_latest_value(&instr.operands[1]);
                let alternate = self.get_latest_value(&instr.operands[2]);
                let mut value = None;
                if let Some(consequent) = consequent {
                    let target =
                        self.get_new_versioned_value(instr.value.clone(), value_expr.clone());
                    self.add_flow(consequent, target.clone());
                    value = Some(target);
                }
                if let Some(alternate) = alternate {
                    let target = value.unwrap_or_else(|| {
                        self.get_new_versioned_value(instr.value.clone(), value_expr.clone())
                    });
                    self.add_flow(alternate, target);
                }
            }
            Opcode::Phi => {
                // A single execution path reaches this node, so the first
                // incoming value that exists locally is the one that flowed.
                for incoming in instr.operands.iter() {
                    if let Some(value) = self.get_latest_value(incoming) {
                        let target =
                            self.get_new_versioned_value(instr.value.clone(), value_expr.clone());
                        self.add_flow(value, target);
                        break;
                    }
                }
            }
            opcode if opcode.is_binary() => {
                let lhs = self.get_latest_value(&instr.operands[0]);
                let rhs = self.get_latest_value(&instr.operands[1]);
                let mut value = None;
                if let Some(lhs) = lhs {
                    let target =
                        self.get_new_versioned_value(instr.value.clone(), value_expr.clone());
                    self.add_flow(lhs, target.clone());
                    value = Some(target);
                }
                if let Some(rhs) = rhs {
                    let target = value.unwrap_or_else(|| {
                        self.get_new_versioned_value(instr.value.clone(), value_expr.clone())
                    });
                    self.add_flow(rhs, target);
                }
            }
            _ => {}
        }
    }
}

impl Debug for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "EQUALITIES: {:?}", self.equalities.borrow())?;
        writeln!(f, "STORAGE: {:?}", self.storage.borrow())?;
        write!(f, "FLOWS: {:?}", self.flows.borrow())?;
        if let Some(parent) = &self.parent {
            write!(f, "\n--- parent ---\n{:?}", parent)?;
        }
        Ok(())
    }
}
