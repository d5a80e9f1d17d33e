// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use mirai_annotations::*;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result};
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// The width of an expression in bits.
pub type Width = u32;

/// The width of a Boolean expression.
pub const BOOL_WIDTH: Width = 1;

pub type ExprRef = Rc<Expr>;

static NEXT_ARRAY_ID: AtomicU64 = AtomicU64::new(1);

/// A named array of bit-vectors, the backing store for symbolic reads.
/// Arrays are compared by identity: two arrays with the same name but
/// different creation sites are distinct objects.
#[derive(Serialize, Deserialize, Clone, Eq, Ord, PartialOrd)]
pub struct Array {
    id: u64,
    pub name: String,
    pub size: u64,
    pub domain_width: Width,
    pub range_width: Width,
    /// Non-empty for constant-initialized arrays; element i is the raw bit
    /// pattern stored at index i.
    pub constant_values: Vec<u64>,
}

impl Array {
    pub fn new(name: String, size: u64, domain_width: Width, range_width: Width) -> Rc<Array> {
        Rc::new(Array {
            id: NEXT_ARRAY_ID.fetch_add(1, Ordering::Relaxed),
            name,
            size,
            domain_width,
            range_width,
            constant_values: Vec::new(),
        })
    }

    pub fn new_constant(
        name: String,
        domain_width: Width,
        range_width: Width,
        constant_values: Vec<u64>,
    ) -> Rc<Array> {
        Rc::new(Array {
            id: NEXT_ARRAY_ID.fetch_add(1, Ordering::Relaxed),
            name,
            size: constant_values.len() as u64,
            domain_width,
            range_width,
            constant_values,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_constant_array(&self) -> bool {
        !self.constant_values.is_empty()
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Array) -> bool {
        self.id == other.id
    }
}

impl Hash for Array {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.id);
    }
}

impl Debug for Array {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}[{}]", self.name, self.size)
    }
}

/// One write in an array update list: index := value, chained to the next
/// older update.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct UpdateNode {
    pub index: ExprRef,
    pub value: ExprRef,
    pub next: Option<Rc<UpdateNode>>,
}

pub type UpdateList = Option<Rc<UpdateNode>>;

/// The operator kinds of the expression algebra. Leaves are `Constant` and
/// `Read`; every interior node carries its child references directly.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ExprKind {
    /// A bit-vector literal; `bits` holds the two's-complement pattern
    /// truncated to `width` bits.
    Constant { bits: u64, width: Width },

    /// A read of `root` at `index` through the given update list.
    Read {
        root: Rc<Array>,
        updates: UpdateList,
        index: ExprRef,
    },

    /// Bit-vector concatenation; left becomes the high bits.
    Concat { left: ExprRef, right: ExprRef },

    /// The `width` bits of `expr` starting at bit `offset`.
    Extract {
        expr: ExprRef,
        offset: Width,
        width: Width,
    },

    ZExt { expr: ExprRef, width: Width },
    SExt { expr: ExprRef, width: Width },

    Add { left: ExprRef, right: ExprRef },
    Sub { left: ExprRef, right: ExprRef },
    Mul { left: ExprRef, right: ExprRef },
    UDiv { left: ExprRef, right: ExprRef },
    SDiv { left: ExprRef, right: ExprRef },
    URem { left: ExprRef, right: ExprRef },
    SRem { left: ExprRef, right: ExprRef },

    Not { operand: ExprRef },
    And { left: ExprRef, right: ExprRef },
    Or { left: ExprRef, right: ExprRef },
    Xor { left: ExprRef, right: ExprRef },
    Shl { left: ExprRef, right: ExprRef },
    LShr { left: ExprRef, right: ExprRef },
    AShr { left: ExprRef, right: ExprRef },

    Eq { left: ExprRef, right: ExprRef },
    Ne { left: ExprRef, right: ExprRef },
    Ult { left: ExprRef, right: ExprRef },
    Ule { left: ExprRef, right: ExprRef },
    Ugt { left: ExprRef, right: ExprRef },
    Uge { left: ExprRef, right: ExprRef },
    Slt { left: ExprRef, right: ExprRef },
    Sle { left: ExprRef, right: ExprRef },
    Sgt { left: ExprRef, right: ExprRef },
    Sge { left: ExprRef, right: ExprRef },

    /// `condition ? consequent : alternate`.
    Select {
        condition: ExprRef,
        consequent: ExprRef,
        alternate: ExprRef,
    },

    /// An existentially quantified body; the bound arrays are stored
    /// explicitly.
    Exists {
        bound: Vec<Rc<Array>>,
        body: ExprRef,
    },
}

/// An immutable expression tree node. The structural hash is computed once at
/// construction so that copies between maps do not rehash the whole tree.
#[derive(Serialize, Deserialize, Clone, Eq, Ord, PartialOrd)]
pub struct Expr {
    pub kind: ExprKind,
    hash: u64,
}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Expr) -> bool {
        self.hash == other.hash && self.kind == other.kind
    }
}

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Expr {
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        Expr {
            kind,
            hash: hasher.finish(),
        }
    }
}

impl Debug for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        use self::ExprKind::*;
        match &self.kind {
            Constant { bits, width } => write!(f, "{}:{}", bits, width),
            Read { root, index, .. } => write!(f, "read({:?}, {:?})", root, index),
            Concat { left, right } => write!(f, "concat({:?}, {:?})", left, right),
            Extract {
                expr,
                offset,
                width,
            } => write!(f, "extract({:?}, {}, {})", expr, offset, width),
            ZExt { expr, width } => write!(f, "zext({:?}, {})", expr, width),
            SExt { expr, width } => write!(f, "sext({:?}, {})", expr, width),
            Add { left, right } => write!(f, "({:?} + {:?})", left, right),
            Sub { left, right } => write!(f, "({:?} - {:?})", left, right),
            Mul { left, right } => write!(f, "({:?} * {:?})", left, right),
            UDiv { left, right } => write!(f, "({:?} /u {:?})", left, right),
            SDiv { left, right } => write!(f, "({:?} /s {:?})", left, right),
            URem { left, right } => write!(f, "({:?} %u {:?})", left, right),
            SRem { left, right } => write!(f, "({:?} %s {:?})", left, right),
            Not { operand } => write!(f, "!{:?}", operand),
            And { left, right } => write!(f, "({:?} & {:?})", left, right),
            Or { left, right } => write!(f, "({:?} | {:?})", left, right),
            Xor { left, right } => write!(f, "({:?} ^ {:?})", left, right),
            Shl { left, right } => write!(f, "({:?} << {:?})", left, right),
            LShr { left, right } => write!(f, "({:?} >>u {:?})", left, right),
            AShr { left, right } => write!(f, "({:?} >>s {:?})", left, right),
            Eq { left, right } => write!(f, "({:?} == {:?})", left, right),
            Ne { left, right } => write!(f, "({:?} != {:?})", left, right),
            Ult { left, right } => write!(f, "({:?} <u {:?})", left, right),
            Ule { left, right } => write!(f, "({:?} <=u {:?})", left, right),
            Ugt { left, right } => write!(f, "({:?} >u {:?})", left, right),
            Uge { left, right } => write!(f, "({:?} >=u {:?})", left, right),
            Slt { left, right } => write!(f, "({:?} <s {:?})", left, right),
            Sle { left, right } => write!(f, "({:?} <=s {:?})", left, right),
            Sgt { left, right } => write!(f, "({:?} >s {:?})", left, right),
            Sge { left, right } => write!(f, "({:?} >=s {:?})", left, right),
            Select {
                condition,
                consequent,
                alternate,
            } => write!(f, "({:?} ? {:?} : {:?})", condition, consequent, alternate),
            Exists { bound, body } => {
                let names: Vec<&str> = bound.iter().map(|a| a.name.as_str()).collect();
                write!(f, "(exists {:?} . {:?})", names, body)
            }
        }
    }
}

thread_local! {
    static INTERN_TABLE: RefCell<HashMap<Expr, ExprRef>> = RefCell::new(HashMap::new());
}

/// Returns the canonical reference for the given node, so that structurally
/// equal expressions are pointer-equal.
fn intern(kind: ExprKind) -> ExprRef {
    let expr = Expr::from(kind);
    INTERN_TABLE.with(|table| {
        let mut table = table.borrow_mut();
        if let Some(existing) = table.get(&expr) {
            return existing.clone();
        }
        let reference = Rc::new(expr.clone());
        table.insert(expr, reference.clone());
        reference
    })
}

fn truncate(bits: u64, width: Width) -> u64 {
    if width >= 64 {
        bits
    } else {
        bits & ((1u64 << width) - 1)
    }
}

fn sign_extend(bits: u64, width: Width) -> i64 {
    if width >= 64 {
        bits as i64
    } else {
        let shift = 64 - width;
        ((bits << shift) as i64) >> shift
    }
}

impl Expr {
    pub fn width(&self) -> Width {
        use self::ExprKind::*;
        match &self.kind {
            Constant { width, .. } => *width,
            Read { root, .. } => root.range_width,
            Concat { left, right } => left.width() + right.width(),
            Extract { width, .. } => *width,
            ZExt { width, .. } | SExt { width, .. } => *width,
            Add { left, .. }
            | Sub { left, .. }
            | Mul { left, .. }
            | UDiv { left, .. }
            | SDiv { left, .. }
            | URem { left, .. }
            | SRem { left, .. }
            | And { left, .. }
            | Or { left, .. }
            | Xor { left, .. }
            | Shl { left, .. }
            | LShr { left, .. }
            | AShr { left, .. } => left.width(),
            Not { operand } => operand.width(),
            Eq { .. } | Ne { .. } | Ult { .. } | Ule { .. } | Ugt { .. } | Uge { .. }
            | Slt { .. } | Sle { .. } | Sgt { .. } | Sge { .. } => BOOL_WIDTH,
            Select { consequent, .. } => consequent.width(),
            Exists { .. } => BOOL_WIDTH,
        }
    }

    /// The raw bit pattern and width, if this is a literal.
    pub fn as_constant(&self) -> Option<(u64, Width)> {
        if let ExprKind::Constant { bits, width } = self.kind {
            Some((bits, width))
        } else {
            None
        }
    }

    /// The sign-extended value, if this is a literal.
    pub fn as_signed_constant(&self) -> Option<i64> {
        self.as_constant()
            .map(|(bits, width)| sign_extend(bits, width))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, ExprKind::Constant { .. })
    }

    pub fn is_true(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Constant {
                bits: 1,
                width: BOOL_WIDTH
            }
        )
    }

    pub fn is_false(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Constant {
                bits: 0,
                width: BOOL_WIDTH
            }
        )
    }

    /// The direct children of this node, in operand order.
    pub fn children(&self) -> Vec<&ExprRef> {
        use self::ExprKind::*;
        match &self.kind {
            Constant { .. } => vec![],
            Read { index, .. } => vec![index],
            Extract { expr, .. } | ZExt { expr, .. } | SExt { expr, .. } => vec![expr],
            Not { operand } => vec![operand],
            Concat { left, right }
            | Add { left, right }
            | Sub { left, right }
            | Mul { left, right }
            | UDiv { left, right }
            | SDiv { left, right }
            | URem { left, right }
            | SRem { left, right }
            | And { left, right }
            | Or { left, right }
            | Xor { left, right }
            | Shl { left, right }
            | LShr { left, right }
            | AShr { left, right }
            | Eq { left, right }
            | Ne { left, right }
            | Ult { left, right }
            | Ule { left, right }
            | Ugt { left, right }
            | Uge { left, right }
            | Slt { left, right }
            | Sle { left, right }
            | Sgt { left, right }
            | Sge { left, right } => vec![left, right],
            Select {
                condition,
                consequent,
                alternate,
            } => vec![condition, consequent, alternate],
            Exists { body, .. } => vec![body],
        }
    }

    /// The left and right operands, if this node is a binary operator.
    pub fn binary_operands(&self) -> Option<(&ExprRef, &ExprRef)> {
        use self::ExprKind::*;
        match &self.kind {
            Add { left, right }
            | Sub { left, right }
            | Mul { left, right }
            | UDiv { left, right }
            | SDiv { left, right }
            | URem { left, right }
            | SRem { left, right }
            | And { left, right }
            | Or { left, right }
            | Xor { left, right }
            | Shl { left, right }
            | LShr { left, right }
            | AShr { left, right }
            | Eq { left, right }
            | Ne { left, right }
            | Ult { left, right }
            | Ule { left, right }
            | Ugt { left, right }
            | Uge { left, right }
            | Slt { left, right }
            | Sle { left, right }
            | Sgt { left, right }
            | Sge { left, right } => Some((left, right)),
            _ => None,
        }
    }

    /// True when the expression mentions any of the given arrays through a
    /// read.
    pub fn mentions_any_array(&self, arrays: &[Rc<Array>]) -> bool {
        if let ExprKind::Read { root, updates, .. } = &self.kind {
            if arrays.iter().any(|a| Rc::ptr_eq(a, root)) {
                return true;
            }
            let mut node = updates.clone();
            while let Some(update) = node {
                if update.index.mentions_any_array(arrays)
                    || update.value.mentions_any_array(arrays)
                {
                    return true;
                }
                node = update.next.clone();
            }
        }
        self.children().iter().any(|c| c.mentions_any_array(arrays))
    }

    /// The root array of a read, peeling concatenations of byte reads the way
    /// multi-byte values are laid out.
    pub fn read_root(this: &ExprRef) -> Option<Rc<Array>> {
        match &this.kind {
            ExprKind::Read { root, .. } => Some(root.clone()),
            ExprKind::Concat { right, .. } => Expr::read_root(right),
            _ => None,
        }
    }
}

/// Smart constructors. All of them fold constants, keep widths honest and
/// return interned references.
impl Expr {
    pub fn constant(bits: u64, width: Width) -> ExprRef {
        precondition!(width > 0 && width <= 64);
        intern(ExprKind::Constant {
            bits: truncate(bits, width),
            width,
        })
    }

    pub fn bool_constant(value: bool) -> ExprRef {
        Expr::constant(value as u64, BOOL_WIDTH)
    }

    pub fn read(root: Rc<Array>, updates: UpdateList, index: ExprRef) -> ExprRef {
        precondition!(index.width() == root.domain_width);
        if updates.is_none() && root.is_constant_array() {
            if let Some((i, _)) = index.as_constant() {
                if let Some(value) = root.constant_values.get(i as usize) {
                    return Expr::constant(*value, root.range_width);
                }
            }
        }
        intern(ExprKind::Read {
            root,
            updates,
            index,
        })
    }

    pub fn concat(left: ExprRef, right: ExprRef) -> ExprRef {
        let width = left.width() + right.width();
        precondition!(width <= 64);
        if let (Some((l, _)), Some((r, rw))) = (left.as_constant(), right.as_constant()) {
            return Expr::constant((l << rw) | r, width);
        }
        intern(ExprKind::Concat { left, right })
    }

    pub fn extract(expr: ExprRef, offset: Width, width: Width) -> ExprRef {
        precondition!(offset + width <= expr.width());
        if offset == 0 && width == expr.width() {
            return expr;
        }
        if let Some((bits, _)) = expr.as_constant() {
            return Expr::constant(bits >> offset, width);
        }
        intern(ExprKind::Extract {
            expr,
            offset,
            width,
        })
    }

    pub fn zext(expr: ExprRef, width: Width) -> ExprRef {
        precondition!(width >= expr.width());
        if width == expr.width() {
            return expr;
        }
        if let Some((bits, _)) = expr.as_constant() {
            return Expr::constant(bits, width);
        }
        intern(ExprKind::ZExt { expr, width })
    }

    pub fn sext(expr: ExprRef, width: Width) -> ExprRef {
        precondition!(width >= expr.width());
        if width == expr.width() {
            return expr;
        }
        if let Some((bits, w)) = expr.as_constant() {
            return Expr::constant(sign_extend(bits, w) as u64, width);
        }
        intern(ExprKind::SExt { expr, width })
    }

    fn commute(left: ExprRef, right: ExprRef) -> (ExprRef, ExprRef) {
        // Constants move to the left so that later pattern matches need only
        // check one side.
        if right.is_constant() && !left.is_constant() {
            (right, left)
        } else {
            (left, right)
        }
    }

    pub fn add(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        let width = left.width();
        if let (Some((l, _)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            return Expr::constant(l.wrapping_add(r), width);
        }
        let (left, right) = Expr::commute(left, right);
        if left.as_constant() == Some((0, width)) {
            return right;
        }
        intern(ExprKind::Add { left, right })
    }

    pub fn sub(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        let width = left.width();
        if let (Some((l, _)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            return Expr::constant(l.wrapping_sub(r), width);
        }
        if right.as_constant() == Some((0, width)) {
            return left;
        }
        intern(ExprKind::Sub { left, right })
    }

    pub fn mul(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        let width = left.width();
        if let (Some((l, _)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            return Expr::constant(l.wrapping_mul(r), width);
        }
        let (left, right) = Expr::commute(left, right);
        if left.as_constant() == Some((0, width)) {
            return left;
        }
        if left.as_constant() == Some((1, width)) {
            return right;
        }
        intern(ExprKind::Mul { left, right })
    }

    pub fn udiv(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some((l, _)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            if r != 0 {
                return Expr::constant(l / r, left.width());
            }
        }
        intern(ExprKind::UDiv { left, right })
    }

    pub fn sdiv(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some(l), Some(r)) = (left.as_signed_constant(), right.as_signed_constant()) {
            if r != 0 {
                return Expr::constant(l.wrapping_div(r) as u64, left.width());
            }
        }
        intern(ExprKind::SDiv { left, right })
    }

    pub fn urem(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some((l, _)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            if r != 0 {
                return Expr::constant(l % r, left.width());
            }
        }
        intern(ExprKind::URem { left, right })
    }

    pub fn srem(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some(l), Some(r)) = (left.as_signed_constant(), right.as_signed_constant()) {
            if r != 0 {
                return Expr::constant(l.wrapping_rem(r) as u64, left.width());
            }
        }
        intern(ExprKind::SRem { left, right })
    }

    pub fn not(operand: ExprRef) -> ExprRef {
        let width = operand.width();
        if let Some((bits, _)) = operand.as_constant() {
            return Expr::constant(!bits, width);
        }
        intern(ExprKind::Not { operand })
    }

    fn all_ones(width: Width) -> u64 {
        truncate(u64::max_value(), width)
    }

    pub fn and(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        let width = left.width();
        if let (Some((l, _)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            return Expr::constant(l & r, width);
        }
        let (left, right) = Expr::commute(left, right);
        if let Some((bits, _)) = left.as_constant() {
            if bits == 0 {
                return left;
            }
            if bits == Expr::all_ones(width) {
                return right;
            }
        }
        intern(ExprKind::And { left, right })
    }

    pub fn or(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        let width = left.width();
        if let (Some((l, _)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            return Expr::constant(l | r, width);
        }
        let (left, right) = Expr::commute(left, right);
        if let Some((bits, _)) = left.as_constant() {
            if bits == 0 {
                return right;
            }
            if bits == Expr::all_ones(width) {
                return left;
            }
        }
        intern(ExprKind::Or { left, right })
    }

    pub fn xor(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some((l, _)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            return Expr::constant(l ^ r, left.width());
        }
        let (left, right) = Expr::commute(left, right);
        if left.as_constant() == Some((0, right.width())) {
            return right;
        }
        intern(ExprKind::Xor { left, right })
    }

    pub fn shl(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some((l, w)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            if r < 64 {
                return Expr::constant(l << r, w);
            }
            return Expr::constant(0, w);
        }
        intern(ExprKind::Shl { left, right })
    }

    pub fn lshr(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some((l, w)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            if r < 64 {
                return Expr::constant(l >> r, w);
            }
            return Expr::constant(0, w);
        }
        intern(ExprKind::LShr { left, right })
    }

    pub fn ashr(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some((l, w)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            let value = sign_extend(l, w);
            let shift = if r < 63 { r } else { 63 };
            return Expr::constant((value >> shift) as u64, w);
        }
        intern(ExprKind::AShr { left, right })
    }

    pub fn equals(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if Rc::ptr_eq(&left, &right) || left == right {
            return Expr::bool_constant(true);
        }
        if let (Some(l), Some(r)) = (left.as_constant(), right.as_constant()) {
            return Expr::bool_constant(l == r);
        }
        let (left, right) = Expr::commute(left, right);
        if left.is_true() {
            return right;
        }
        intern(ExprKind::Eq { left, right })
    }

    pub fn not_equals(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if Rc::ptr_eq(&left, &right) || left == right {
            return Expr::bool_constant(false);
        }
        if let (Some(l), Some(r)) = (left.as_constant(), right.as_constant()) {
            return Expr::bool_constant(l != r);
        }
        let (left, right) = Expr::commute(left, right);
        intern(ExprKind::Ne { left, right })
    }

    pub fn ult(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some((l, _)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            return Expr::bool_constant(l < r);
        }
        intern(ExprKind::Ult { left, right })
    }

    pub fn ule(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some((l, _)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            return Expr::bool_constant(l <= r);
        }
        intern(ExprKind::Ule { left, right })
    }

    pub fn ugt(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some((l, _)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            return Expr::bool_constant(l > r);
        }
        intern(ExprKind::Ugt { left, right })
    }

    pub fn uge(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some((l, _)), Some((r, _))) = (left.as_constant(), right.as_constant()) {
            return Expr::bool_constant(l >= r);
        }
        intern(ExprKind::Uge { left, right })
    }

    pub fn slt(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some(l), Some(r)) = (left.as_signed_constant(), right.as_signed_constant()) {
            return Expr::bool_constant(l < r);
        }
        intern(ExprKind::Slt { left, right })
    }

    pub fn sle(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some(l), Some(r)) = (left.as_signed_constant(), right.as_signed_constant()) {
            return Expr::bool_constant(l <= r);
        }
        intern(ExprKind::Sle { left, right })
    }

    pub fn sgt(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some(l), Some(r)) = (left.as_signed_constant(), right.as_signed_constant()) {
            return Expr::bool_constant(l > r);
        }
        intern(ExprKind::Sgt { left, right })
    }

    pub fn sge(left: ExprRef, right: ExprRef) -> ExprRef {
        precondition!(left.width() == right.width());
        if let (Some(l), Some(r)) = (left.as_signed_constant(), right.as_signed_constant()) {
            return Expr::bool_constant(l >= r);
        }
        intern(ExprKind::Sge { left, right })
    }

    pub fn select(condition: ExprRef, consequent: ExprRef, alternate: ExprRef) -> ExprRef {
        precondition!(condition.width() == BOOL_WIDTH);
        precondition!(consequent.width() == alternate.width());
        if condition.is_true() {
            return consequent;
        }
        if condition.is_false() {
            return alternate;
        }
        intern(ExprKind::Select {
            condition,
            consequent,
            alternate,
        })
    }

    pub fn exists(bound: Vec<Rc<Array>>, body: ExprRef) -> ExprRef {
        if bound.is_empty() {
            return body;
        }
        intern(ExprKind::Exists { bound, body })
    }

    /// Rebuilds a binary node of the same operator kind as `original` with
    /// the given operands. A non-binary original is a schema mismatch.
    pub fn binary_of_same_kind(original: &ExprRef, left: ExprRef, right: ExprRef) -> ExprRef {
        use self::ExprKind::*;
        match &original.kind {
            Add { .. } => Expr::add(left, right),
            Sub { .. } => Expr::sub(left, right),
            Mul { .. } => Expr::mul(left, right),
            UDiv { .. } => Expr::udiv(left, right),
            SDiv { .. } => Expr::sdiv(left, right),
            URem { .. } => Expr::urem(left, right),
            SRem { .. } => Expr::srem(left, right),
            And { .. } => Expr::and(left, right),
            Or { .. } => Expr::or(left, right),
            Xor { .. } => Expr::xor(left, right),
            Shl { .. } => Expr::shl(left, right),
            LShr { .. } => Expr::lshr(left, right),
            AShr { .. } => Expr::ashr(left, right),
            Eq { .. } => Expr::equals(left, right),
            Ne { .. } => Expr::not_equals(left, right),
            Ult { .. } => Expr::ult(left, right),
            Ule { .. } => Expr::ule(left, right),
            Ugt { .. } => Expr::ugt(left, right),
            Uge { .. } => Expr::uge(left, right),
            Slt { .. } => Expr::slt(left, right),
            Sle { .. } => Expr::sle(left, right),
            Sgt { .. } => Expr::sgt(left, right),
            Sge { .. } => Expr::sge(left, right),
            _ => assume_unreachable!("not a binary expression: {:?}", original),
        }
    }

    /// Conjoins an optional accumulator with the next conjunct.
    pub fn conjoin(accumulator: Option<ExprRef>, conjunct: ExprRef) -> Option<ExprRef> {
        match accumulator {
            Some(acc) => Some(Expr::and(acc, conjunct)),
            None => Some(conjunct),
        }
    }
}
