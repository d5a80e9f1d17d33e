// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result};
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// The name of the distinguished environment symbol. A load whose address is
/// a constant with this name targets the environment allocation.
pub const ENVIRONMENT_NAME: &str = "__environ";

static NEXT_VALUE_ID: AtomicU64 = AtomicU64::new(1);

/// The subset of a value's type the dependency tracker cares about:
/// aggregates are tracked field-insensitively, scalars destructively.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash)]
pub enum IrType {
    Int(u32),
    Float(u32),
    Pointer,
    Array,
    Struct,
    Vector,
    Void,
}

impl IrType {
    /// Aggregate (and pointer-typed) allocations aggregate their stores; only
    /// scalar allocations are destructively versioned.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            IrType::Pointer | IrType::Array | IrType::Struct | IrType::Vector
        )
    }
}

/// How a value came to be. Constants never carry dependencies; constant
/// globals anchor field-insensitive pointer arithmetic.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum IrValueKind {
    Constant,
    GlobalConstant,
    Argument,
    Local,
}

/// An opaque program value handed in by the executor. Identity (not the name)
/// distinguishes values; the same `Rc` must be used for every occurrence of
/// one program value.
#[derive(Serialize, Deserialize, Clone, Eq)]
pub struct IrValue {
    id: u64,
    pub name: String,
    pub kind: IrValueKind,
    pub ty: IrType,
}

impl IrValue {
    pub fn new(name: &str, kind: IrValueKind, ty: IrType) -> Rc<IrValue> {
        Rc::new(IrValue {
            id: NEXT_VALUE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            kind,
            ty,
        })
    }

    pub fn constant(name: &str, ty: IrType) -> Rc<IrValue> {
        IrValue::new(name, IrValueKind::Constant, ty)
    }

    pub fn global_constant(name: &str, ty: IrType) -> Rc<IrValue> {
        IrValue::new(name, IrValueKind::GlobalConstant, ty)
    }

    pub fn argument(name: &str, ty: IrType) -> Rc<IrValue> {
        IrValue::new(name, IrValueKind::Argument, ty)
    }

    pub fn local(name: &str, ty: IrType) -> Rc<IrValue> {
        IrValue::new(name, IrValueKind::Local, ty)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            IrValueKind::Constant | IrValueKind::GlobalConstant
        )
    }
}

impl PartialEq for IrValue {
    fn eq(&self, other: &IrValue) -> bool {
        self.id == other.id
    }
}

impl Hash for IrValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.id);
    }
}

impl Debug for IrValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "%{}#{}", self.name, self.id)
    }
}

/// The operations of the register SSA instruction set, as dispatched by the
/// dependency tracker.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Opcode {
    Alloca,
    Load,
    Store,
    GetElementPtr,
    Trunc,
    ZExt,
    SExt,
    IntToPtr,
    PtrToInt,
    BitCast,
    FpTrunc,
    FpExt,
    FpToUi,
    FpToSi,
    UiToFp,
    SiToFp,
    ExtractValue,
    InsertValue,
    Select,
    Phi,
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    ICmp,
    FCmp,
    Call,
    Invoke,
    Ret,
    Br,
    Switch,
    Unreachable,
}

impl Opcode {
    pub fn is_cast(self) -> bool {
        use self::Opcode::*;
        matches!(
            self,
            Trunc
                | ZExt
                | SExt
                | IntToPtr
                | PtrToInt
                | BitCast
                | FpTrunc
                | FpExt
                | FpToUi
                | FpToSi
                | UiToFp
                | SiToFp
                | ExtractValue
        )
    }

    pub fn is_binary(self) -> bool {
        use self::Opcode::*;
        matches!(
            self,
            Add | Sub
                | Mul
                | UDiv
                | SDiv
                | URem
                | SRem
                | FAdd
                | FSub
                | FMul
                | FDiv
                | FRem
                | And
                | Or
                | Xor
                | Shl
                | LShr
                | AShr
                | ICmp
                | FCmp
                | InsertValue
        )
    }
}

/// One executed instruction, built by the executor. The instruction's own
/// `value` is both the SSA result identity and, for allocations, the
/// allocation site. Its id doubles as the program point when the instruction
/// leads a basic block.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct Instruction {
    pub value: Rc<IrValue>,
    pub opcode: Opcode,
    /// Operand order follows the IR: `Store` is (data, address), `Load` is
    /// (address), `Select` is (condition, true-value, false-value), `Call`
    /// lists the actual arguments only.
    pub operands: Vec<Rc<IrValue>>,
    /// For `Alloca`, the type of the allocated object.
    pub allocated_ty: Option<IrType>,
    /// For `Call`, the callee's formal parameters; empty when the callee is
    /// unknown and must not be tracked.
    pub formals: Vec<Rc<IrValue>>,
}

impl Instruction {
    pub fn new(value: Rc<IrValue>, opcode: Opcode, operands: Vec<Rc<IrValue>>) -> Rc<Instruction> {
        Rc::new(Instruction {
            value,
            opcode,
            operands,
            allocated_ty: None,
            formals: Vec::new(),
        })
    }

    pub fn alloca(value: Rc<IrValue>, allocated_ty: IrType) -> Rc<Instruction> {
        Rc::new(Instruction {
            value,
            opcode: Opcode::Alloca,
            operands: Vec::new(),
            allocated_ty: Some(allocated_ty),
            formals: Vec::new(),
        })
    }

    pub fn call(
        value: Rc<IrValue>,
        arguments: Vec<Rc<IrValue>>,
        formals: Vec<Rc<IrValue>>,
    ) -> Rc<Instruction> {
        Rc::new(Instruction {
            value,
            opcode: Opcode::Call,
            operands: arguments,
            allocated_ty: None,
            formals,
        })
    }

    /// The program point of this instruction, an opaque identity used to key
    /// the subsumption table when the instruction leads a basic block.
    pub fn program_point(&self) -> u64 {
        self.value.id()
    }

    /// True for a load whose address operand is the distinguished environment
    /// symbol.
    pub fn is_environment_load(&self) -> bool {
        self.opcode == Opcode::Load
            && self
                .operands
                .get(0)
                .map(|address| address.is_constant() && address.name == ENVIRONMENT_NAME)
                .unwrap_or(false)
    }

    /// True when the allocation this instruction introduces aggregates its
    /// stores instead of versioning them.
    pub fn is_composite_site(&self) -> bool {
        if self.is_environment_load() {
            return false;
        }
        if let Some(allocated) = &self.allocated_ty {
            return allocated.is_composite();
        }
        self.value.ty.is_composite()
    }
}

impl Debug for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{:?} {:?}{:?}", self.opcode, self.value, self.operands)
    }
}
