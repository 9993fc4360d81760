//! The SSA instruction stream: operand encoding, the instruction set, basic
//! blocks, and the compiled-function record a frame is built from.

use faxc_util::{define_idx, index_vec::IndexVec, FastKey, Span};
use fgc::Value;

define_idx!(SlotId);
define_idx!(RefslotId);
define_idx!(BlockId);
define_idx!(UserFunctionId);

/// An operand: a frame slot, a refslot (a cached pointer to a property
/// entry inside some closed object), or an inline immediate value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg {
    Slot(SlotId),
    Refslot(RefslotId),
    Value(Value),
}

/// A write destination. Writing through a refslot stores directly into the
/// property entry the refslot was defined against, bypassing a table probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WriteArg {
    Slot(SlotId),
    Refslot(RefslotId),
}

/// Selects which of the three property-write rules an assignment uses.
pub use fgc::object::SetMode;

/// One pre-baked key/constraint/slot/refslot entry of an
/// [`Instr::AllocStaticObject`] table template.
#[derive(Debug, Clone)]
pub struct StaticObjectField {
    pub key: FastKey,
    pub constraint: Option<Arg>,
    pub value: Arg,
    pub refslot: Option<RefslotId>,
}

/// The instruction set. The "Optimized" group (`AccessStringKey` and
/// friends) is only ever produced by the optimizer; the builder emits only
/// the generic forms.
#[derive(Debug, Clone)]
pub enum InstrKind {
    // -- Allocation --
    AllocObject { parent: Arg },
    AllocIntObject { value: Arg },
    AllocBoolObject { value: Arg },
    AllocFloatObject { value: Arg },
    /// The literal's bytes are embedded directly rather than routed through
    /// [`Arg`] — `Value` has no string variant; strings only exist as heap
    /// objects, so there's no immediate form to carry one in an operand.
    AllocStringObject { value: faxc_util::Symbol },
    AllocArrayObject { values: Vec<Arg> },
    AllocClosureObject { context: Arg, function: UserFunctionId },
    AllocStaticObject { parent: Arg, fields: Vec<StaticObjectField> },

    // -- Table ops --
    Access { obj: Arg, key: Arg },
    Assign { obj: Arg, key: Arg, value: Arg, mode: SetMode },
    KeyInObj { obj: Arg, key: Arg },
    SetConstraint { obj: Arg, key: Arg, constraint: Arg },
    CloseObject { obj: Arg },
    FreezeObject { obj: Arg },

    // -- Type ops --
    Identical { a: Arg, b: Arg },
    InstanceOf { obj: Arg, proto: Arg },
    Test { value: Arg },

    // -- Control --
    Br { target: BlockId },
    TestBr { cond: Arg, true_blk: BlockId, false_blk: BlockId },
    Return { value: Arg },
    Phi { incoming: Vec<(BlockId, Arg)> },

    // -- Call --
    Call { callee: Arg, this: Arg, args: Vec<Arg> },

    // -- Optimized forms --
    AccessStringKey { obj: Arg, key: FastKey },
    AssignStringKey { obj: Arg, key: FastKey, value: Arg, mode: SetMode },
    StringKeyInObj { obj: Arg, key: FastKey },
    SetConstraintStringKey { obj: Arg, key: FastKey, constraint: Arg },
    DefineRefslot { obj: Arg, key: FastKey, refslot: RefslotId },
    Move { src: Arg },
    CallFunctionDirect { function: UserFunctionId, this: Arg, args: Vec<Arg> },
}

impl InstrKind {
    /// True for the three control-flow terminators. A block's instruction
    /// run must end with exactly one of these.
    pub fn is_terminator(&self) -> bool {
        matches!(self, InstrKind::Br { .. } | InstrKind::TestBr { .. } | InstrKind::Return { .. })
    }

    /// Visits every [`Arg`] operand this instruction reads (not counting
    /// its write destination). Used by dead-store elimination and the
    /// refslot/constant-propagation passes to find uses.
    pub fn for_each_read_arg(&self, mut f: impl FnMut(Arg)) {
        match self {
            InstrKind::AllocObject { parent } => f(*parent),
            InstrKind::AllocIntObject { value }
            | InstrKind::AllocBoolObject { value }
            | InstrKind::AllocFloatObject { value } => f(*value),
            InstrKind::AllocStringObject { .. } => {}
            InstrKind::AllocArrayObject { values } => values.iter().for_each(|a| f(*a)),
            InstrKind::AllocClosureObject { context, .. } => f(*context),
            InstrKind::AllocStaticObject { parent, fields } => {
                f(*parent);
                for field in fields {
                    if let Some(c) = field.constraint {
                        f(c);
                    }
                    f(field.value);
                }
            }
            InstrKind::Access { obj, key } => {
                f(*obj);
                f(*key);
            }
            InstrKind::Assign { obj, key, value, .. } => {
                f(*obj);
                f(*key);
                f(*value);
            }
            InstrKind::KeyInObj { obj, key } => {
                f(*obj);
                f(*key);
            }
            InstrKind::SetConstraint { obj, key, constraint } => {
                f(*obj);
                f(*key);
                f(*constraint);
            }
            InstrKind::CloseObject { obj } | InstrKind::FreezeObject { obj } => f(*obj),
            InstrKind::Identical { a, b } => {
                f(*a);
                f(*b);
            }
            InstrKind::InstanceOf { obj, proto } => {
                f(*obj);
                f(*proto);
            }
            InstrKind::Test { value } => f(*value),
            InstrKind::Br { .. } => {}
            InstrKind::TestBr { cond, .. } => f(*cond),
            InstrKind::Return { value } => f(*value),
            InstrKind::Phi { incoming } => incoming.iter().for_each(|(_, a)| f(*a)),
            InstrKind::Call { callee, this, args } => {
                f(*callee);
                f(*this);
                args.iter().for_each(|a| f(*a));
            }
            InstrKind::AccessStringKey { obj, .. } => f(*obj),
            InstrKind::AssignStringKey { obj, value, .. } => {
                f(*obj);
                f(*value);
            }
            InstrKind::StringKeyInObj { obj, .. } => f(*obj),
            InstrKind::SetConstraintStringKey { obj, constraint, .. } => {
                f(*obj);
                f(*constraint);
            }
            InstrKind::DefineRefslot { obj, .. } => f(*obj),
            InstrKind::Move { src } => f(*src),
            InstrKind::CallFunctionDirect { this, args, .. } => {
                f(*this);
                args.iter().for_each(|a| f(*a));
            }
        }
    }
}

/// One instruction: its operation, where its result (if any) is written,
/// the context slot it runs under (a GC anchor for the active scope chain,
/// and the signal that this instruction may suspend into native code via
/// reentrant sub-VM dispatch), and its source provenance.
#[derive(Debug, Clone)]
pub struct Instr {
    pub kind: InstrKind,
    pub write: Option<WriteArg>,
    pub context: Arg,
    pub span: Span,
}

impl Instr {
    /// Whether this instruction's handler may recurse into a sub-VM (an
    /// operator overload, `toString`, or an iterator protocol call).
    pub fn may_suspend(&self) -> bool {
        matches!(
            self.kind,
            InstrKind::Access { .. }
                | InstrKind::Assign { .. }
                | InstrKind::AccessStringKey { .. }
                | InstrKind::AssignStringKey { .. }
                | InstrKind::Call { .. }
                | InstrKind::CallFunctionDirect { .. }
        )
    }
}

/// A basic block: a contiguous run of instructions terminated by exactly
/// one control-flow instruction.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub instrs: Vec<Instr>,
}

/// The compiled body of a function: its block list plus (for dumps and
/// runtime diagnostics) the offset of each instruction within its block.
#[derive(Debug, Clone, Default)]
pub struct FunctionBody {
    pub blocks: IndexVec<BlockId, Block>,
}

impl FunctionBody {
    pub fn instr_count(&self) -> usize {
        self.blocks.as_slice().iter().map(|b| b.instrs.len()).sum()
    }
}

/// Optimization status of a [`UserFunction`]: parse-time inline passes have
/// either or haven't yet run, and separately, the full hot-call pipeline
/// has or hasn't. Once `non_ssa` is set the function may never be
/// optimized again — the last pass (register compaction) breaks the SSA
/// invariant every other pass depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptStatus {
    pub parse_time_done: bool,
    pub hot_pipeline_done: bool,
    pub non_ssa: bool,
}

/// A callable unit: a function or method literal, lowered to SSA IR, with
/// everything a callframe needs to execute it.
#[derive(Debug, Clone)]
pub struct UserFunction {
    pub name: Option<faxc_util::Symbol>,
    pub arity: usize,
    pub variadic_tail: bool,
    pub slot_count: usize,
    pub refslot_count: usize,
    pub is_method: bool,
    pub body: FunctionBody,
    pub num_called: u32,
    pub opt_status: OptStatus,
}

/// Everything lowered from one source module: the entry function (run with
/// context = the persistent root/scope object) plus every function literal
/// reachable from it, indexed by the [`UserFunctionId`]s its
/// `AllocClosureObject`/`CallFunctionDirect` instructions reference.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub functions: IndexVec<UserFunctionId, UserFunction>,
    pub entry: UserFunctionId,
}

impl CompiledModule {
    pub fn entry_function(&self) -> &UserFunction {
        &self.functions[self.entry]
    }
}

impl UserFunction {
    pub fn new(name: Option<faxc_util::Symbol>, arity: usize, variadic_tail: bool, is_method: bool) -> Self {
        Self {
            name,
            arity,
            variadic_tail,
            slot_count: 0,
            refslot_count: 0,
            is_method,
            body: FunctionBody::default(),
            num_called: 0,
            opt_status: OptStatus::default(),
        }
    }
}
