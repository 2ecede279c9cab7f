use std::rc::Rc;

use crate::val::Value;
use crate::vm::ClosureInfo;

/// Numeric opcodes of the serialized form. The order is part of the format.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Return = 0,
    Suspend,
    Resume,
    Nil,
    NilPush,
    Some,
    And,
    Or,
    Not,
    Push,
    Pop,
    Load,
    LoadPush,
    Enter,
    Exit,
    Goto,
    Try,
    Catch,
    CatchX,
    CatchType,
    Retry,
    Local,
    LocalPush,
    LocalI,
    Upvalue,
    Var,
    VarX,
    Let,
    LetI,
    LetX,
    Assign,
    AssignLocal,
    Call,
    CallConst,
    TailCall,
    TailCallConst,
    For,
    Iter,
    Next,
    Key,
    Value1,
    Value2,
    ListNew,
    ListAppend,
    MapNew,
    MapInsert,
    TupleNew,
    PartialNew,
    PartialSet,
    Closure,
    Switch,
    Resolve,
    StringNew,
    StringAdd,
    StringAdds,
    StringEnd,
}

impl Opcode {
    const TABLE: [Opcode; 56] = [
        Opcode::Return,
        Opcode::Suspend,
        Opcode::Resume,
        Opcode::Nil,
        Opcode::NilPush,
        Opcode::Some,
        Opcode::And,
        Opcode::Or,
        Opcode::Not,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Load,
        Opcode::LoadPush,
        Opcode::Enter,
        Opcode::Exit,
        Opcode::Goto,
        Opcode::Try,
        Opcode::Catch,
        Opcode::CatchX,
        Opcode::CatchType,
        Opcode::Retry,
        Opcode::Local,
        Opcode::LocalPush,
        Opcode::LocalI,
        Opcode::Upvalue,
        Opcode::Var,
        Opcode::VarX,
        Opcode::Let,
        Opcode::LetI,
        Opcode::LetX,
        Opcode::Assign,
        Opcode::AssignLocal,
        Opcode::Call,
        Opcode::CallConst,
        Opcode::TailCall,
        Opcode::TailCallConst,
        Opcode::For,
        Opcode::Iter,
        Opcode::Next,
        Opcode::Key,
        Opcode::Value1,
        Opcode::Value2,
        Opcode::ListNew,
        Opcode::ListAppend,
        Opcode::MapNew,
        Opcode::MapInsert,
        Opcode::TupleNew,
        Opcode::PartialNew,
        Opcode::PartialSet,
        Opcode::Closure,
        Opcode::Switch,
        Opcode::Resolve,
        Opcode::StringNew,
        Opcode::StringAdd,
        Opcode::StringAdds,
        Opcode::StringEnd,
    ];

    pub fn from_u8(code: u8) -> Option<Self> {
        Self::TABLE.get(code as usize).copied()
    }
}

/// Decoded instruction. Jump targets are instruction indices.
#[derive(Clone)]
pub enum Op {
    Return,
    // Mark suspended and hand the frame itself to the caller
    Suspend,
    // Clear suspension, drop the key/value pair left by Suspend
    Resume,
    Nil,
    NilPush,
    Some,
    And(usize /*target*/),
    Or(usize /*target*/),
    Not,
    Push,
    Pop,
    Load(Value),
    LoadPush(Value),
    Enter {
        vars: usize,
        lets: usize,
    },
    Exit(usize /*count*/),
    Goto(usize),
    Try(usize /*handler*/),
    Catch {
        handler: usize,
        depth: usize,
    },
    // Same as Catch but the error is discarded
    CatchX {
        handler: usize,
        depth: usize,
    },
    // Falls through when the error kind is listed, else jumps to `next`
    CatchType {
        next: usize,
        kinds: Vec<Rc<str>>,
    },
    Retry,
    Local(usize /*slot*/),
    LocalPush(usize /*slot*/),
    // Reads the slot, installing a placeholder named `name` if it is empty
    LocalI {
        slot: usize,
        name: Rc<str>,
    },
    Upvalue(usize),
    Var(usize /*slot*/),
    VarX {
        slot: usize,
        count: usize,
    },
    Let(usize /*slot*/),
    LetI(usize /*slot*/),
    LetX {
        slot: usize,
        count: usize,
    },
    Assign,
    AssignLocal(usize /*slot*/),
    Call(usize /*argc*/),
    CallConst {
        func: Value,
        count: usize,
    },
    TailCall(usize /*argc*/),
    TailCallConst {
        func: Value,
        count: usize,
    },
    For,
    Iter(usize /*exit*/),
    Next(usize /*loop head*/),
    Key,
    Value1,
    Value2,
    ListNew,
    ListAppend,
    MapNew,
    MapInsert,
    TupleNew(usize /*count*/),
    PartialNew(usize /*capacity*/),
    PartialSet(usize /*index*/),
    // Negative indices are outer upvalues (`!index`), others are stack slots
    Closure {
        info: Rc<ClosureInfo>,
        captures: Vec<i64>,
    },
    Switch(Vec<usize>),
    Resolve(Value),
    StringNew,
    StringAdd(usize /*count*/),
    StringAdds(Rc<str>),
    StringEnd,
}

impl Op {
    pub fn opcode(&self) -> Opcode {
        match self {
            Op::Return => Opcode::Return,
            Op::Suspend => Opcode::Suspend,
            Op::Resume => Opcode::Resume,
            Op::Nil => Opcode::Nil,
            Op::NilPush => Opcode::NilPush,
            Op::Some => Opcode::Some,
            Op::And(_) => Opcode::And,
            Op::Or(_) => Opcode::Or,
            Op::Not => Opcode::Not,
            Op::Push => Opcode::Push,
            Op::Pop => Opcode::Pop,
            Op::Load(_) => Opcode::Load,
            Op::LoadPush(_) => Opcode::LoadPush,
            Op::Enter { .. } => Opcode::Enter,
            Op::Exit(_) => Opcode::Exit,
            Op::Goto(_) => Opcode::Goto,
            Op::Try(_) => Opcode::Try,
            Op::Catch { .. } => Opcode::Catch,
            Op::CatchX { .. } => Opcode::CatchX,
            Op::CatchType { .. } => Opcode::CatchType,
            Op::Retry => Opcode::Retry,
            Op::Local(_) => Opcode::Local,
            Op::LocalPush(_) => Opcode::LocalPush,
            Op::LocalI { .. } => Opcode::LocalI,
            Op::Upvalue(_) => Opcode::Upvalue,
            Op::Var(_) => Opcode::Var,
            Op::VarX { .. } => Opcode::VarX,
            Op::Let(_) => Opcode::Let,
            Op::LetI(_) => Opcode::LetI,
            Op::LetX { .. } => Opcode::LetX,
            Op::Assign => Opcode::Assign,
            Op::AssignLocal(_) => Opcode::AssignLocal,
            Op::Call(_) => Opcode::Call,
            Op::CallConst { .. } => Opcode::CallConst,
            Op::TailCall(_) => Opcode::TailCall,
            Op::TailCallConst { .. } => Opcode::TailCallConst,
            Op::For => Opcode::For,
            Op::Iter(_) => Opcode::Iter,
            Op::Next(_) => Opcode::Next,
            Op::Key => Opcode::Key,
            Op::Value1 => Opcode::Value1,
            Op::Value2 => Opcode::Value2,
            Op::ListNew => Opcode::ListNew,
            Op::ListAppend => Opcode::ListAppend,
            Op::MapNew => Opcode::MapNew,
            Op::MapInsert => Opcode::MapInsert,
            Op::TupleNew(_) => Opcode::TupleNew,
            Op::PartialNew(_) => Opcode::PartialNew,
            Op::PartialSet(_) => Opcode::PartialSet,
            Op::Closure { .. } => Opcode::Closure,
            Op::Switch(_) => Opcode::Switch,
            Op::Resolve(_) => Opcode::Resolve,
            Op::StringNew => Opcode::StringNew,
            Op::StringAdd(_) => Opcode::StringAdd,
            Op::StringAdds(_) => Opcode::StringAdds,
            Op::StringEnd => Opcode::StringEnd,
        }
    }

    /// Visit every jump target, for remapping between flat offsets and
    /// instruction indices.
    pub fn targets_mut(&mut self) -> Vec<&mut usize> {
        match self {
            Op::And(target)
            | Op::Or(target)
            | Op::Goto(target)
            | Op::Try(target)
            | Op::Iter(target)
            | Op::Next(target) => vec![target],
            Op::Catch { handler, .. } | Op::CatchX { handler, .. } => vec![handler],
            Op::CatchType { next, .. } => vec![next],
            Op::Switch(targets) => targets.iter_mut().collect(),
            _ => Vec::new(),
        }
    }

    /// Number of elements this instruction occupies in the flat form,
    /// opcode and line included.
    pub fn encoded_len(&self) -> usize {
        2 + match self {
            Op::Enter { .. }
            | Op::Catch { .. }
            | Op::CatchX { .. }
            | Op::CatchType { .. }
            | Op::LocalI { .. }
            | Op::VarX { .. }
            | Op::LetX { .. }
            | Op::CallConst { .. }
            | Op::TailCallConst { .. } => 2,
            Op::Closure { captures, .. } => 1 + captures.len(),
            Op::Return
            | Op::Suspend
            | Op::Resume
            | Op::Nil
            | Op::NilPush
            | Op::Some
            | Op::Not
            | Op::Push
            | Op::Pop
            | Op::Retry
            | Op::Assign
            | Op::For
            | Op::Key
            | Op::Value1
            | Op::Value2
            | Op::ListNew
            | Op::ListAppend
            | Op::MapNew
            | Op::MapInsert
            | Op::StringNew
            | Op::StringEnd => 0,
            _ => 1,
        }
    }
}

/// One instruction with the source line it came from.
#[derive(Clone)]
pub struct Inst {
    pub line: u32,
    pub op: Op,
}
