// P8C - A cross-compiler for the P8 systems language targeting 6502 microcomputers
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! AST node kinds of the P8 language.
//!
//! All node kinds live in one tagged sum, [`NodeKind`]. The nodes themselves
//! are stored in the [`Ast`](super::Ast) arena and refer to their children
//! through [`NodeId`](super::NodeId) indices.

use super::NodeId;
use crate::ast::DataType;

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Remainder,
    Pow,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

impl BinaryOperator {
    /// Whether operand order does not matter and chains may be regrouped.
    pub fn is_associative(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Mul
                | BinaryOperator::BitAnd
                | BinaryOperator::BitOr
                | BinaryOperator::BitXor
                | BinaryOperator::And
                | BinaryOperator::Or
                | BinaryOperator::Equal
                | BinaryOperator::NotEqual
        )
    }

    /// Whether this operator produces a boolean (0 or 1) result.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::Less
                | BinaryOperator::Greater
                | BinaryOperator::LessEqual
                | BinaryOperator::GreaterEqual
        )
    }

    /// Get a string representation of this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Remainder => "%",
            BinaryOperator::Pow => "**",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterEqual => ">=",
        }
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A prefix operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOperator {
    /// `+x`, a no-op.
    Plus,
    /// Arithmetic negation `-x`.
    Minus,
    /// Bitwise inversion `~x`.
    BitInvert,
    /// Boolean negation `not x`.
    Not,
}

impl PrefixOperator {
    /// Get a string representation of this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefixOperator::Plus => "+",
            PrefixOperator::Minus => "-",
            PrefixOperator::BitInvert => "~",
            PrefixOperator::Not => "not",
        }
    }
}

impl std::fmt::Display for PrefixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Zero-page placement wish of a variable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeropageWish {
    /// Must be placed in the zero page; error otherwise.
    Require,
    /// Place in the zero page when space allows.
    Prefer,
    /// No preference.
    #[default]
    DontCare,
    /// Must not be placed in the zero page.
    Forbid,
}

/// The kind of a variable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// A normal allocated variable.
    Var,
    /// A compile-time constant.
    Const,
    /// A memory-mapped variable at a fixed address.
    Memory,
}

/// A CPU register or register pair usable in asm subroutine bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuRegister {
    A,
    X,
    Y,
    AX,
    AY,
    XY,
}

impl CpuRegister {
    /// Get a string representation of this register.
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuRegister::A => "A",
            CpuRegister::X => "X",
            CpuRegister::Y => "Y",
            CpuRegister::AX => "AX",
            CpuRegister::AY => "AY",
            CpuRegister::XY => "XY",
        }
    }
}

/// A CPU status flag condition for branch statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCondition {
    /// Carry set.
    Cs,
    /// Carry clear.
    Cc,
    /// Zero flag set.
    Zero,
    /// Zero flag clear.
    NotZero,
    /// Negative flag set.
    Negative,
    /// Negative flag clear.
    Positive,
    /// Overflow set.
    Vs,
    /// Overflow clear.
    Vc,
}

impl BranchCondition {
    /// The 6502 branch mnemonic that branches when the condition holds.
    pub fn branch_mnemonic(&self) -> &'static str {
        match self {
            BranchCondition::Cs => "bcs",
            BranchCondition::Cc => "bcc",
            BranchCondition::Zero => "beq",
            BranchCondition::NotZero => "bne",
            BranchCondition::Negative => "bmi",
            BranchCondition::Positive => "bpl",
            BranchCondition::Vs => "bvs",
            BranchCondition::Vc => "bvc",
        }
    }

    /// The 6502 branch mnemonic that branches when the condition does not hold.
    pub fn inverse_mnemonic(&self) -> &'static str {
        match self {
            BranchCondition::Cs => "bcc",
            BranchCondition::Cc => "bcs",
            BranchCondition::Zero => "bne",
            BranchCondition::NotZero => "beq",
            BranchCondition::Negative => "bpl",
            BranchCondition::Positive => "bmi",
            BranchCondition::Vs => "bvc",
            BranchCondition::Vc => "bvs",
        }
    }
}

/// A subroutine parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SubroutineParameter {
    /// Parameter name.
    pub name: String,
    /// Parameter data type.
    pub dt: DataType,
    /// Optional register binding for asm subroutines.
    pub register: Option<CpuRegister>,
}

/// A numeric constant value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Integer(i64),
    Float(f64),
}

impl NumericValue {
    /// The value as an integer, when it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            NumericValue::Integer(v) => Some(*v),
            NumericValue::Float(_) => None,
        }
    }

    /// The value widened to a float.
    pub fn as_float(&self) -> f64 {
        match self {
            NumericValue::Integer(v) => *v as f64,
            NumericValue::Float(v) => *v,
        }
    }

    /// Whether the value equals the given integer.
    pub fn equals_integer(&self, other: i64) -> bool {
        match self {
            NumericValue::Integer(v) => *v == other,
            NumericValue::Float(v) => *v == other as f64,
        }
    }
}

impl std::fmt::Display for NumericValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericValue::Integer(v) => write!(f, "{}", v),
            NumericValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// The kind of an AST node.
///
/// Children are referenced by arena id; cross-references that are resolved
/// late (the `target` of an identifier) are `Option<NodeId>` and must not be
/// traversed before name resolution has run.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The root of the whole tree.
    Program { modules: Vec<NodeId> },

    /// One source module (file).
    Module {
        name: String,
        library: bool,
        statements: Vec<NodeId>,
    },

    /// A named code block with an optional fixed load address.
    Block {
        name: String,
        address: Option<u16>,
        options: Vec<String>,
        statements: Vec<NodeId>,
    },

    /// A subroutine definition.
    Subroutine {
        name: String,
        params: Vec<SubroutineParameter>,
        returns: Vec<DataType>,
        /// Fixed address of a ROM-resident routine; such stubs have no body.
        asm_address: Option<u16>,
        /// Registers clobbered by an asm subroutine.
        clobbers: Vec<CpuRegister>,
        /// Whether this subroutine is written in assembly.
        is_asm: bool,
        inline: bool,
        statements: Vec<NodeId>,
    },

    /// A variable, constant or memory-mapped declaration.
    VarDecl {
        name: String,
        kind: VarKind,
        dt: DataType,
        zp: ZeropageWish,
        array_size: Option<u16>,
        /// Name of the struct type, for struct-typed declarations.
        struct_name: Option<String>,
        value: Option<NodeId>,
    },

    /// A struct type declaration. Members are `VarDecl` nodes.
    StructDecl { name: String, members: Vec<NodeId> },

    /// A code label.
    Label { name: String },

    /// A compiler directive such as `%output` or `%zeropage`.
    Directive { name: String, args: Vec<String> },

    // ------------------------------ statements ------------------------------
    /// An assignment. Before desugaring it may carry an augmented operator,
    /// turning `target = value` into `target op= value`.
    Assignment {
        target: NodeId,
        aug_op: Option<BinaryOperator>,
        value: NodeId,
    },

    /// The target of an assignment. Exactly one of the slots is set, or
    /// `register` for the asm register targets.
    AssignTarget {
        identifier: Option<NodeId>,
        array_indexed: Option<NodeId>,
        memory_address: Option<NodeId>,
        register: Option<CpuRegister>,
    },

    /// `x++` or `x--`.
    PostIncrDecr { target: NodeId, increment: bool },

    /// A function call in statement position; the result is discarded.
    FunctionCallStatement { call: NodeId },

    /// Return from the enclosing subroutine, with optional values.
    Return { values: Vec<NodeId> },

    /// Break out of the innermost loop.
    Break,

    /// An unconditional jump to an absolute address or a label.
    Jump {
        address: Option<u16>,
        identifier: Option<NodeId>,
    },

    /// An if/else statement.
    IfElse {
        condition: NodeId,
        truepart: Vec<NodeId>,
        elsepart: Vec<NodeId>,
    },

    /// A conditional branch on a CPU status flag.
    Branch {
        condition: BranchCondition,
        truepart: Vec<NodeId>,
        elsepart: Vec<NodeId>,
    },

    /// A for loop over an iterable (range, array or string).
    ForLoop {
        loopvar: NodeId,
        iterable: NodeId,
        statements: Vec<NodeId>,
    },

    /// A while loop.
    WhileLoop {
        condition: NodeId,
        statements: Vec<NodeId>,
    },

    /// A repeat-until loop; the body runs at least once.
    UntilLoop {
        condition: NodeId,
        statements: Vec<NodeId>,
    },

    /// Repeat the body a fixed number of times.
    RepeatLoop { count: NodeId, statements: Vec<NodeId> },

    /// A when multi-choice statement.
    When { condition: NodeId, choices: Vec<NodeId> },

    /// One arm of a when statement. An empty value list is the else arm.
    WhenChoice {
        values: Vec<NodeId>,
        statements: Vec<NodeId>,
    },

    /// Verbatim inline assembly.
    InlineAssembly { assembly: String },

    /// A statement with no effect.
    NoOp,

    /// An anonymous scope grouping statements.
    AnonymousScope { statements: Vec<NodeId> },

    // ----------------------------- expressions -----------------------------
    /// A numeric literal tagged with its type.
    NumericLiteral { value: NumericValue, dt: DataType },

    /// A string literal.
    StringLiteral { value: String },

    /// An array literal.
    ArrayLiteral { elements: Vec<NodeId>, dt: DataType },

    /// A reference to a named symbol through a dotted path.
    IdentifierRef {
        path: Vec<String>,
        /// The declaration this reference resolves to; set by name resolution.
        target: Option<NodeId>,
    },

    /// A binary expression.
    BinaryExpr {
        left: NodeId,
        op: BinaryOperator,
        right: NodeId,
    },

    /// A prefix expression.
    PrefixExpr { op: PrefixOperator, expr: NodeId },

    /// A typecast. Implicit casts are inserted by the type checker.
    TypecastExpr {
        dt: DataType,
        expr: NodeId,
        implicit: bool,
    },

    /// A function call in expression position.
    FunctionCall { target: NodeId, args: Vec<NodeId> },

    /// A direct memory read `@(address)`, yielding a ubyte.
    DirectMemoryRead { address: NodeId },

    /// The address of a symbol, yielding a uword.
    AddressOf { identifier: NodeId },

    /// A range expression `from .. to step k`.
    RangeExpr {
        from: NodeId,
        to: NodeId,
        step: Option<NodeId>,
    },

    /// An array element reference `arr[index]`.
    ArrayIndexedRef { identifier: NodeId, index: NodeId },
}

impl NodeKind {
    /// Whether this node introduces a named lookup scope.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            NodeKind::Program { .. }
                | NodeKind::Module { .. }
                | NodeKind::Block { .. }
                | NodeKind::Subroutine { .. }
                | NodeKind::StructDecl { .. }
                | NodeKind::AnonymousScope { .. }
        )
    }

    /// Whether this node is an expression.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::NumericLiteral { .. }
                | NodeKind::StringLiteral { .. }
                | NodeKind::ArrayLiteral { .. }
                | NodeKind::IdentifierRef { .. }
                | NodeKind::BinaryExpr { .. }
                | NodeKind::PrefixExpr { .. }
                | NodeKind::TypecastExpr { .. }
                | NodeKind::FunctionCall { .. }
                | NodeKind::DirectMemoryRead { .. }
                | NodeKind::AddressOf { .. }
                | NodeKind::RangeExpr { .. }
                | NodeKind::ArrayIndexedRef { .. }
        )
    }

    /// The declared name of this node, when it declares a symbol.
    pub fn symbol_name(&self) -> Option<&str> {
        match self {
            NodeKind::Module { name, .. }
            | NodeKind::Block { name, .. }
            | NodeKind::Subroutine { name, .. }
            | NodeKind::VarDecl { name, .. }
            | NodeKind::StructDecl { name, .. }
            | NodeKind::Label { name } => Some(name),
            _ => None,
        }
    }

    /// A short kind name for internal error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Program { .. } => "program",
            NodeKind::Module { .. } => "module",
            NodeKind::Block { .. } => "block",
            NodeKind::Subroutine { .. } => "subroutine",
            NodeKind::VarDecl { .. } => "vardecl",
            NodeKind::StructDecl { .. } => "structdecl",
            NodeKind::Label { .. } => "label",
            NodeKind::Directive { .. } => "directive",
            NodeKind::Assignment { .. } => "assignment",
            NodeKind::AssignTarget { .. } => "assigntarget",
            NodeKind::PostIncrDecr { .. } => "postincrdecr",
            NodeKind::FunctionCallStatement { .. } => "callstatement",
            NodeKind::Return { .. } => "return",
            NodeKind::Break => "break",
            NodeKind::Jump { .. } => "jump",
            NodeKind::IfElse { .. } => "ifelse",
            NodeKind::Branch { .. } => "branch",
            NodeKind::ForLoop { .. } => "forloop",
            NodeKind::WhileLoop { .. } => "whileloop",
            NodeKind::UntilLoop { .. } => "untilloop",
            NodeKind::RepeatLoop { .. } => "repeatloop",
            NodeKind::When { .. } => "when",
            NodeKind::WhenChoice { .. } => "whenchoice",
            NodeKind::InlineAssembly { .. } => "inlineassembly",
            NodeKind::NoOp => "noop",
            NodeKind::AnonymousScope { .. } => "anonymousscope",
            NodeKind::NumericLiteral { .. } => "numericliteral",
            NodeKind::StringLiteral { .. } => "stringliteral",
            NodeKind::ArrayLiteral { .. } => "arrayliteral",
            NodeKind::IdentifierRef { .. } => "identifier",
            NodeKind::BinaryExpr { .. } => "binaryexpr",
            NodeKind::PrefixExpr { .. } => "prefixexpr",
            NodeKind::TypecastExpr { .. } => "typecast",
            NodeKind::FunctionCall { .. } => "functioncall",
            NodeKind::DirectMemoryRead { .. } => "memoryread",
            NodeKind::AddressOf { .. } => "addressof",
            NodeKind::RangeExpr { .. } => "range",
            NodeKind::ArrayIndexedRef { .. } => "arrayindexed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_associativity() {
        assert!(BinaryOperator::Add.is_associative());
        assert!(BinaryOperator::Mul.is_associative());
        assert!(BinaryOperator::BitXor.is_associative());
        assert!(!BinaryOperator::Sub.is_associative());
        assert!(!BinaryOperator::Div.is_associative());
        assert!(!BinaryOperator::ShiftLeft.is_associative());
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(format!("{}", BinaryOperator::Add), "+");
        assert_eq!(format!("{}", BinaryOperator::Remainder), "%");
        assert_eq!(format!("{}", BinaryOperator::ShiftRight), ">>");
        assert_eq!(format!("{}", PrefixOperator::BitInvert), "~");
        assert_eq!(format!("{}", PrefixOperator::Not), "not");
    }

    #[test]
    fn test_branch_mnemonics() {
        assert_eq!(BranchCondition::Cs.branch_mnemonic(), "bcs");
        assert_eq!(BranchCondition::Cs.inverse_mnemonic(), "bcc");
        assert_eq!(BranchCondition::Zero.inverse_mnemonic(), "bne");
        assert_eq!(BranchCondition::Negative.branch_mnemonic(), "bmi");
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(NumericValue::Integer(42).as_integer(), Some(42));
        assert_eq!(NumericValue::Float(1.5).as_integer(), None);
        assert_eq!(NumericValue::Integer(2).as_float(), 2.0);
        assert!(NumericValue::Integer(0).equals_integer(0));
        assert!(NumericValue::Float(8.0).equals_integer(8));
        assert!(!NumericValue::Float(8.5).equals_integer(8));
    }

    #[test]
    fn test_scope_kinds() {
        assert!(NodeKind::Program { modules: vec![] }.is_scope());
        assert!(NodeKind::AnonymousScope { statements: vec![] }.is_scope());
        assert!(!NodeKind::Break.is_scope());
        assert!(!NodeKind::NoOp.is_scope());
    }

    #[test]
    fn test_symbol_names() {
        let label = NodeKind::Label {
            name: "start".to_string(),
        };
        assert_eq!(label.symbol_name(), Some("start"));
        assert_eq!(NodeKind::Break.symbol_name(), None);
    }
}
