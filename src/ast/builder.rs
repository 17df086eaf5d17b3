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

//! Programmatic AST construction.
//!
//! The parser front-end delivers its output through this builder, and the
//! test suites use it to assemble programs directly. Composite constructors
//! adopt their children, so parent links are always consistent.

use super::{
    Ast, BinaryOperator, CpuRegister, DataType, NodeId, NodeKind, NumericValue, PrefixOperator,
    SubroutineParameter, VarKind, ZeropageWish,
};
use crate::error::Position;

/// A convenience layer for building a program tree.
#[derive(Debug)]
pub struct TreeBuilder {
    /// The tree under construction.
    pub ast: Ast,
    /// The default module new blocks are appended to.
    pub module: NodeId,
}

impl TreeBuilder {
    /// Create a builder with one non-library module.
    pub fn new() -> Self {
        let mut ast = Ast::new();
        let root = ast.root();
        let module = ast
            .append(
                root,
                NodeKind::Module {
                    name: "main.p8".to_string(),
                    library: false,
                    statements: vec![],
                },
                Position::builtin(),
            )
            .expect("program accepts modules");
        Self { ast, module }
    }

    fn pos() -> Position {
        Position::builtin()
    }

    /// Add another module.
    pub fn module(&mut self, name: &str, library: bool) -> NodeId {
        let root = self.ast.root();
        self.ast
            .append(
                root,
                NodeKind::Module {
                    name: name.to_string(),
                    library,
                    statements: vec![],
                },
                Self::pos(),
            )
            .expect("program accepts modules")
    }

    /// Add a block to the default module.
    pub fn block(&mut self, name: &str, address: Option<u16>) -> NodeId {
        self.block_in(self.module, name, address)
    }

    /// Add a block to a specific module.
    pub fn block_in(&mut self, module: NodeId, name: &str, address: Option<u16>) -> NodeId {
        self.ast
            .append(
                module,
                NodeKind::Block {
                    name: name.to_string(),
                    address,
                    options: vec![],
                    statements: vec![],
                },
                Self::pos(),
            )
            .expect("module accepts blocks")
    }

    /// Add a subroutine to a block.
    pub fn subroutine(&mut self, block: NodeId, name: &str) -> NodeId {
        self.ast
            .append(
                block,
                NodeKind::Subroutine {
                    name: name.to_string(),
                    params: vec![],
                    returns: vec![],
                    asm_address: None,
                    clobbers: vec![],
                    is_asm: false,
                    inline: false,
                    statements: vec![],
                },
                Self::pos(),
            )
            .expect("block accepts subroutines")
    }

    /// Add a subroutine with parameters. Each parameter also gets an
    /// implicit variable declaration inside the body, which is what the
    /// scope chain resolves parameter names against.
    pub fn subroutine_with_params(
        &mut self,
        block: NodeId,
        name: &str,
        params: Vec<SubroutineParameter>,
    ) -> NodeId {
        let sub = self
            .ast
            .append(
                block,
                NodeKind::Subroutine {
                    name: name.to_string(),
                    params: params.clone(),
                    returns: vec![],
                    asm_address: None,
                    clobbers: vec![],
                    is_asm: false,
                    inline: false,
                    statements: vec![],
                },
                Self::pos(),
            )
            .expect("block accepts subroutines");
        for p in params {
            self.ast
                .append(
                    sub,
                    NodeKind::VarDecl {
                        name: p.name,
                        kind: VarKind::Var,
                        dt: p.dt,
                        zp: ZeropageWish::DontCare,
                        array_size: None,
                        struct_name: None,
                        value: None,
                    },
                    Self::pos(),
                )
                .expect("subroutine accepts vardecls");
        }
        sub
    }

    /// Add a ROM-resident asm subroutine stub at a fixed address.
    pub fn rom_subroutine(&mut self, block: NodeId, name: &str, address: u16) -> NodeId {
        self.ast
            .append(
                block,
                NodeKind::Subroutine {
                    name: name.to_string(),
                    params: vec![],
                    returns: vec![],
                    asm_address: Some(address),
                    clobbers: vec![CpuRegister::A],
                    is_asm: true,
                    inline: false,
                    statements: vec![],
                },
                Self::pos(),
            )
            .expect("block accepts subroutines")
    }

    /// Add an uninitialized variable.
    pub fn var(&mut self, scope: NodeId, name: &str, dt: DataType) -> NodeId {
        self.var_decl(scope, name, dt, VarKind::Var, None, None, None)
    }

    /// Add a variable with an initializer expression.
    pub fn var_init(&mut self, scope: NodeId, name: &str, dt: DataType, value: NodeId) -> NodeId {
        self.var_decl(scope, name, dt, VarKind::Var, None, None, Some(value))
    }

    /// Add a constant declaration.
    pub fn const_var(&mut self, scope: NodeId, name: &str, dt: DataType, value: NodeId) -> NodeId {
        self.var_decl(scope, name, dt, VarKind::Const, None, None, Some(value))
    }

    /// Add a memory-mapped variable at a fixed address.
    pub fn memory_var(&mut self, scope: NodeId, name: &str, dt: DataType, address: u16) -> NodeId {
        let addr = self.lit(address as i64, DataType::Uword);
        self.var_decl(scope, name, dt, VarKind::Memory, None, None, Some(addr))
    }

    /// Add an array variable with a declared size.
    pub fn array_var(
        &mut self,
        scope: NodeId,
        name: &str,
        dt: DataType,
        size: u16,
        value: Option<NodeId>,
    ) -> NodeId {
        self.var_decl(scope, name, dt, VarKind::Var, Some(size), None, value)
    }

    /// Add a struct-typed variable.
    pub fn struct_var(&mut self, scope: NodeId, name: &str, struct_name: &str) -> NodeId {
        self.var_decl(
            scope,
            name,
            DataType::Struct,
            VarKind::Var,
            None,
            Some(struct_name.to_string()),
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn var_decl(
        &mut self,
        scope: NodeId,
        name: &str,
        dt: DataType,
        kind: VarKind,
        array_size: Option<u16>,
        struct_name: Option<String>,
        value: Option<NodeId>,
    ) -> NodeId {
        self.ast
            .append(
                scope,
                NodeKind::VarDecl {
                    name: name.to_string(),
                    kind,
                    dt,
                    zp: ZeropageWish::DontCare,
                    array_size,
                    struct_name,
                    value,
                },
                Self::pos(),
            )
            .expect("scope accepts vardecls")
    }

    /// Add a struct declaration with (name, type) members.
    pub fn struct_decl(&mut self, scope: NodeId, name: &str, members: &[(&str, DataType)]) -> NodeId {
        let decl = self
            .ast
            .append(
                scope,
                NodeKind::StructDecl {
                    name: name.to_string(),
                    members: vec![],
                },
                Self::pos(),
            )
            .expect("scope accepts structdecls");
        for (member, dt) in members {
            self.ast
                .append(
                    decl,
                    NodeKind::VarDecl {
                        name: member.to_string(),
                        kind: VarKind::Var,
                        dt: *dt,
                        zp: ZeropageWish::DontCare,
                        array_size: None,
                        struct_name: None,
                        value: None,
                    },
                    Self::pos(),
                )
                .expect("structdecl accepts members");
        }
        decl
    }

    // ----------------------------- expressions -----------------------------

    /// An integer literal.
    pub fn lit(&mut self, value: i64, dt: DataType) -> NodeId {
        self.ast.add_detached(
            NodeKind::NumericLiteral {
                value: NumericValue::Integer(value),
                dt,
            },
            Self::pos(),
        )
    }

    /// A float literal.
    pub fn flit(&mut self, value: f64) -> NodeId {
        self.ast.add_detached(
            NodeKind::NumericLiteral {
                value: NumericValue::Float(value),
                dt: DataType::Float,
            },
            Self::pos(),
        )
    }

    /// A string literal.
    pub fn string_lit(&mut self, value: &str) -> NodeId {
        self.ast.add_detached(
            NodeKind::StringLiteral {
                value: value.to_string(),
            },
            Self::pos(),
        )
    }

    /// An unresolved identifier reference; the path splits on dots.
    pub fn ident(&mut self, path: &str) -> NodeId {
        self.ast.add_detached(
            NodeKind::IdentifierRef {
                path: path.split('.').map(str::to_string).collect(),
                target: None,
            },
            Self::pos(),
        )
    }

    /// An identifier reference already linked to its declaration.
    pub fn ident_to(&mut self, name: &str, decl: NodeId) -> NodeId {
        self.ast.add_detached(
            NodeKind::IdentifierRef {
                path: name.split('.').map(str::to_string).collect(),
                target: Some(decl),
            },
            Self::pos(),
        )
    }

    /// A binary expression.
    pub fn binary(&mut self, left: NodeId, op: BinaryOperator, right: NodeId) -> NodeId {
        self.ast
            .add_detached(NodeKind::BinaryExpr { left, op, right }, Self::pos())
    }

    /// A prefix expression.
    pub fn prefix(&mut self, op: PrefixOperator, expr: NodeId) -> NodeId {
        self.ast
            .add_detached(NodeKind::PrefixExpr { op, expr }, Self::pos())
    }

    /// An explicit typecast.
    pub fn cast(&mut self, dt: DataType, expr: NodeId) -> NodeId {
        self.ast.add_detached(
            NodeKind::TypecastExpr {
                dt,
                expr,
                implicit: false,
            },
            Self::pos(),
        )
    }

    /// A direct memory read.
    pub fn memread(&mut self, address: NodeId) -> NodeId {
        self.ast
            .add_detached(NodeKind::DirectMemoryRead { address }, Self::pos())
    }

    /// The address of a symbol.
    pub fn addr_of(&mut self, identifier: NodeId) -> NodeId {
        self.ast
            .add_detached(NodeKind::AddressOf { identifier }, Self::pos())
    }

    /// A range expression.
    pub fn range(&mut self, from: NodeId, to: NodeId, step: Option<NodeId>) -> NodeId {
        self.ast
            .add_detached(NodeKind::RangeExpr { from, to, step }, Self::pos())
    }

    /// An array element reference.
    pub fn array_indexed(&mut self, identifier: NodeId, index: NodeId) -> NodeId {
        self.ast
            .add_detached(NodeKind::ArrayIndexedRef { identifier, index }, Self::pos())
    }

    /// A function call expression.
    pub fn call(&mut self, target: NodeId, args: Vec<NodeId>) -> NodeId {
        self.ast
            .add_detached(NodeKind::FunctionCall { target, args }, Self::pos())
    }

    // ------------------------------ statements ------------------------------

    /// An assignment target naming a variable.
    pub fn target_var(&mut self, name: &str, decl: Option<NodeId>) -> NodeId {
        let ident = match decl {
            Some(d) => self.ident_to(name, d),
            None => self.ident(name),
        };
        self.ast.add_detached(
            NodeKind::AssignTarget {
                identifier: Some(ident),
                array_indexed: None,
                memory_address: None,
                register: None,
            },
            Self::pos(),
        )
    }

    /// An assignment target of an array element.
    pub fn target_array(&mut self, name: &str, decl: Option<NodeId>, index: NodeId) -> NodeId {
        let ident = match decl {
            Some(d) => self.ident_to(name, d),
            None => self.ident(name),
        };
        let indexed = self.array_indexed(ident, index);
        self.ast.add_detached(
            NodeKind::AssignTarget {
                identifier: None,
                array_indexed: Some(indexed),
                memory_address: None,
                register: None,
            },
            Self::pos(),
        )
    }

    /// An assignment target through a memory address expression.
    pub fn target_mem(&mut self, address: NodeId) -> NodeId {
        self.ast.add_detached(
            NodeKind::AssignTarget {
                identifier: None,
                array_indexed: None,
                memory_address: Some(address),
                register: None,
            },
            Self::pos(),
        )
    }

    /// Append a plain assignment statement.
    pub fn assign(&mut self, scope: NodeId, target: NodeId, value: NodeId) -> NodeId {
        self.ast
            .append(
                scope,
                NodeKind::Assignment {
                    target,
                    aug_op: None,
                    value,
                },
                Self::pos(),
            )
            .expect("scope accepts statements")
    }

    /// Append an augmented assignment statement.
    pub fn assign_aug(
        &mut self,
        scope: NodeId,
        target: NodeId,
        op: BinaryOperator,
        value: NodeId,
    ) -> NodeId {
        self.ast
            .append(
                scope,
                NodeKind::Assignment {
                    target,
                    aug_op: Some(op),
                    value,
                },
                Self::pos(),
            )
            .expect("scope accepts statements")
    }

    /// Append an assignment to a named variable.
    pub fn assign_var(
        &mut self,
        scope: NodeId,
        name: &str,
        decl: NodeId,
        value: NodeId,
    ) -> NodeId {
        let target = self.target_var(name, Some(decl));
        self.assign(scope, target, value)
    }

    /// Append a function call statement.
    pub fn call_stmt(&mut self, scope: NodeId, target: NodeId) -> NodeId {
        let call = self.call(target, vec![]);
        self.ast
            .append(scope, NodeKind::FunctionCallStatement { call }, Self::pos())
            .expect("scope accepts statements")
    }

    /// Append a return statement.
    pub fn ret(&mut self, scope: NodeId) -> NodeId {
        self.ast
            .append(scope, NodeKind::Return { values: vec![] }, Self::pos())
            .expect("scope accepts statements")
    }

    /// Append a label.
    pub fn label(&mut self, scope: NodeId, name: &str) -> NodeId {
        self.ast
            .append(
                scope,
                NodeKind::Label {
                    name: name.to_string(),
                },
                Self::pos(),
            )
            .expect("scope accepts statements")
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_links_parents() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        let x = t.var(sub, "x", DataType::Ubyte);
        let lit = t.lit(1, DataType::Ubyte);
        let assign = t.assign_var(sub, "x", x, lit);

        assert_eq!(t.ast.node(assign).parent, sub);
        t.ast.verify_parent_links().unwrap();
    }

    #[test]
    fn test_builder_params_become_vardecls() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine_with_params(
            block,
            "plot",
            vec![SubroutineParameter {
                name: "xpos".to_string(),
                dt: DataType::Ubyte,
                register: None,
            }],
        );
        let decls = t.ast.statements(sub);
        assert_eq!(decls.len(), 1);
        assert_eq!(t.ast.kind(decls[0]).symbol_name(), Some("xpos"));
    }

    #[test]
    fn test_struct_decl_members() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let s = t.struct_decl(
            block,
            "Point",
            &[("x", DataType::Ubyte), ("y", DataType::Ubyte)],
        );
        assert_eq!(t.ast.statements(s).len(), 2);
    }
}
