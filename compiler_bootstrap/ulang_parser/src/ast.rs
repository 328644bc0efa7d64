//! Value-typed AST: nodes live in a single arena owned by the parser output,
//! children are referenced by index rather than by pointer. This keeps the
//! tree free of borrow-checker friction and makes every traversal branch
//! local to the arena.

use crate::symbol::SymbolId;
use ulang_types::DataType;

/// Index into an [`Ast`] arena. Never valid across two different arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone)]
pub enum AstKind {
    Number {
        value: i64,
    },
    Variable {
        name: String,
        symbol: Option<SymbolId>,
    },
    BinOp {
        op: BinOp,
        left: NodeId,
        right: NodeId,
    },
    Declaration {
        symbol: Option<SymbolId>,
        type_ref: &'static DataType,
        init: Option<NodeId>,
    },
    Assignment {
        symbol: Option<SymbolId>,
        rhs: NodeId,
    },
    FnDef {
        symbol: Option<SymbolId>,
        ret_type: &'static DataType,
        params: Vec<SymbolId>,
        body: Vec<NodeId>,
        has_body: bool,
    },
    FnCall {
        symbol: Option<SymbolId>,
        args: Vec<NodeId>,
        target_symbol: Option<SymbolId>,
    },
    FnArg {
        value: NodeId,
    },
    FnRet {
        value: Option<NodeId>,
    },
}

#[derive(Debug, Clone)]
pub struct AstNode {
    pub kind: AstKind,
    pub loc: ulang_common::SourceLocation,
}

/// Owns every node of one translation unit; dropped whole at end of
/// compilation.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<AstNode>,
    /// Top-level statements in source order (declarations, fn defs, bare
    /// expression statements) — what the emitter walks after functions.
    pub top_level: Vec<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: AstKind, loc: ulang_common::SourceLocation) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(AstNode { kind, loc });
        id
    }

    pub fn get(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut AstNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulang_common::SourceLocation;

    #[test]
    fn arena_indices_are_stable() {
        let mut ast = Ast::new();
        let a = ast.push(AstKind::Number { value: 1 }, SourceLocation::unknown());
        let b = ast.push(AstKind::Number { value: 2 }, SourceLocation::unknown());
        assert_ne!(a, b);
        match ast.get(a).kind {
            AstKind::Number { value } => assert_eq!(value, 1),
            _ => panic!("wrong kind"),
        }
    }
}
