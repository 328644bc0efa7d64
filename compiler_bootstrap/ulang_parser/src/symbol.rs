//! Scope stack and symbol table. Scopes are held in an arena indexed by
//! `ScopeId`/parent index rather than pointer-threaded, so the table has no
//! internal lifetimes and `lookup` walks indices.

use crate::error::{CompileError, DiagCode};
use hashbrown::HashMap;
use ulang_common::SourceLocation;
use ulang_types::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolOrigin {
    User,
    Builtin,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub symbol_id: SymbolId,
    pub kind: SymbolKind,
    pub origin: SymbolOrigin,
    pub type_ref: &'static DataType,
    pub stack_offset: u32,
    /// Meaningful only for `kind == Function`; patched by the emitter.
    pub entry_ip: Option<u32>,
    pub declared_at: SourceLocation,
    /// Functions only: true once a body has been attached, so a second
    /// body for the same name can be rejected as `FnRedefine`.
    pub defined: bool,
}

#[derive(Debug)]
pub struct Scope {
    pub name: String,
    pub parent: Option<ScopeId>,
    symbols: HashMap<String, SymbolId>,
}

/// Owns every scope and symbol of one compilation; the global scope is
/// created at construction and never popped.
///
/// `next_offset` is shared across every scope rather than reset per-scope:
/// the VM has one flat heap and no frame pointer, so a function's locals
/// must not land on the same addresses as the caller's — reusing offsets
/// per scope would let a call clobber the caller's variables.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    stack: Vec<ScopeId>,
    next_symbol_id: u32,
    next_offset: u32,
}

const STACK_ALIGN: u32 = 8;

fn align_up(offset: u32, align: u32) -> u32 {
    offset.div_ceil(align) * align
}

impl SymbolTable {
    /// Seeds the builtin `uPutChar`/`uGetChar` functions into the global
    /// scope, per `CompilerInstance` construction.
    pub fn new() -> Self {
        let global = Scope { name: "global".to_string(), parent: None, symbols: HashMap::new() };
        let mut table =
            Self { scopes: vec![global], symbols: Vec::new(), stack: vec![ScopeId(0)], next_symbol_id: 0, next_offset: 0 };

        let char_ty = ulang_types::resolve("char").expect("char type always resolves");
        let void_ty = ulang_types::resolve("void").expect("void type always resolves");
        table
            .decl_fn("uPutChar", void_ty, SourceLocation::unknown(), SymbolOrigin::Builtin)
            .expect("builtin seeding cannot collide");
        table
            .decl_fn("uGetChar", char_ty, SourceLocation::unknown(), SymbolOrigin::Builtin)
            .expect("builtin seeding cannot collide");

        table
    }

    pub fn current(&self) -> ScopeId {
        *self.stack.last().expect("global scope never pops")
    }

    /// Pushes a child scope named `<parent>::<name>@fn_decl`-style by the
    /// caller (callers pass the fully formed name).
    pub fn enter(&mut self, name: impl Into<String>) -> ScopeId {
        let parent = self.current();
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope { name: name.into(), parent: Some(parent), symbols: HashMap::new() });
        self.stack.push(id);
        id
    }

    /// Pops the current scope. Fails (panics) if called on the global scope
    /// — a parser bug, never a user-facing error.
    pub fn leave(&mut self) {
        assert!(self.stack.len() > 1, "cannot leave the global scope");
        self.stack.pop();
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    fn check_redecl(&self, scope: ScopeId, name: &str, loc: &SourceLocation) -> Result<(), CompileError> {
        if let Some(&existing) = self.scope(scope).symbols.get(name) {
            let code = if self.symbols[existing.0 as usize].origin == SymbolOrigin::Builtin {
                DiagCode::BuiltinRedecl
            } else {
                DiagCode::RedeclInScope
            };
            return Err(CompileError::new(code, format!("'{name}' is already declared in this scope"), loc.clone()));
        }
        Ok(())
    }

    /// Declares a variable in the current scope, assigning a stack offset
    /// and a fresh process-monotonic symbol id.
    pub fn decl(&mut self, name: &str, ty: &'static DataType, loc: SourceLocation) -> Result<SymbolId, CompileError> {
        let scope = self.current();
        self.check_redecl(scope, name, &loc)?;

        let offset = align_up(self.next_offset, STACK_ALIGN);
        let id = SymbolId(self.next_symbol_id);
        self.next_symbol_id += 1;

        self.symbols.push(Symbol {
            name: name.to_string(),
            symbol_id: id,
            kind: SymbolKind::Variable,
            origin: SymbolOrigin::User,
            type_ref: ty,
            stack_offset: offset,
            entry_ip: None,
            declared_at: loc,
            defined: false,
        });

        self.next_offset = align_up(offset + ty.size_bytes, STACK_ALIGN);
        self.scope_mut(scope).symbols.insert(name.to_string(), id);

        log::debug!("symbol '{name}' declared in scope '{}' at offset {offset}", self.scope(scope).name);
        Ok(id)
    }

    /// Declares a function symbol (`stack_offset` is always 0; `entry_ip` is
    /// filled in later by the emitter).
    pub fn decl_fn(
        &mut self,
        name: &str,
        ret_type: &'static DataType,
        loc: SourceLocation,
        origin: SymbolOrigin,
    ) -> Result<SymbolId, CompileError> {
        let scope = self.current();
        self.check_redecl(scope, name, &loc)?;

        let id = SymbolId(self.next_symbol_id);
        self.next_symbol_id += 1;

        self.symbols.push(Symbol {
            name: name.to_string(),
            symbol_id: id,
            kind: SymbolKind::Function,
            origin,
            type_ref: ret_type,
            stack_offset: 0,
            entry_ip: None,
            declared_at: loc,
            defined: false,
        });

        self.scope_mut(scope).symbols.insert(name.to_string(), id);
        log::debug!("function symbol '{name}' declared in scope '{}'", self.scope(scope).name);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn scope_name(&self, id: ScopeId) -> &str {
        &self.scopes[id.0 as usize].name
    }

    /// Climbs the parent chain from `scope` looking for `name`.
    pub fn lookup_in(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let s = self.scope(id);
            if let Some(&sym) = s.symbols.get(name) {
                return Some(sym);
            }
            cursor = s.parent;
        }
        None
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.lookup_in(self.current(), name)
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    pub fn set_entry_ip(&mut self, id: SymbolId, ip: u32) {
        self.symbol_mut(id).entry_ip = Some(ip);
    }

    /// Every symbol ever declared, in declaration order — used to build the
    /// container's symbol metadata table.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_seeded_and_redeclaring_fails() {
        let mut table = SymbolTable::new();
        assert!(table.lookup("uPutChar").is_some());

        let char_ty = ulang_types::resolve("char").unwrap();
        let err = table.decl("uPutChar", char_ty, SourceLocation::unknown()).unwrap_err();
        assert_eq!(err.0.code, "BuiltinRedecl");
    }

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let mut table = SymbolTable::new();
        let i32_ty = ulang_types::resolve("int32").unwrap();
        table.decl("x", i32_ty, SourceLocation::unknown()).unwrap();
        let err = table.decl("x", i32_ty, SourceLocation::unknown()).unwrap_err();
        assert_eq!(err.0.code, "RedeclInScope");
    }

    #[test]
    fn child_scope_can_see_parent_declarations() {
        let mut table = SymbolTable::new();
        let i32_ty = ulang_types::resolve("int32").unwrap();
        table.decl("x", i32_ty, SourceLocation::unknown()).unwrap();
        table.enter("global::f@fn_decl");
        assert!(table.lookup("x").is_some());
        table.leave();
    }

    #[test]
    fn child_scope_offsets_never_alias_an_outer_scope() {
        let mut table = SymbolTable::new();
        let i32_ty = ulang_types::resolve("int32").unwrap();
        let a = table.decl("a", i32_ty, SourceLocation::unknown()).unwrap();
        table.enter("global::f@fn_decl");
        let n = table.decl("n", i32_ty, SourceLocation::unknown()).unwrap();
        table.leave();
        assert_ne!(table.symbol(a).stack_offset, table.symbol(n).stack_offset);
    }

    #[test]
    fn stack_offsets_advance_by_aligned_size() {
        let mut table = SymbolTable::new();
        let i32_ty = ulang_types::resolve("int32").unwrap();
        let a = table.decl("a", i32_ty, SourceLocation::unknown()).unwrap();
        let b = table.decl("b", i32_ty, SourceLocation::unknown()).unwrap();
        assert_eq!(table.symbol(a).stack_offset, 0);
        assert_eq!(table.symbol(b).stack_offset, 8);
    }
}
