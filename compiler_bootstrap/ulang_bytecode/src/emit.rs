//! Lowers an AST into a linear instruction vector, allocating `TMP0..TMP3`
//! for expression intermediates.

use crate::error::EmitError;
use crate::model::{registers, Instruction, Opcode, Operand, OperandType};
use hashbrown::HashMap;
use ulang_parser::{Ast, AstKind, BinOp, NodeId, SymbolId, SymbolTable};

pub struct Emitter<'a> {
    ast: &'a Ast,
    symbols: &'a mut SymbolTable,
    code: Vec<Instruction>,
    tmp_busy: [bool; 4],
    /// Parameter symbols of every function with a body, in declaration
    /// order, keyed by the function's own symbol — used at each call site
    /// to store arguments straight into the callee's parameter slots.
    fn_params: HashMap<SymbolId, Vec<SymbolId>>,
}

impl<'a> Emitter<'a> {
    pub fn new(ast: &'a Ast, symbols: &'a mut SymbolTable) -> Self {
        Self { ast, symbols, code: Vec::new(), tmp_busy: [false; 4], fn_params: HashMap::new() }
    }

    /// 1. placeholder `JMP`
    /// 2. every function body in source order (patching `entry_ip` as each begins)
    /// 3. patch the placeholder
    /// 4. top-level non-function nodes
    /// 5. `HALT`
    pub fn emit(mut self) -> Result<Vec<Instruction>, EmitError> {
        let jmp_idx = self.code.len();
        self.code.push(Instruction::new(Opcode::Jmp, Operand::immediate(0), Operand::NULL));

        let top_level = self.ast.top_level.clone();

        for &id in &top_level {
            if let AstKind::FnDef { symbol: Some(sym), params, .. } = &self.ast.get(id).kind {
                self.fn_params.insert(*sym, params.clone());
            }
        }

        for &id in &top_level {
            if let AstKind::FnDef { symbol, body, has_body, .. } = &self.ast.get(id).kind {
                if *has_body {
                    let sym = symbol.expect("emitter only runs over a parser-validated AST");
                    let entry_ip = self.code.len() as u32;
                    self.symbols.set_entry_ip(sym, entry_ip);
                    for &stmt in body {
                        self.compile_node(stmt)?;
                    }
                }
            }
        }

        let top_entry = self.code.len() as u32;
        self.code[jmp_idx].a = Operand::immediate(top_entry);

        for &id in &top_level {
            if !matches!(self.ast.get(id).kind, AstKind::FnDef { .. }) {
                self.compile_node(id)?;
            }
        }

        self.code.push(Instruction::new(Opcode::Halt, Operand::NULL, Operand::NULL));
        log::debug!("emitted {} instructions", self.code.len());
        Ok(self.code)
    }

    fn alloc_tmp(&mut self) -> Result<u8, EmitError> {
        for (i, reg) in registers::TMP_SLOTS.iter().enumerate() {
            if !self.tmp_busy[i] {
                self.tmp_busy[i] = true;
                return Ok(*reg);
            }
        }
        Err(EmitError::NoFreeTemp)
    }

    fn free_tmp(&mut self, reg: u8) {
        if let Some(i) = registers::TMP_SLOTS.iter().position(|&r| r == reg) {
            self.tmp_busy[i] = false;
        }
    }

    fn as_tmp(operand: &Operand) -> Option<u8> {
        (operand.ty == OperandType::Register && registers::TMP_SLOTS.contains(&(operand.data as u8)))
            .then_some(operand.data as u8)
    }

    /// Snapshot the busy mask on entry; on exit, release every temporary
    /// allocated during this call other than the one returned.
    fn compile_node(&mut self, id: NodeId) -> Result<Operand, EmitError> {
        let snapshot = self.tmp_busy;
        let result = self.lower(id)?;

        for (i, reg) in registers::TMP_SLOTS.iter().enumerate() {
            let is_result = result.ty == OperandType::Register && result.data == *reg as u32;
            if self.tmp_busy[i] && !snapshot[i] && !is_result {
                self.tmp_busy[i] = false;
            }
        }

        Ok(result)
    }

    fn lower(&mut self, id: NodeId) -> Result<Operand, EmitError> {
        match self.ast.get(id).kind.clone() {
            AstKind::Number { value } => Ok(Operand::immediate(value as u32)),

            AstKind::Variable { symbol, .. } => {
                let offset = self.symbols.symbol(symbol.expect("resolved")).stack_offset;
                let tmp = self.alloc_tmp()?;
                self.code.push(Instruction::new(Opcode::Ld, Operand::register(tmp), Operand::reference(offset)));
                Ok(Operand::register(tmp))
            }

            AstKind::BinOp { op, left, right } => {
                let l = self.compile_node(left)?;
                let r = self.compile_node(right)?;

                let mut dst = if Self::as_tmp(&l).is_some() || l.ty == OperandType::Register {
                    l
                } else {
                    let tmp = self.alloc_tmp()?;
                    self.code.push(Instruction::new(Opcode::Mov, Operand::register(tmp), l));
                    Operand::register(tmp)
                };

                // DIV clobbers TMP0 with the remainder as it writes its
                // quotient to `a` (spec order: quotient first, then
                // remainder) — if `dst` happens to be TMP0 itself, that
                // overwrite would corrupt the quotient we just wrote.
                if op == BinOp::Div && dst == Operand::register(registers::TMP0) {
                    let fresh = self.alloc_tmp()?;
                    self.code.push(Instruction::new(Opcode::Mov, Operand::register(fresh), dst));
                    self.free_tmp(registers::TMP0);
                    dst = Operand::register(fresh);
                }

                let opcode = match op {
                    BinOp::Add => Opcode::Add,
                    BinOp::Sub => Opcode::Sub,
                    BinOp::Mul => Opcode::Mul,
                    BinOp::Div => Opcode::Div,
                };
                self.code.push(Instruction::new(opcode, dst, r));

                if let Some(reg) = Self::as_tmp(&r) {
                    self.free_tmp(reg);
                }
                Ok(dst)
            }

            AstKind::Assignment { symbol, rhs } => {
                let offset = self.symbols.symbol(symbol.expect("resolved")).stack_offset;
                let r = self.compile_node(rhs)?;
                self.code.push(Instruction::new(Opcode::St, Operand::reference(offset), r));
                if let Some(reg) = Self::as_tmp(&r) {
                    self.free_tmp(reg);
                }
                Ok(Operand::NULL)
            }

            AstKind::Declaration { symbol, init, .. } => {
                if let Some(init_id) = init {
                    let offset = self.symbols.symbol(symbol.expect("resolved")).stack_offset;
                    let r = self.compile_node(init_id)?;
                    self.code.push(Instruction::new(Opcode::St, Operand::reference(offset), r));
                    if let Some(reg) = Self::as_tmp(&r) {
                        self.free_tmp(reg);
                    }
                }
                Ok(Operand::NULL)
            }

            AstKind::FnRet { value } => {
                if let Some(v) = value {
                    let r = self.compile_node(v)?;
                    self.code.push(Instruction::new(Opcode::Ret, r, Operand::NULL));
                    if let Some(reg) = Self::as_tmp(&r) {
                        self.free_tmp(reg);
                    }
                } else {
                    self.code.push(Instruction::new(Opcode::Ret, Operand::NULL, Operand::NULL));
                }
                Ok(Operand::NULL)
            }

            AstKind::FnCall { symbol, args, target_symbol } => {
                let sym = symbol.expect("resolved");

                let entry_ip = self
                    .symbols
                    .symbol(sym)
                    .entry_ip
                    .ok_or_else(|| EmitError::CallUnresolvedEntry(self.symbols.symbol(sym).name.clone()))?;

                let params = self.fn_params.get(&sym).cloned().unwrap_or_default();
                for (i, &arg) in args.iter().enumerate() {
                    if let AstKind::FnArg { value } = self.ast.get(arg).kind {
                        let v = self.compile_node(value)?;
                        if let Some(&param) = params.get(i) {
                            let offset = self.symbols.symbol(param).stack_offset;
                            self.code.push(Instruction::new(Opcode::St, Operand::reference(offset), v));
                        }
                        if let Some(reg) = Self::as_tmp(&v) {
                            self.free_tmp(reg);
                        }
                    }
                }

                self.code.push(Instruction::new(Opcode::Call, Operand::immediate(entry_ip), Operand::NULL));

                if let Some(target) = target_symbol {
                    let offset = self.symbols.symbol(target).stack_offset;
                    self.code.push(Instruction::new(
                        Opcode::St,
                        Operand::reference(offset),
                        Operand::register(registers::FNR),
                    ));
                }

                Ok(Operand::register(registers::FNR))
            }

            AstKind::FnArg { value } => self.compile_node(value),

            AstKind::FnDef { .. } => Ok(Operand::NULL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulang_lexer::Lexer;
    use ulang_parser::Parser;

    fn emit(src: &str) -> Vec<Instruction> {
        try_emit(src).unwrap()
    }

    fn try_emit(src: &str) -> Result<Vec<Instruction>, EmitError> {
        let tokens = Lexer::new(src, "t.ul").tokenize().unwrap();
        let mut out = Parser::new(tokens).parse().unwrap();
        Emitter::new(&out.ast, &mut out.symbols).emit()
    }

    #[test]
    fn s1_mul_then_add_precede_the_store() {
        let code = emit("int32 x = 2 + 3 * 4;");
        let opcodes: Vec<Opcode> = code.iter().map(|i| i.opcode).collect();
        let mul_pos = opcodes.iter().position(|o| *o == Opcode::Mul).unwrap();
        let add_pos = opcodes.iter().position(|o| *o == Opcode::Add).unwrap();
        let st_pos = opcodes.iter().position(|o| *o == Opcode::St).unwrap();
        assert!(mul_pos < add_pos);
        assert!(add_pos < st_pos);
    }

    #[test]
    fn s4_initial_jmp_targets_the_top_level_entry() {
        let code = emit("fn int32 sq(int32 n) { return n * n; } int32 r = sq(7);");
        assert_eq!(code[0].opcode, Opcode::Jmp);
        let Operand { data: target, .. } = code[0].a;
        assert!(code[target as usize..].iter().any(|i| i.opcode == Opcode::Call));
    }

    #[test]
    fn program_ends_in_halt() {
        let code = emit("int32 x = 1;");
        assert_eq!(code.last().unwrap().opcode, Opcode::Halt);
    }

    #[test]
    fn calling_a_builtin_is_a_typed_emit_error_not_a_panic() {
        let err = try_emit("uPutChar();").unwrap_err();
        assert!(matches!(err, EmitError::CallUnresolvedEntry(name) if name == "uPutChar"));
    }

    #[test]
    fn calling_a_body_less_function_is_a_typed_emit_error_not_a_panic() {
        let err = try_emit("fn int32 later();  int32 x = later();").unwrap_err();
        assert!(matches!(err, EmitError::CallUnresolvedEntry(name) if name == "later"));
    }
}
