//! The straight-line dispatch loop: register file, stack, and heap tied
//! together into one executing machine.

use crate::error::VmError;
use crate::heap::Heap;
use crate::registers::RegisterFile;
use ulang_bytecode::{registers, Instruction, Opcode, Operand, OperandType};

pub const STACK_SIZE: usize = 256 * 1024;

pub struct Machine {
    regs: RegisterFile,
    stack: Vec<u8>,
    heap: Heap,
    pc: u64,
    running: bool,
}

impl Machine {
    /// Zeros the register file, points `SP` at the top of the stack
    /// buffer, initializes the heap, and sets `PC = 0`.
    pub fn init(heapsize_start_kb: u32, heapsize_limit_kb: u32) -> Self {
        log::info!(
            "INIT: register size: {}, count: {}; total register-occupied memory: {}; stack size: {STACK_SIZE}",
            std::mem::size_of::<u64>(),
            registers::REGISTER_FILE_LEN,
            std::mem::size_of::<u64>() * registers::REGISTER_FILE_LEN,
        );

        let mut regs = RegisterFile::new();
        regs.set(registers::SP, STACK_SIZE as u64);

        Self { regs, stack: vec![0u8; STACK_SIZE], heap: Heap::new(heapsize_start_kb, heapsize_limit_kb), pc: 0, running: false }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn register(&self, idx: u8) -> u64 {
        self.regs.get(idx)
    }

    fn read(&self, op: &Operand) -> Result<u64, VmError> {
        match op.ty {
            OperandType::Immediate | OperandType::Constant => Ok(op.data as u64),
            OperandType::Register => Ok(self.regs.get(op.data as u8)),
            OperandType::Reference => self.heap.read_u64(op.data),
            OperandType::Null => Ok(0),
        }
    }

    fn write(&mut self, op: &Operand, value: u64) -> Result<(), VmError> {
        match op.ty {
            OperandType::Register => {
                self.regs.set(op.data as u8, value);
                Ok(())
            }
            OperandType::Reference => self.heap.write_u64(op.data, value),
            _ => Err(VmError::OperandNotWriteable),
        }
    }

    fn push_stack(&mut self, value: u64) -> Result<(), VmError> {
        let sp = self.regs.get(registers::SP);
        if sp < 8 {
            return Err(VmError::StackOverflow);
        }
        let new_sp = sp - 8;
        self.stack[new_sp as usize..new_sp as usize + 8].copy_from_slice(&value.to_le_bytes());
        self.regs.set(registers::SP, new_sp);
        Ok(())
    }

    fn pop_stack(&mut self) -> Result<u64, VmError> {
        let sp = self.regs.get(registers::SP);
        if sp as usize + 8 > self.stack.len() {
            return Err(VmError::StackUnderflow);
        }
        let bytes: [u8; 8] = self.stack[sp as usize..sp as usize + 8].try_into().unwrap();
        self.regs.set(registers::SP, sp + 8);
        Ok(u64::from_le_bytes(bytes))
    }

    /// Straight-line dispatch: while `running ∧ PC < len(program)`, execute
    /// `program[PC]`, then `PC += 1` unless the instruction wrote `PC`.
    pub fn run(&mut self, program: &[Instruction]) -> Result<(), VmError> {
        self.running = true;
        self.pc = 0;

        while self.running && (self.pc as usize) < program.len() {
            let ins = program[self.pc as usize];
            let wrote_pc = self.execute(&ins)?;
            if !wrote_pc {
                self.pc += 1;
            }
        }
        Ok(())
    }

    /// Executes one instruction; returns whether it wrote `PC` itself (and
    /// so the dispatch loop must not auto-increment).
    fn execute(&mut self, ins: &Instruction) -> Result<bool, VmError> {
        match ins.opcode {
            Opcode::Nop => Ok(false),

            Opcode::Push => {
                let v = self.read(&ins.a)?;
                self.push_stack(v)?;
                Ok(false)
            }

            Opcode::Pop => {
                let v = self.pop_stack()?;
                if ins.a.ty == OperandType::Register {
                    self.write(&ins.a, v)?;
                }
                Ok(false)
            }

            Opcode::Add | Opcode::Sub | Opcode::Mul => {
                let lhs = self.read(&ins.a)?;
                let rhs = self.read(&ins.b)?;
                let result = match ins.opcode {
                    Opcode::Add => lhs.wrapping_add(rhs),
                    Opcode::Sub => lhs.wrapping_sub(rhs),
                    Opcode::Mul => lhs.wrapping_mul(rhs),
                    _ => unreachable!(),
                };
                self.write(&ins.a, result)?;
                self.set_zero_flag(result == 0);
                Ok(false)
            }

            Opcode::Div => {
                let lhs = self.read(&ins.a)?;
                let rhs = self.read(&ins.b)?;
                if rhs == 0 {
                    return Err(VmError::DivisionByZero);
                }
                self.write(&ins.a, lhs / rhs)?;
                self.regs.set(registers::TMP0, lhs % rhs);
                self.set_zero_flag(lhs / rhs == 0);
                Ok(false)
            }

            Opcode::Mov => {
                if ins.a.ty != OperandType::Register {
                    return Err(VmError::InvalidOperand("MOV destination must be a register".to_string()));
                }
                let v = self.read(&ins.b)?;
                self.write(&ins.a, v)?;
                Ok(false)
            }

            Opcode::Ld => {
                let v = self.read(&ins.b)?;
                self.write(&ins.a, v)?;
                Ok(false)
            }

            Opcode::St => {
                if ins.a.ty != OperandType::Reference {
                    return Err(VmError::InvalidOperand("ST destination must be a heap reference".to_string()));
                }
                let v = self.read(&ins.b)?;
                self.write(&ins.a, v)?;
                Ok(false)
            }

            Opcode::Jmp => {
                self.pc = self.read(&ins.a)?;
                Ok(true)
            }

            Opcode::Jz => {
                if self.regs.get(registers::FLAGS) & 1 != 0 {
                    self.pc = self.read(&ins.a)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }

            Opcode::Call => {
                self.push_stack(self.pc + 1)?;
                self.pc = self.read(&ins.a)?;
                Ok(true)
            }

            Opcode::Ret => {
                if !ins.a.is_null() {
                    let v = self.read(&ins.a)?;
                    self.regs.set(registers::FNR, v);
                }
                self.pc = self.pop_stack()?;
                Ok(true)
            }

            Opcode::Halt => {
                self.running = false;
                Ok(false)
            }
        }
    }

    fn set_zero_flag(&mut self, zero: bool) {
        let flags = self.regs.get(registers::FLAGS);
        let updated = if zero { flags | 1 } else { flags & !1 };
        self.regs.set(registers::FLAGS, updated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulang_bytecode::Emitter;
    use ulang_lexer::Lexer;
    use ulang_parser::Parser;

    fn run(src: &str) -> (Machine, Vec<Instruction>, ulang_parser::SymbolTable) {
        let tokens = Lexer::new(src, "t.ul").tokenize().unwrap();
        let mut out = Parser::new(tokens).parse().unwrap();
        let code = Emitter::new(&out.ast, &mut out.symbols).emit().unwrap();
        let mut machine = Machine::init(256, 0);
        machine.run(&code).unwrap();
        (machine, code, out.symbols)
    }

    fn var_value(machine: &Machine, symbols: &ulang_parser::SymbolTable, name: &str) -> u64 {
        let sym = symbols.iter().find(|s| s.name == name).unwrap();
        machine.heap.read_u64(sym.stack_offset).unwrap()
    }

    #[test]
    fn s1_arithmetic_precedence_evaluates_to_fourteen() {
        let (machine, _, symbols) = run("int32 x = 2 + 3 * 4;");
        assert_eq!(var_value(&machine, &symbols, "x"), 14);
    }

    #[test]
    fn s2_integer_division_truncates_with_remainder_in_tmp0() {
        let (machine, _, symbols) = run("int32 a = 10; int32 b = 3; int32 q = a / b;");
        assert_eq!(var_value(&machine, &symbols, "q"), 3);
        assert_eq!(machine.register(registers::TMP0), 1);
    }

    #[test]
    fn s4_function_call_computes_square() {
        let (machine, _, symbols) = run("fn int32 sq(int32 n) { return n * n; } int32 r = sq(7);");
        assert_eq!(var_value(&machine, &symbols, "r"), 49);
    }

    #[test]
    fn function_call_does_not_clobber_a_caller_variable_sharing_the_params_local_offset() {
        let (machine, _, symbols) =
            run("int32 a = 10; fn int32 sq(int32 n) { return n * n; } int32 r = sq(5); int32 z = a + 1;");
        assert_eq!(var_value(&machine, &symbols, "z"), 11);
        assert_eq!(var_value(&machine, &symbols, "r"), 25);
    }

    #[test]
    fn division_by_runtime_zero_halts_with_error() {
        let tokens = Lexer::new("int32 a = 10; int32 b = 0; int32 q = a / b;", "t.ul").tokenize().unwrap();
        let mut out = Parser::new(tokens).parse().unwrap();
        let code = Emitter::new(&out.ast, &mut out.symbols).emit().unwrap();
        let mut machine = Machine::init(256, 0);
        assert!(matches!(machine.run(&code), Err(VmError::DivisionByZero)));
    }
}
