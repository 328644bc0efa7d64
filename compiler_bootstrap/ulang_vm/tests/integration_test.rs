//! End-to-end tests of the complete pipeline: source text -> lexer -> parser
//! -> emitter -> container round-trip -> VM execution.

use ulang_bytecode::{Container, Emitter};
use ulang_lexer::Lexer;
use ulang_parser::Parser;
use ulang_vm::engine::Machine;
use ulang_vm::error::VmError;

fn compile(src: &str) -> (Container, ulang_parser::SymbolTable) {
    let tokens = Lexer::new(src, "t.ul").tokenize().unwrap();
    let mut out = Parser::new(tokens).parse().unwrap();
    let code = Emitter::new(&out.ast, &mut out.symbols).emit().unwrap();
    (Container::from_compilation(code, &out.symbols), out.symbols)
}

fn var_value(machine: &Machine, symbols: &ulang_parser::SymbolTable, name: &str) -> u64 {
    let sym = symbols.iter().find(|s| s.name == name).unwrap();
    machine.heap().read_u64(sym.stack_offset).unwrap()
}

#[test]
fn pipeline_round_trips_through_the_container_format_and_executes() {
    let (container, symbols) = compile("int32 x = 2 + 3 * 4;");

    let bytes = container.serialize();
    let restored = Container::deserialize(&bytes).unwrap();
    assert_eq!(restored, container);

    let mut machine = Machine::init(256, 0);
    machine.run(&restored.code).unwrap();
    assert_eq!(var_value(&machine, &symbols, "x"), 14);
}

#[test]
fn function_call_and_division_compose_across_the_full_pipeline() {
    let (container, symbols) =
        compile("fn int32 sq(int32 n) { return n * n; } int32 a = 20; int32 b = 6; int32 q = a / b; int32 r = sq(q);");

    let mut machine = Machine::init(256, 0);
    machine.run(&container.code).unwrap();

    assert_eq!(var_value(&machine, &symbols, "q"), 3);
    assert_eq!(var_value(&machine, &symbols, "r"), 9);
}

#[test]
fn a_container_truncated_below_its_header_is_rejected_before_any_instruction_runs() {
    let (container, _) = compile("int32 x = 1;");
    let bytes = container.serialize();

    let truncated = &bytes[..bytes.len().min(10)];
    let err = Container::deserialize(truncated).unwrap_err();
    assert!(matches!(err, ulang_bytecode::ContainerError::Truncated(_)));
}

#[test]
fn runtime_division_by_zero_halts_execution_without_panicking() {
    let (container, _) = compile("int32 a = 10; int32 b = 0; int32 q = a / b;");
    let mut machine = Machine::init(256, 0);
    assert!(matches!(machine.run(&container.code), Err(VmError::DivisionByZero)));
}
