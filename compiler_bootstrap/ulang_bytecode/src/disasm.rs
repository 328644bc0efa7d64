//! Formats a container's instructions and metadata for the disassembler and
//! dumper binaries.

use crate::container::{Container, SYMBOL_FLAG_FUNCTION};
use crate::model::{Operand, OperandType};

fn format_operand(op: &Operand, container: &Container, resolve_symbols: bool) -> String {
    match op.ty {
        OperandType::Null => "-".to_string(),
        OperandType::Immediate => format!("#{}", op.data),
        OperandType::Constant => format!("c#{}", op.data),
        OperandType::Register => format!("r{}", op.data),
        OperandType::Reference => {
            if resolve_symbols {
                let found = container
                    .symbols
                    .iter()
                    .find(|s| s.flags & SYMBOL_FLAG_FUNCTION == 0 && s.stack_offset == op.data);
                if let Some(sym) = found {
                    return format!("&{}", sym.name);
                }
            }
            format!("&{:#x}", op.data)
        }
    }
}

/// One line per instruction: `<index>: <OPCODE> <a>, <b>`.
pub fn disassemble(container: &Container, resolve_symbols: bool) -> String {
    let mut out = String::new();
    for (i, ins) in container.code.iter().enumerate() {
        out.push_str(&format!(
            "{i:>5}: {:<6} {}, {}\n",
            format!("{:?}", ins.opcode).to_uppercase(),
            format_operand(&ins.a, container, resolve_symbols),
            format_operand(&ins.b, container, resolve_symbols),
        ));
    }
    out
}

/// Header and metadata summary for the dumper binary.
pub fn dump_metadata(container: &Container) -> String {
    let mut out = String::new();
    out.push_str(&format!("entry_offset: {}\n", container.entry_offset));
    out.push_str(&format!("flags: {:?}\n", container.flags));
    out.push_str(&format!("instructions: {}\n", container.code.len()));

    out.push_str(&format!("types ({}):\n", container.types.len()));
    for t in &container.types {
        out.push_str(&format!("  {} size={} flags={:#x}\n", t.name, t.size, t.flags));
    }

    out.push_str(&format!("symbols ({}):\n", container.symbols.len()));
    for s in &container.symbols {
        out.push_str(&format!(
            "  {} type_id={} stack_offset={} flags={:#x}\n",
            s.name, s.type_id, s.stack_offset, s.flags
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{MetaSymbol, MetaType};
    use crate::model::{registers, Instruction, Opcode};
    use crate::HeaderFlags;

    fn sample() -> Container {
        Container {
            code: vec![
                Instruction::new(Opcode::Ld, Operand::register(registers::TMP0), Operand::reference(8)),
                Instruction::new(Opcode::Halt, Operand::NULL, Operand::NULL),
            ],
            types: vec![MetaType { name: "int32".to_string(), size: 4, flags: 0 }],
            symbols: vec![MetaSymbol { name: "x".to_string(), type_id: 0, stack_offset: 8, flags: 0 }],
            entry_offset: 0,
            flags: HeaderFlags::empty(),
        }
    }

    #[test]
    fn resolves_references_to_symbol_names_when_asked() {
        let text = disassemble(&sample(), true);
        assert!(text.contains("&x"));
    }

    #[test]
    fn prints_raw_hex_offsets_without_the_symbol_flag() {
        let text = disassemble(&sample(), false);
        assert!(text.contains("&0x8"));
    }
}
