//! Bytecode container: header + code section + metadata section (type
//! table, symbol table, string pool), byte-exact per the external format.

use crate::error::ContainerError;
use crate::model::{Instruction, INSTRUCTION_SIZE};
use bitflags::bitflags;
use ulang_parser::{SymbolKind, SymbolOrigin, SymbolTable};
use ulang_types::DataType;

pub const MAGIC: [u8; 6] = *b"ULANG0";
pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;
pub const HEADER_SIZE: u16 = 60;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u32 {
        const DEBUG = 1 << 0;
        const STRIPPED = 1 << 1;
        const SIGNED_VM = 1 << 2;
        const OPTIMIZED = 1 << 3;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version_major: u8,
    pub version_minor: u8,
    pub endian: u8,
    pub word_size: u8,
    pub flags: HeaderFlags,
    pub code_offset: u32,
    pub code_size: u32,
    pub data_offset: u32,
    pub data_size: u32,
    pub meta_offset: u32,
    pub meta_size: u32,
    pub checksum: u32,
    pub checksum_type: u8,
    pub entry_offset: u64,
}

impl Header {
    fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        let mut w = 0;
        macro_rules! put {
            ($bytes:expr) => {{
                let b = $bytes;
                buf[w..w + b.len()].copy_from_slice(&b);
                w += b.len();
            }};
        }
        put!(MAGIC);
        put!([self.version_major]);
        put!([self.version_minor]);
        put!([self.endian]);
        put!([self.word_size]);
        put!(HEADER_SIZE.to_le_bytes());
        put!(self.flags.bits().to_le_bytes());
        put!(self.code_offset.to_le_bytes());
        put!(self.code_size.to_le_bytes());
        put!(self.data_offset.to_le_bytes());
        put!(self.data_size.to_le_bytes());
        put!(self.meta_offset.to_le_bytes());
        put!(self.meta_size.to_le_bytes());
        put!(self.checksum.to_le_bytes());
        put!([self.checksum_type]);
        put!(self.entry_offset.to_le_bytes());
        let _ = w; // remaining bytes are the reserved tail, already zeroed
        buf
    }

    fn decode(buf: &[u8]) -> Result<Self, ContainerError> {
        if buf.len() < HEADER_SIZE as usize {
            return Err(ContainerError::Truncated(format!(
                "file is {} bytes, shorter than the {}-byte header",
                buf.len(),
                HEADER_SIZE
            )));
        }
        if buf[0..6] != MAGIC {
            return Err(ContainerError::InvalidHeader("bad magic".to_string()));
        }

        let endian = buf[8];
        if endian != 0 {
            return Err(ContainerError::InvalidHeader(format!("unsupported endian byte {endian}")));
        }
        let word_size = buf[9];
        if word_size != 4 && word_size != 8 {
            return Err(ContainerError::InvalidHeader(format!("unsupported word size {word_size}")));
        }

        let header_size = u16::from_le_bytes(buf[10..12].try_into().unwrap());
        if header_size != HEADER_SIZE {
            return Err(ContainerError::InvalidHeader(format!("unexpected header_size {header_size}")));
        }

        let flags = HeaderFlags::from_bits_truncate(u32::from_le_bytes(buf[12..16].try_into().unwrap()));
        let code_offset = u32::from_le_bytes(buf[16..20].try_into().unwrap());
        let code_size = u32::from_le_bytes(buf[20..24].try_into().unwrap());
        let data_offset = u32::from_le_bytes(buf[24..28].try_into().unwrap());
        let data_size = u32::from_le_bytes(buf[28..32].try_into().unwrap());
        let meta_offset = u32::from_le_bytes(buf[32..36].try_into().unwrap());
        let meta_size = u32::from_le_bytes(buf[36..40].try_into().unwrap());
        let checksum = u32::from_le_bytes(buf[40..44].try_into().unwrap());
        let checksum_type = buf[44];
        let entry_offset = u64::from_le_bytes(buf[45..53].try_into().unwrap());

        Ok(Self {
            version_major: buf[6],
            version_minor: buf[7],
            endian,
            word_size,
            flags,
            code_offset,
            code_size,
            data_offset,
            data_size,
            meta_offset,
            meta_size,
            checksum,
            checksum_type,
            entry_offset,
        })
    }
}

/// Appends NUL-terminated strings; insertion is idempotent-by-append — the
/// returned offset is the pool's size before concatenation, no deduping.
#[derive(Debug, Default)]
struct StringPool(Vec<u8>);

impl StringPool {
    fn insert(&mut self, s: &str) -> u32 {
        let offset = self.0.len() as u32;
        self.0.extend_from_slice(s.as_bytes());
        self.0.push(0);
        offset
    }
}

fn read_cstr(pool: &[u8], offset: u32) -> Result<&str, ContainerError> {
    let start = offset as usize;
    if start >= pool.len() {
        return Err(ContainerError::Truncated(format!("string offset {offset} beyond pool of {} bytes", pool.len())));
    }
    let end = pool[start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ContainerError::Truncated("unterminated string in pool".to_string()))?;
    std::str::from_utf8(&pool[start..start + end])
        .map_err(|_| ContainerError::InvalidHeader("string pool entry is not valid UTF-8".to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaType {
    pub name: String,
    pub size: u32,
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaSymbol {
    pub name: String,
    pub type_id: u32,
    pub stack_offset: u32,
    pub flags: u32,
}

pub const SYMBOL_FLAG_FUNCTION: u32 = 1 << 0;
pub const SYMBOL_FLAG_BUILTIN: u32 = 1 << 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub code: Vec<Instruction>,
    pub types: Vec<MetaType>,
    pub symbols: Vec<MetaSymbol>,
    pub entry_offset: u64,
    pub flags: HeaderFlags,
}

impl Container {
    pub fn from_compilation(code: Vec<Instruction>, symbol_table: &SymbolTable) -> Self {
        let types: Vec<MetaType> = ulang_types::CATALOG
            .iter()
            .map(|t| MetaType { name: t.name.to_string(), size: t.size_bytes, flags: t.flags.bits() as u32 })
            .collect();

        let type_index = |ty: &'static DataType| -> u32 {
            ulang_types::CATALOG.iter().position(|t| std::ptr::eq(*t, ty)).expect("every symbol type is in the catalog") as u32
        };

        let symbols = symbol_table
            .iter()
            .map(|s| {
                let mut flags = 0;
                if s.kind == SymbolKind::Function {
                    flags |= SYMBOL_FLAG_FUNCTION;
                }
                if s.origin == SymbolOrigin::Builtin {
                    flags |= SYMBOL_FLAG_BUILTIN;
                }
                MetaSymbol { name: s.name.clone(), type_id: type_index(s.type_ref), stack_offset: s.stack_offset, flags }
            })
            .collect();

        Self { code, types, symbols, entry_offset: 0, flags: HeaderFlags::empty() }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut code_bytes = Vec::with_capacity(self.code.len() * INSTRUCTION_SIZE);
        for ins in &self.code {
            code_bytes.extend_from_slice(&ins.encode());
        }

        let mut pool = StringPool::default();
        let mut type_bytes = Vec::with_capacity(self.types.len() * 12);
        for t in &self.types {
            let name_offset = pool.insert(&t.name);
            type_bytes.extend_from_slice(&name_offset.to_le_bytes());
            type_bytes.extend_from_slice(&t.size.to_le_bytes());
            type_bytes.extend_from_slice(&t.flags.to_le_bytes());
        }

        let mut symbol_bytes = Vec::with_capacity(self.symbols.len() * 16);
        for s in &self.symbols {
            let name_offset = pool.insert(&s.name);
            symbol_bytes.extend_from_slice(&name_offset.to_le_bytes());
            symbol_bytes.extend_from_slice(&s.type_id.to_le_bytes());
            symbol_bytes.extend_from_slice(&s.stack_offset.to_le_bytes());
            symbol_bytes.extend_from_slice(&s.flags.to_le_bytes());
        }

        let mut meta_bytes = Vec::new();
        meta_bytes.extend_from_slice(&(self.symbols.len() as u32).to_le_bytes());
        meta_bytes.extend_from_slice(&(self.types.len() as u32).to_le_bytes());
        meta_bytes.extend_from_slice(&(pool.0.len() as u32).to_le_bytes());
        meta_bytes.extend_from_slice(&type_bytes);
        meta_bytes.extend_from_slice(&symbol_bytes);
        meta_bytes.extend_from_slice(&pool.0);

        let code_offset = HEADER_SIZE as u32;
        let meta_offset = code_offset + code_bytes.len() as u32;

        let mut checksum_input = Vec::with_capacity(code_bytes.len() + meta_bytes.len());
        checksum_input.extend_from_slice(&code_bytes);
        checksum_input.extend_from_slice(&meta_bytes);
        let checksum = crc32fast::hash(&checksum_input);

        let header = Header {
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            endian: 0,
            word_size: 8,
            flags: self.flags,
            code_offset,
            code_size: code_bytes.len() as u32,
            data_offset: meta_offset,
            data_size: 0,
            meta_offset,
            meta_size: meta_bytes.len() as u32,
            checksum,
            checksum_type: 1,
            entry_offset: self.entry_offset,
        };

        let mut out = Vec::with_capacity(HEADER_SIZE as usize + code_bytes.len() + meta_bytes.len());
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&code_bytes);
        out.extend_from_slice(&meta_bytes);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ContainerError> {
        let header = Header::decode(bytes)?;

        let code_end = header.code_offset as usize + header.code_size as usize;
        let meta_end = header.meta_offset as usize + header.meta_size as usize;
        if code_end > bytes.len() || meta_end > bytes.len() {
            return Err(ContainerError::Truncated(format!(
                "file is {} bytes but sections require at least {}",
                bytes.len(),
                code_end.max(meta_end)
            )));
        }
        if !(header.code_size as usize).is_multiple_of(INSTRUCTION_SIZE) {
            return Err(ContainerError::InvalidHeader("code_size is not a multiple of the instruction width".to_string()));
        }

        if header.checksum_type == 1 {
            let mut input = Vec::with_capacity(header.code_size as usize + header.meta_size as usize);
            input.extend_from_slice(&bytes[header.code_offset as usize..code_end]);
            input.extend_from_slice(&bytes[header.meta_offset as usize..meta_end]);
            if crc32fast::hash(&input) != header.checksum {
                return Err(ContainerError::Checksum);
            }
        }

        let mut code = Vec::with_capacity(header.code_size as usize / INSTRUCTION_SIZE);
        let code_bytes = &bytes[header.code_offset as usize..code_end];
        for chunk in code_bytes.chunks_exact(INSTRUCTION_SIZE) {
            let arr: [u8; INSTRUCTION_SIZE] = chunk.try_into().unwrap();
            let ins = Instruction::decode(&arr)
                .ok_or_else(|| ContainerError::InvalidHeader("malformed instruction in code section".to_string()))?;
            code.push(ins);
        }

        let meta = &bytes[header.meta_offset as usize..meta_end];
        if meta.len() < 12 {
            return Err(ContainerError::Truncated("metadata section shorter than MetaHeader".to_string()));
        }
        let symbol_count = u32::from_le_bytes(meta[0..4].try_into().unwrap()) as usize;
        let type_count = u32::from_le_bytes(meta[4..8].try_into().unwrap()) as usize;
        let string_pool_size = u32::from_le_bytes(meta[8..12].try_into().unwrap()) as usize;

        let types_start = 12;
        let types_end = types_start + type_count * 12;
        let symbols_start = types_end;
        let symbols_end = symbols_start + symbol_count * 16;
        let pool_start = symbols_end;
        let pool_end = pool_start + string_pool_size;
        if pool_end > meta.len() {
            return Err(ContainerError::Truncated("metadata section bounds exceed its declared size".to_string()));
        }

        let pool = &meta[pool_start..pool_end];

        let mut types = Vec::with_capacity(type_count);
        for chunk in meta[types_start..types_end].chunks_exact(12) {
            let name_offset = u32::from_le_bytes(chunk[0..4].try_into().unwrap());
            let size = u32::from_le_bytes(chunk[4..8].try_into().unwrap());
            let flags = u32::from_le_bytes(chunk[8..12].try_into().unwrap());
            types.push(MetaType { name: read_cstr(pool, name_offset)?.to_string(), size, flags });
        }

        let mut symbols = Vec::with_capacity(symbol_count);
        for chunk in meta[symbols_start..symbols_end].chunks_exact(16) {
            let name_offset = u32::from_le_bytes(chunk[0..4].try_into().unwrap());
            let type_id = u32::from_le_bytes(chunk[4..8].try_into().unwrap());
            if type_id as usize >= types.len() {
                return Err(ContainerError::InvalidHeader(format!("symbol references out-of-range type_id {type_id}")));
            }
            let stack_offset = u32::from_le_bytes(chunk[8..12].try_into().unwrap());
            let flags = u32::from_le_bytes(chunk[12..16].try_into().unwrap());
            symbols.push(MetaSymbol { name: read_cstr(pool, name_offset)?.to_string(), type_id, stack_offset, flags });
        }

        Ok(Self { code, types, symbols, entry_offset: header.entry_offset, flags: header.flags })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{registers, Opcode, Operand};

    fn sample() -> Container {
        let code = vec![
            Instruction::new(Opcode::Ld, Operand::register(registers::TMP0), Operand::reference(0)),
            Instruction::new(Opcode::Halt, Operand::NULL, Operand::NULL),
        ];
        Container {
            code,
            types: vec![MetaType { name: "int32".to_string(), size: 4, flags: 0 }],
            symbols: vec![MetaSymbol { name: "x".to_string(), type_id: 0, stack_offset: 0, flags: 0 }],
            entry_offset: 0,
            flags: HeaderFlags::empty(),
        }
    }

    #[test]
    fn round_trips_bit_identically() {
        let original = sample();
        let bytes = original.serialize();
        let decoded = Container::deserialize(&bytes).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.serialize(), bytes);
    }

    #[test]
    fn s7_truncated_file_raises_truncated_error() {
        let bytes = sample().serialize();
        let truncated = &bytes[..HEADER_SIZE as usize + 3];
        let err = Container::deserialize(truncated).unwrap_err();
        assert!(matches!(err, ContainerError::Truncated(_)));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = sample().serialize();
        bytes[0] = b'X';
        assert!(matches!(Container::deserialize(&bytes), Err(ContainerError::InvalidHeader(_))));
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut bytes = sample().serialize();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(Container::deserialize(&bytes), Err(ContainerError::Checksum)));
    }
}
