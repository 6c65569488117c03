//! The symbol/value provider boundary.
//!
//! Everything the surrounding debugger owns - symbol tables, type
//! readers, target memory - reaches this crate through the [`Provider`]
//! trait. [`StaticProvider`] is a self-contained implementation over a
//! flat memory image, used by the test suites and by embedders that
//! want to evaluate expressions against synthetic state.

use std::cell::{Cell, RefCell};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::expr::error::EvalError;
use crate::types::Type;

/// Opaque reference to a lexical block used as a resolution scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u64);

/// Namespace a lookup searches in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolDomain {
    /// Variables, functions, typedefs.
    Var,
    /// Struct/union/enum tags.
    Tag,
    /// Source-file names (for `'file'::var` style references).
    File,
}

/// What a name resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SymbolKind {
    Variable { ty: Type, address: u64 },
    Function { ty: Type, address: u64 },
    Typedef { ty: Type },
    /// A named lexical block (function scope usable after `::`).
    Block { id: BlockId },
    /// A namespace or package; only valid as a qualified-name prefix.
    Scope,
    /// A source file name.
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
}

/// Result of a symbol lookup: the symbol, if any, plus whether the name
/// actually denotes a field of the current object (`this`/`self`), in
/// which case evaluation must go through the implicit receiver.
#[derive(Debug, Clone, Default)]
pub struct SymbolLookup {
    pub symbol: Option<Symbol>,
    pub is_field_of_this: bool,
}

impl SymbolLookup {
    pub fn none() -> SymbolLookup {
        SymbolLookup::default()
    }

    pub fn found(symbol: Symbol) -> SymbolLookup {
        SymbolLookup {
            symbol: Some(symbol),
            is_field_of_this: false,
        }
    }
}

pub trait Provider {
    /// Resolve a (possibly qualified) name in `scope`.
    fn lookup_symbol(
        &self,
        name: &str,
        scope: Option<BlockId>,
        domain: SymbolDomain,
    ) -> SymbolLookup;

    /// Resolve a type name in `scope`.
    fn lookup_type(&self, name: &str, scope: Option<BlockId>) -> Option<Type>;

    /// Fallback address-only lookup for names outside the symtab proper.
    fn lookup_minimal_symbol(&self, name: &str) -> Option<u64>;

    fn read_memory(&self, addr: u64, len: usize) -> Result<Vec<u8>, EvalError>;

    fn write_memory(&self, addr: u64, bytes: &[u8]) -> Result<(), EvalError>;

    /// Default base for unprefixed integer literals.
    fn current_radix(&self) -> u32 {
        10
    }

    /// Expansion text for a macro invocation, if `name` names one.
    fn expand_macro(&self, _name: &str) -> Option<String> {
        None
    }

    /// Read a NUL-terminated narrow string from target memory.
    fn read_c_string(&self, addr: u64, max: usize) -> Result<String, EvalError> {
        let mut out = String::new();
        let mut cur = addr;
        for _ in 0..max {
            let b = self.read_memory(cur, 1)?;
            if b[0] == 0 {
                break;
            }
            out.push(b[0] as char);
            cur += 1;
        }
        Ok(out)
    }
}

/// In-memory provider over `FxHashMap`s and a flat memory image.
pub struct StaticProvider {
    base: u64,
    memory: RefCell<Vec<u8>>,
    symbols: FxHashMap<String, Symbol>,
    types: FxHashMap<String, Type>,
    macros: FxHashMap<String, String>,
    fields_of_this: FxHashMap<String, ()>,
    radix: Cell<u32>,
}

impl StaticProvider {
    /// A provider backed by `size` zeroed bytes starting at `base`.
    pub fn new(base: u64, size: usize) -> StaticProvider {
        StaticProvider {
            base,
            memory: RefCell::new(vec![0u8; size]),
            symbols: FxHashMap::default(),
            types: FxHashMap::default(),
            macros: FxHashMap::default(),
            fields_of_this: FxHashMap::default(),
            radix: Cell::new(10),
        }
    }

    pub fn define_symbol(&mut self, symbol: Symbol) {
        self.symbols.insert(symbol.name.clone(), symbol);
    }

    pub fn define_variable(&mut self, name: &str, ty: Type, address: u64) {
        self.define_symbol(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Variable { ty, address },
        });
    }

    pub fn define_function(&mut self, name: &str, ty: Type, address: u64) {
        self.define_symbol(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Function { ty, address },
        });
    }

    pub fn define_type(&mut self, name: &str, ty: Type) {
        self.types.insert(name.to_string(), ty);
    }

    pub fn define_macro(&mut self, name: &str, expansion: &str) {
        self.macros.insert(name.to_string(), expansion.to_string());
    }

    /// Mark `name` as a field of the implicit `this` object.
    pub fn define_field_of_this(&mut self, name: &str) {
        self.fields_of_this.insert(name.to_string(), ());
    }

    pub fn set_radix(&self, radix: u32) {
        self.radix.set(radix);
    }

    /// Write raw bytes into the image (setup, not target mutation).
    pub fn poke(&self, addr: u64, bytes: &[u8]) {
        let off = (addr - self.base) as usize;
        let mut mem = self.memory.borrow_mut();
        mem[off..off + bytes.len()].copy_from_slice(bytes);
    }

    pub fn peek(&self, addr: u64, len: usize) -> Vec<u8> {
        let off = (addr - self.base) as usize;
        self.memory.borrow()[off..off + len].to_vec()
    }
}

impl Provider for StaticProvider {
    fn lookup_symbol(
        &self,
        name: &str,
        _scope: Option<BlockId>,
        domain: SymbolDomain,
    ) -> SymbolLookup {
        if domain == SymbolDomain::Var && self.fields_of_this.contains_key(name) {
            return SymbolLookup {
                symbol: None,
                is_field_of_this: true,
            };
        }
        match self.symbols.get(name) {
            Some(sym) => {
                let matches_domain = match domain {
                    SymbolDomain::Var => !matches!(sym.kind, SymbolKind::File),
                    SymbolDomain::Tag => matches!(sym.kind, SymbolKind::Typedef { .. }),
                    SymbolDomain::File => matches!(sym.kind, SymbolKind::File),
                };
                if matches_domain {
                    SymbolLookup::found(sym.clone())
                } else {
                    SymbolLookup::none()
                }
            }
            None => SymbolLookup::none(),
        }
    }

    fn lookup_type(&self, name: &str, _scope: Option<BlockId>) -> Option<Type> {
        if let Some(ty) = self.types.get(name) {
            return Some(ty.clone());
        }
        match self.symbols.get(name) {
            Some(Symbol {
                kind: SymbolKind::Typedef { ty },
                ..
            }) => Some(ty.clone()),
            _ => None,
        }
    }

    fn lookup_minimal_symbol(&self, name: &str) -> Option<u64> {
        match self.symbols.get(name) {
            Some(Symbol {
                kind: SymbolKind::Variable { address, .. },
                ..
            })
            | Some(Symbol {
                kind: SymbolKind::Function { address, .. },
                ..
            }) => Some(*address),
            _ => None,
        }
    }

    fn read_memory(&self, addr: u64, len: usize) -> Result<Vec<u8>, EvalError> {
        let mem = self.memory.borrow();
        let off = addr
            .checked_sub(self.base)
            .ok_or(EvalError::MemoryAccess { address: addr })? as usize;
        if off + len > mem.len() {
            return Err(EvalError::MemoryAccess { address: addr });
        }
        Ok(mem[off..off + len].to_vec())
    }

    fn write_memory(&self, addr: u64, bytes: &[u8]) -> Result<(), EvalError> {
        let mut mem = self.memory.borrow_mut();
        let off = addr
            .checked_sub(self.base)
            .ok_or(EvalError::MemoryAccess { address: addr })? as usize;
        if off + bytes.len() > mem.len() {
            return Err(EvalError::MemoryAccess { address: addr });
        }
        mem[off..off + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn current_radix(&self) -> u32 {
        self.radix.get()
    }

    fn expand_macro(&self, name: &str) -> Option<String> {
        self.macros.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_bounds_are_checked() {
        let p = StaticProvider::new(0x1000, 16);
        assert!(p.read_memory(0x1000, 16).is_ok());
        assert!(p.read_memory(0x1008, 16).is_err());
        assert!(p.read_memory(0x800, 4).is_err());
    }

    #[test]
    fn symbol_domains() {
        let mut p = StaticProvider::new(0x1000, 16);
        p.define_variable("x", Type::int(), 0x1000);
        assert!(p
            .lookup_symbol("x", None, SymbolDomain::Var)
            .symbol
            .is_some());
        assert!(p
            .lookup_symbol("x", None, SymbolDomain::File)
            .symbol
            .is_none());
    }

    #[test]
    fn field_of_this_shadows_nothing() {
        let mut p = StaticProvider::new(0x1000, 16);
        p.define_field_of_this("count");
        let r = p.lookup_symbol("count", None, SymbolDomain::Var);
        assert!(r.symbol.is_none());
        assert!(r.is_field_of_this);
    }

    #[test]
    fn c_string_read() {
        let p = StaticProvider::new(0x1000, 16);
        p.poke(0x1000, b"Point\0");
        assert_eq!(p.read_c_string(0x1000, 16).unwrap(), "Point");
    }
}
