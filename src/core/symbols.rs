use log::{debug, trace};
use once_cell::sync::OnceCell;

use super::{
    config::Environment,
    error::LoadError,
    loader::{die, DynamicLoader, LoadedLibrary, NativeLibrary, RawSymbol},
};

/// Core entry point probed to tell wgpu-native apart from an unrelated file
/// that happens to share its name.
pub const PROBE_SYMBOL: &str = "wgpuCreateInstance";

/// Longest name accepted by `symbol_present_utf8`.
pub const MAX_SYMBOL_NAME_LEN: usize = 256;

impl<L: DynamicLoader, E: Environment> NativeLibrary<L, E> {
    pub fn try_resolve_required(&self, name: &str) -> Result<RawSymbol, LoadError> {
        if name.is_empty() {
            return Err(LoadError::EmptySymbolName);
        }
        let lib = self.try_open()?;
        lib.symbol(name).ok_or_else(|| LoadError::SymbolNotFound {
            name: name.to_owned(),
        })
    }

    /// Aborts with a diagnostic on an empty name, a missing library or a
    /// missing symbol.
    pub fn resolve_required(&self, name: &str) -> RawSymbol {
        match self.try_resolve_required(name) {
            Ok(sym) => sym,
            Err(err) => die(&err),
        }
    }

    pub fn resolve_optional(&self, name: &str) -> Option<RawSymbol> {
        if name.is_empty() {
            return None;
        }
        let sym = self.open_optional()?.symbol(name);
        if sym.is_none() {
            debug!("optional symbol `{name}` not present");
        }
        sym
    }

    pub fn probe_availability(&self) -> bool {
        self.resolve_optional(PROBE_SYMBOL).is_some()
    }

    /// Presence check for a symbol name passed as a UTF-8 byte slice.
    pub fn symbol_present_utf8(&self, name: &[u8]) -> bool {
        if name.is_empty() || name.len() > MAX_SYMBOL_NAME_LEN || name.contains(&0) {
            return false;
        }
        match std::str::from_utf8(name) {
            Ok(name) => self.resolve_optional(name).is_some(),
            Err(_) => false,
        }
    }
}

/// One memoized optional lookup, meant to live in a `static` at its call site.
///
/// The first lookup's outcome, present or absent, is kept for the rest of
/// the process.
pub struct CachedSymbol {
    name: &'static str,
    cell: OnceCell<Option<RawSymbol>>,
}

impl CachedSymbol {
    pub const fn new(name: &'static str) -> Self {
        CachedSymbol {
            name,
            cell: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get<L: DynamicLoader, E: Environment>(
        &self,
        lib: &NativeLibrary<L, E>,
    ) -> Option<RawSymbol> {
        *self.cell.get_or_init(|| {
            let sym = lib.resolve_optional(self.name);
            trace!("cached lookup of `{}`: {}", self.name, sym.is_some());
            sym
        })
    }
}
