//! Row-indexed instruction listing over a bus, plus the breakpoint set.
//!
//! Rows are numbered by decoding sequentially from address 0: row 0 is the
//! instruction at 0, row 1 the one after it, and so on until the end of the
//! bus's addressable memory. Rows are decoded lazily and cached; the cache is
//! only valid while the bytes it was built from are unchanged, so callers
//! [`sync_to`](Disassembler::sync_to) the program counter after execution
//! and [`invalidate`](Disassembler::invalidate) on reset or ROM load.

use std::collections::BTreeSet;

use crate::bus::BusView;
use crate::cdp1802;
use crate::error::Architecture;
use crate::sm83;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub address: u16,
    pub length: u8,
    pub bytecode: Vec<u8>,
    pub text: String,
}

pub fn instruction_length(arch: Architecture, bus: &dyn BusView, addr: u16) -> u8 {
    match arch {
        Architecture::Cdp1802 => cdp1802::disasm::instruction_length(bus, addr),
        Architecture::Sm83 => sm83::disasm::instruction_length(bus, addr),
    }
}

pub fn instruction_bytes(arch: Architecture, bus: &dyn BusView, addr: u16) -> Vec<u8> {
    match arch {
        Architecture::Cdp1802 => cdp1802::disasm::instruction_bytes(bus, addr),
        Architecture::Sm83 => sm83::disasm::instruction_bytes(bus, addr),
    }
}

pub fn instruction_text(arch: Architecture, bus: &dyn BusView, addr: u16) -> String {
    match arch {
        Architecture::Cdp1802 => cdp1802::disasm::instruction_text(bus, addr),
        Architecture::Sm83 => sm83::disasm::instruction_text(bus, addr),
    }
}

/// Decodes the single instruction at `addr`.
pub fn decode(arch: Architecture, bus: &dyn BusView, addr: u16) -> Entry {
    let bytecode = instruction_bytes(arch, bus, addr);
    Entry {
        address: addr,
        length: bytecode.len() as u8,
        bytecode,
        text: instruction_text(arch, bus, addr),
    }
}

pub struct Disassembler {
    arch: Architecture,
    enabled: bool,
    /// Start address of every decoded row, ascending.
    rows: Vec<u16>,
    /// Rendered entries, parallel to `rows`.
    entries: Vec<Option<Entry>>,
    /// Sequential decoding ran past the end of memory.
    complete: bool,
    breakpoints: BTreeSet<u16>,
}

impl Disassembler {
    pub fn new(arch: Architecture) -> Self {
        Self {
            arch,
            enabled: true,
            rows: Vec::new(),
            entries: Vec::new(),
            complete: false,
            breakpoints: BTreeSet::new(),
        }
    }

    pub fn architecture(&self) -> Architecture {
        self.arch
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling drops the cache. Execution is unaffected either way.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.invalidate();
        }
    }

    pub fn invalidate(&mut self) {
        self.rows.clear();
        self.entries.clear();
        self.complete = false;
    }

    /// Rows decoded so far.
    pub fn decoded_rows(&self) -> usize {
        self.rows.len()
    }

    /// Keeps the cache consistent with a processor that is about to fetch
    /// from `pc`. If `pc` lands inside the decoded range but not on a row
    /// boundary the bytes (or the decode alignment) changed, so the cache is
    /// rebuilt.
    pub fn sync_to(&mut self, pc: u16) {
        let Some(&last) = self.rows.last() else {
            return;
        };
        if pc <= last && self.rows.binary_search(&pc).is_err() {
            self.invalidate();
        }
    }

    /// Decodes rows until row `ordinal` exists or memory runs out.
    fn extend_to_ordinal(&mut self, bus: &dyn BusView, ordinal: usize) {
        while !self.complete && self.rows.len() <= ordinal {
            self.push_next_row(bus);
        }
    }

    /// Decodes rows until one starts at or after `address`.
    fn extend_to_address(&mut self, bus: &dyn BusView, address: u16) {
        while !self.complete && self.rows.last().is_none_or(|&last| last < address) {
            self.push_next_row(bus);
        }
    }

    fn push_next_row(&mut self, bus: &dyn BusView) {
        let size = bus.memory_size();
        let next = match self.rows.last() {
            Some(&last) => {
                last as usize + instruction_length(self.arch, bus, last) as usize
            }
            None => 0,
        };
        if next >= size {
            self.complete = true;
            return;
        }
        self.rows.push(next as u16);
        self.entries.push(None);
    }

    /// The instruction at row `ordinal`, or `None` past the end of memory or
    /// while disabled.
    pub fn get_entry(&mut self, bus: &dyn BusView, ordinal: usize) -> Option<Entry> {
        if !self.enabled {
            return None;
        }
        self.extend_to_ordinal(bus, ordinal);
        let address = *self.rows.get(ordinal)?;
        let arch = self.arch;
        let entry = self.entries[ordinal].get_or_insert_with(|| decode(arch, bus, address));
        Some(entry.clone())
    }

    /// Row number of the instruction starting at `address`, or `None` if
    /// sequential decoding never starts an instruction there.
    pub fn get_ordinal_for_address(&mut self, bus: &dyn BusView, address: u16) -> Option<usize> {
        if !self.enabled {
            return None;
        }
        self.extend_to_address(bus, address);
        self.rows.binary_search(&address).ok()
    }

    /// Up to `count` entries starting `before` rows ahead of the row at
    /// `address`, or from `address` itself if it is not a row boundary.
    pub fn listing_around(
        &mut self,
        bus: &dyn BusView,
        address: u16,
        before: usize,
        count: usize,
    ) -> Vec<Entry> {
        if !self.enabled {
            return Vec::new();
        }
        match self.get_ordinal_for_address(bus, address) {
            Some(ordinal) => {
                let first = ordinal.saturating_sub(before);
                (first..first + count)
                    .map_while(|n| self.get_entry(bus, n))
                    .collect()
            }
            None => {
                let mut out = Vec::with_capacity(count);
                let mut addr = address as usize;
                while out.len() < count && addr < bus.memory_size() {
                    let entry = decode(self.arch, bus, addr as u16);
                    addr += entry.length as usize;
                    out.push(entry);
                }
                out
            }
        }
    }

    pub fn add_breakpoint(&mut self, address: u16) -> bool {
        self.breakpoints.insert(address)
    }

    pub fn remove_breakpoint(&mut self, address: u16) -> bool {
        self.breakpoints.remove(&address)
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    pub fn has_breakpoint(&self, address: u16) -> bool {
        self.breakpoints.contains(&address)
    }

    pub fn has_breakpoints(&self) -> bool {
        !self.breakpoints.is_empty()
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.breakpoints.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FlatBus;

    #[test]
    fn rows_follow_instruction_lengths() {
        let mut bus = FlatBus::new();
        bus.load(0x0000, &[0x00, 0x3E, 0x12, 0xC3, 0x00, 0x01, 0xCB, 0x7C]);
        let mut dis = Disassembler::new(Architecture::Sm83);

        let addrs: Vec<u16> = (0..4)
            .map(|n| dis.get_entry(&bus, n).unwrap().address)
            .collect();
        assert_eq!(addrs, [0x0000, 0x0001, 0x0003, 0x0006]);

        let jp = dis.get_entry(&bus, 2).unwrap();
        assert_eq!(jp.text, "JP $0100");
        assert_eq!(jp.bytecode, [0xC3, 0x00, 0x01]);
        assert_eq!(jp.length, 3);

        assert_eq!(dis.get_ordinal_for_address(&bus, 0x0006), Some(3));
        assert_eq!(dis.get_ordinal_for_address(&bus, 0x0002), None);
    }

    #[test]
    fn decoding_stops_at_memory_size() {
        struct Small([u8; 4]);
        impl BusView for Small {
            fn read_byte(&self, addr: u16) -> u8 {
                self.0[addr as usize & 3]
            }
            fn memory_size(&self) -> usize {
                4
            }
            fn memory_bounds_mask(&self) -> u16 {
                3
            }
        }
        // LDI #$00, SEQ, REQ
        let bus = Small([0xF8, 0x00, 0x7B, 0x7A]);
        let mut dis = Disassembler::new(Architecture::Cdp1802);
        assert_eq!(dis.get_entry(&bus, 2).unwrap().text, "REQ");
        assert!(dis.get_entry(&bus, 3).is_none());
        assert_eq!(dis.get_ordinal_for_address(&bus, 0x0100), None);
    }

    #[test]
    fn pc_inside_a_row_invalidates() {
        let mut bus = FlatBus::new();
        bus.load(0x0000, &[0x3E, 0x00, 0x00]);
        let mut dis = Disassembler::new(Architecture::Sm83);
        assert_eq!(dis.get_ordinal_for_address(&bus, 0x0002), Some(1));

        dis.sync_to(0x0002);
        assert_eq!(dis.decoded_rows(), 2);
        dis.sync_to(0x0001);
        assert_eq!(dis.decoded_rows(), 0);
    }

    #[test]
    fn disabled_decodes_nothing() {
        let bus = FlatBus::new();
        let mut dis = Disassembler::new(Architecture::Sm83);
        dis.set_enabled(false);
        assert!(dis.get_entry(&bus, 0).is_none());
        dis.add_breakpoint(0x0100);
        assert!(dis.has_breakpoint(0x0100));
    }

    #[test]
    fn breakpoint_set() {
        let mut dis = Disassembler::new(Architecture::Cdp1802);
        assert!(dis.add_breakpoint(0x0010));
        assert!(!dis.add_breakpoint(0x0010));
        dis.add_breakpoint(0x0004);
        assert_eq!(dis.breakpoints().collect::<Vec<_>>(), [0x0004, 0x0010]);
        assert!(dis.remove_breakpoint(0x0010));
        dis.clear_breakpoints();
        assert!(!dis.has_breakpoints());
    }
}
