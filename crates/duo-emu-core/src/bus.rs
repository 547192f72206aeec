//! Byte-addressed address spaces.
//!
//! Every machine exposes its memory map through [`BusView`] (side-effect free
//! reads, used by the disassembler and debuggers) and [`Bus`] (the processor's
//! read/write path). Addresses are 16 bits wide on both supported
//! architectures and every decoder is an exhaustive `match` over that range,
//! so an address can never fall outside the map.

/// Read-only view of an address space.
pub trait BusView {
    fn read_byte(&self, addr: u16) -> u8;

    /// Number of addressable bytes.
    fn memory_size(&self) -> usize {
        0x1_0000
    }

    /// Mask applied to addresses before decoding.
    fn memory_bounds_mask(&self) -> u16 {
        0xFFFF
    }
}

/// Read/write address space as seen by a processor.
pub trait Bus: BusView {
    fn write_byte(&mut self, addr: u16, value: u8);
}

/// 64 KiB of plain RAM with no I/O, used to run processors in isolation.
#[derive(Clone)]
pub struct FlatBus {
    pub mem: Box<[u8; 0x1_0000]>,
}

impl FlatBus {
    pub fn new() -> Self {
        Self {
            mem: Box::new([0; 0x1_0000]),
        }
    }

    /// Copies `data` into memory starting at `addr`, wrapping at the top of
    /// the address space.
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.mem[addr.wrapping_add(i as u16) as usize] = b;
        }
    }
}

impl Default for FlatBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusView for FlatBus {
    fn read_byte(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }
}

impl Bus for FlatBus {
    fn write_byte(&mut self, addr: u16, value: u8) {
        self.mem[addr as usize] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_bus_load_wraps() {
        let mut bus = FlatBus::new();
        bus.load(0xFFFF, &[0x12, 0x34]);
        assert_eq!(bus.read_byte(0xFFFF), 0x12);
        assert_eq!(bus.read_byte(0x0000), 0x34);
        assert_eq!(bus.memory_size(), 0x1_0000);
        assert_eq!(bus.memory_bounds_mask(), 0xFFFF);
    }
}
