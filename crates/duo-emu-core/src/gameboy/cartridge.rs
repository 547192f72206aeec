use log::{debug, info, warn};

use crate::error::EmuError;
use crate::rom::Rom;

pub const ROM_SIZE: usize = 0x8000;
pub const RAM_SIZE: usize = 0x2000;

const TITLE_START: usize = 0x0134;
const TITLE_END: usize = 0x0143;
const HEADER_CHECKSUM: usize = 0x014D;

/// Mapper-less cartridge: 32 KiB of ROM and 8 KiB of external RAM.
pub struct Cartridge {
    rom: Box<[u8; ROM_SIZE]>,
    pub ram: Box<[u8; RAM_SIZE]>,
    pub title: String,
}

impl Cartridge {
    pub fn new(image: &Rom) -> Result<Self, EmuError> {
        let data = image.data();
        if data.len() > ROM_SIZE {
            return Err(EmuError::RomTooLarge {
                size: data.len(),
                capacity: ROM_SIZE,
            });
        }
        let mut rom = Box::new([0u8; ROM_SIZE]);
        rom[..data.len()].copy_from_slice(data);

        let title = header_title(&rom[..]);
        let raw_title = &rom[TITLE_START..=TITLE_END];
        if raw_title
            .iter()
            .take_while(|&&b| b != 0)
            .any(|b| !(0x20..=0x7E).contains(b))
        {
            warn!("Cartridge title has non-ASCII bytes {raw_title:02X?}");
        }
        debug!(
            "Header: title \"{title}\", type {:02X}, ROM size {:02X}, RAM size {:02X}",
            rom[0x0147], rom[0x0148], rom[0x0149]
        );
        let expected = rom[HEADER_CHECKSUM];
        let actual = header_checksum(&rom[..]);
        if expected != actual {
            warn!("Header checksum mismatch: header says {expected:02X}, computed {actual:02X}");
        }
        info!("Loaded cartridge \"{title}\" ({} bytes)", data.len());

        Ok(Self {
            rom,
            ram: Box::new([0; RAM_SIZE]),
            title,
        })
    }

    pub fn read_rom(&self, addr: u16) -> u8 {
        self.rom[(addr as usize) & (ROM_SIZE - 1)]
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        self.ram[(addr as usize) & (RAM_SIZE - 1)]
    }

    pub fn write_ram(&mut self, addr: u16, val: u8) {
        self.ram[(addr as usize) & (RAM_SIZE - 1)] = val;
    }
}

/// Printable ASCII from the title field, cut at the first NUL.
pub fn header_title(rom: &[u8]) -> String {
    rom[TITLE_START..=TITLE_END]
        .iter()
        .take_while(|&&b| b != 0)
        .filter(|&&b| (0x20..=0x7E).contains(&b))
        .map(|&b| b as char)
        .collect::<String>()
        .trim_end()
        .to_string()
}

pub fn header_checksum(rom: &[u8]) -> u8 {
    rom[TITLE_START..HEADER_CHECKSUM]
        .iter()
        .fold(0u8, |x, &b| x.wrapping_sub(b).wrapping_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_title(title: &[u8]) -> Vec<u8> {
        let mut rom = vec![0u8; ROM_SIZE];
        rom[TITLE_START..TITLE_START + title.len()].copy_from_slice(title);
        rom[HEADER_CHECKSUM] = header_checksum(&rom);
        rom
    }

    #[test]
    fn title_stops_at_nul() {
        let rom = image_with_title(b"TETRIS\0JUNK");
        assert_eq!(header_title(&rom), "TETRIS");
    }

    #[test]
    fn title_drops_unprintable_bytes() {
        let mut rom = image_with_title(b"MARIOLAND2\x01DMG");
        rom[TITLE_END] = 0x80;
        assert_eq!(header_title(&rom), "MARIOLAND2DMG");
    }

    #[test]
    fn small_images_are_zero_padded() {
        let cart = Cartridge::new(&Rom::from_bytes(vec![0x3E; 0x200]).unwrap()).unwrap();
        assert_eq!(cart.read_rom(0x01FF), 0x3E);
        assert_eq!(cart.read_rom(0x0200), 0x00);
        assert_eq!(cart.read_rom(0x7FFF), 0x00);
    }

    #[test]
    fn oversized_image_is_rejected() {
        let rom = Rom::from_bytes(vec![0; ROM_SIZE + 1]).unwrap();
        assert!(matches!(
            Cartridge::new(&rom),
            Err(EmuError::RomTooLarge { .. })
        ));
    }

    #[test]
    fn checksum_matches_known_header() {
        let rom = image_with_title(b"CPU_INSTRS");
        let cart = Cartridge::new(&Rom::from_bytes(rom.clone()).unwrap()).unwrap();
        assert_eq!(cart.title, "CPU_INSTRS");
        assert_eq!(header_checksum(&rom), rom[HEADER_CHECKSUM]);
    }
}
