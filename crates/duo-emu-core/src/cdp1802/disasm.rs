//! CDP1802 instruction decoding for listings.

use crate::bus::BusView;

const SHORT_BRANCHES: [&str; 16] = [
    "BR", "BQ", "BZ", "BDF", "B1", "B2", "B3", "B4", "SKP", "BNQ", "BNZ", "BNF", "BN1", "BN2",
    "BN3", "BN4",
];

const LONG_GROUP: [&str; 16] = [
    "LBR", "LBQ", "LBZ", "LBDF", "NOP", "LSNQ", "LSNZ", "LSNF", "LSKP", "LBNQ", "LBNZ", "LBNF",
    "LSIE", "LSQ", "LSZ", "LSDF",
];

const GROUP_7: [&str; 16] = [
    "RET", "DIS", "LDXA", "STXD", "ADC", "SDB", "SHRC", "SMB", "SAV", "MARK", "REQ", "SEQ",
    "ADCI", "SDBI", "SHLC", "SMBI",
];

const GROUP_F: [&str; 16] = [
    "LDX", "OR", "AND", "XOR", "ADD", "SD", "SHR", "SM", "LDI", "ORI", "ANI", "XRI", "ADI", "SDI",
    "SHL", "SMI",
];

/// Total bytes consumed by the instruction starting with `opcode`, including
/// the bytes a branch or skip steps over.
pub fn opcode_length(opcode: u8) -> u8 {
    match opcode {
        0x30..=0x3F => 2,
        0xC0..=0xCF if opcode & 0x04 == 0 => 3,
        0x7C | 0x7D | 0x7F => 2,
        0xF8..=0xFD | 0xFF => 2,
        _ => 1,
    }
}

pub fn instruction_length(bus: &dyn BusView, addr: u16) -> u8 {
    opcode_length(bus.read_byte(addr))
}

pub fn instruction_bytes(bus: &dyn BusView, addr: u16) -> Vec<u8> {
    let len = instruction_length(bus, addr);
    (0..len as u16)
        .map(|i| bus.read_byte(addr.wrapping_add(i)))
        .collect()
}

pub fn instruction_text(bus: &dyn BusView, addr: u16) -> String {
    let op = bus.read_byte(addr);
    let n = op & 0x0F;
    let imm = bus.read_byte(addr.wrapping_add(1));
    let imm16 = ((imm as u16) << 8) | bus.read_byte(addr.wrapping_add(2)) as u16;

    match op >> 4 {
        0x0 if n == 0 => "IDL".to_string(),
        0x0 => format!("LDN R{n:X}"),
        0x1 => format!("INC R{n:X}"),
        0x2 => format!("DEC R{n:X}"),
        0x3 if n == 0x8 => "SKP".to_string(),
        0x3 => {
            let page = addr.wrapping_add(1) & 0xFF00;
            format!("{} ${:04X}", SHORT_BRANCHES[n as usize], page | imm as u16)
        }
        0x4 => format!("LDA R{n:X}"),
        0x5 => format!("STR R{n:X}"),
        0x6 => match n {
            0x0 => "IRX".to_string(),
            0x8 => format!("DB ${op:02X}"),
            0x1..=0x7 => format!("OUT {n}"),
            _ => format!("INP {}", n & 0x7),
        },
        0x7 => match n {
            0xC | 0xD | 0xF => format!("{} #${imm:02X}", GROUP_7[n as usize]),
            _ => GROUP_7[n as usize].to_string(),
        },
        0x8 => format!("GLO R{n:X}"),
        0x9 => format!("GHI R{n:X}"),
        0xA => format!("PLO R{n:X}"),
        0xB => format!("PHI R{n:X}"),
        0xC if n == 0x8 || n & 0x04 != 0 => LONG_GROUP[n as usize].to_string(),
        0xC => format!("{} ${imm16:04X}", LONG_GROUP[n as usize]),
        0xD => format!("SEP R{n:X}"),
        0xE => format!("SEX R{n:X}"),
        _ => match n {
            0x8..=0xD | 0xF => format!("{} #${imm:02X}", GROUP_F[n as usize]),
            _ => GROUP_F[n as usize].to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FlatBus;

    fn decode(bytes: &[u8]) -> (String, u8) {
        let mut bus = FlatBus::new();
        bus.load(0x0100, bytes);
        (
            instruction_text(&bus, 0x0100),
            instruction_length(&bus, 0x0100),
        )
    }

    #[test]
    fn decodes_common_forms() {
        assert_eq!(decode(&[0xF8, 0x3F]), ("LDI #$3F".to_string(), 2));
        assert_eq!(decode(&[0x30, 0x24]), ("BR $0124".to_string(), 2));
        assert_eq!(decode(&[0xC0, 0x12, 0x34]), ("LBR $1234".to_string(), 3));
        assert_eq!(decode(&[0xC8]), ("LSKP".to_string(), 3));
        assert_eq!(decode(&[0xC4]), ("NOP".to_string(), 1));
        assert_eq!(decode(&[0xD4]), ("SEP R4".to_string(), 1));
        assert_eq!(decode(&[0x61]), ("OUT 1".to_string(), 1));
        assert_eq!(decode(&[0x69]), ("INP 1".to_string(), 1));
        assert_eq!(decode(&[0x68]), ("DB $68".to_string(), 1));
        assert_eq!(decode(&[0x00]), ("IDL".to_string(), 1));
        assert_eq!(decode(&[0xFE]), ("SHL".to_string(), 1));
    }
}
