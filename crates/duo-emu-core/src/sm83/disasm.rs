//! SM83 instruction decoding for listings.
//!
//! Opcodes are split the usual way into `x = op >> 6`, `y = (op >> 3) & 7`,
//! `z = op & 7`, `p = y >> 1`, `q = y & 1`.

use super::INVALID_OPCODES;
use crate::bus::BusView;

const R: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const RP: [&str; 4] = ["BC", "DE", "HL", "SP"];
const RP2: [&str; 4] = ["BC", "DE", "HL", "AF"];
const CC: [&str; 4] = ["NZ", "Z", "NC", "C"];
const ALU: [&str; 8] = ["ADD A,", "ADC A,", "SUB ", "SBC A,", "AND ", "XOR ", "OR ", "CP "];
const ROT: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SWAP", "SRL"];

/// Instruction length in bytes, `CB xx` counted as one 2-byte instruction.
pub fn opcode_length(op: u8) -> u8 {
    if INVALID_OPCODES.contains(&op) {
        return 1;
    }
    let y = (op >> 3) & 0x07;
    let z = op & 0x07;
    match op >> 6 {
        0 => match z {
            0 if y == 1 => 3,
            0 if y >= 2 => 2,
            1 if y & 1 == 0 => 3,
            6 => 2,
            _ => 1,
        },
        3 => match z {
            0 if y >= 4 => 2,
            2 if y < 4 || y == 5 || y == 7 => 3,
            3 if y == 0 => 3,
            3 if y == 1 => 2,
            4 => 3,
            5 if y == 1 => 3,
            6 => 2,
            _ => 1,
        },
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
    let imm8 = bus.read_byte(addr.wrapping_add(1));
    let imm16 = ((bus.read_byte(addr.wrapping_add(2)) as u16) << 8) | imm8 as u16;

    if op == 0xCB {
        return cb_text(imm8);
    }
    if INVALID_OPCODES.contains(&op) {
        return format!("DB ${op:02X}");
    }

    let y = ((op >> 3) & 0x07) as usize;
    let z = op & 0x07;
    let p = y >> 1;
    let q = y & 1;
    let rel = addr.wrapping_add(2).wrapping_add(imm8 as i8 as u16);

    match op >> 6 {
        0 => match z {
            0 => match y {
                0 => "NOP".to_string(),
                1 => format!("LD (${imm16:04X}),SP"),
                2 => "STOP".to_string(),
                3 => format!("JR ${rel:04X}"),
                _ => format!("JR {},${rel:04X}", CC[y - 4]),
            },
            1 if q == 0 => format!("LD {},${imm16:04X}", RP[p]),
            1 => format!("ADD HL,{}", RP[p]),
            2 => {
                let mem = ["(BC)", "(DE)", "(HL+)", "(HL-)"][p];
                if q == 0 {
                    format!("LD {mem},A")
                } else {
                    format!("LD A,{mem}")
                }
            }
            3 if q == 0 => format!("INC {}", RP[p]),
            3 => format!("DEC {}", RP[p]),
            4 => format!("INC {}", R[y]),
            5 => format!("DEC {}", R[y]),
            6 => format!("LD {},${imm8:02X}", R[y]),
            _ => ["RLCA", "RRCA", "RLA", "RRA", "DAA", "CPL", "SCF", "CCF"][y].to_string(),
        },
        1 if op == 0x76 => "HALT".to_string(),
        1 => format!("LD {},{}", R[y], R[z as usize]),
        2 => format!("{}{}", ALU[y], R[z as usize]),
        _ => match z {
            0 => match y {
                0..=3 => format!("RET {}", CC[y]),
                4 => format!("LDH ($FF{imm8:02X}),A"),
                5 => format!("ADD SP,{}", imm8 as i8),
                6 => format!("LDH A,($FF{imm8:02X})"),
                _ => format!("LD HL,SP{:+}", imm8 as i8),
            },
            1 if q == 0 => format!("POP {}", RP2[p]),
            1 => ["RET", "RETI", "JP HL", "LD SP,HL"][p].to_string(),
            2 => match y {
                0..=3 => format!("JP {},${imm16:04X}", CC[y]),
                4 => "LD ($FF00+C),A".to_string(),
                5 => format!("LD (${imm16:04X}),A"),
                6 => "LD A,($FF00+C)".to_string(),
                _ => format!("LD A,(${imm16:04X})"),
            },
            3 => match y {
                0 => format!("JP ${imm16:04X}"),
                6 => "DI".to_string(),
                _ => "EI".to_string(),
            },
            4 => format!("CALL {},${imm16:04X}", CC[y]),
            5 if q == 0 => format!("PUSH {}", RP2[p]),
            5 => format!("CALL ${imm16:04X}"),
            6 => format!("{}${imm8:02X}", ALU[y]),
            _ => format!("RST ${:02X}", y * 8),
        },
    }
}

fn cb_text(op: u8) -> String {
    let y = ((op >> 3) & 0x07) as usize;
    let r = R[(op & 0x07) as usize];
    match op >> 6 {
        0 => format!("{} {r}", ROT[y]),
        1 => format!("BIT {y},{r}"),
        2 => format!("RES {y},{r}"),
        _ => format!("SET {y},{r}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FlatBus;

    fn decode(bytes: &[u8]) -> (String, u8) {
        let mut bus = FlatBus::new();
        bus.load(0x0150, bytes);
        (
            instruction_text(&bus, 0x0150),
            instruction_length(&bus, 0x0150),
        )
    }

    #[test]
    fn decodes_common_forms() {
        assert_eq!(decode(&[0x00]), ("NOP".to_string(), 1));
        assert_eq!(decode(&[0x31, 0xFE, 0xFF]), ("LD SP,$FFFE".to_string(), 3));
        assert_eq!(decode(&[0x18, 0xFE]), ("JR $0150".to_string(), 2));
        assert_eq!(decode(&[0x20, 0x05]), ("JR NZ,$0157".to_string(), 2));
        assert_eq!(decode(&[0x22]), ("LD (HL+),A".to_string(), 1));
        assert_eq!(decode(&[0xE0, 0x40]), ("LDH ($FF40),A".to_string(), 2));
        assert_eq!(decode(&[0xF8, 0xFF]), ("LD HL,SP-1".to_string(), 2));
        assert_eq!(decode(&[0xCD, 0x00, 0x40]), ("CALL $4000".to_string(), 3));
        assert_eq!(decode(&[0xFE, 0x90]), ("CP $90".to_string(), 2));
        assert_eq!(decode(&[0x88]), ("ADC A,B".to_string(), 1));
        assert_eq!(decode(&[0xCB, 0x7C]), ("BIT 7,H".to_string(), 2));
        assert_eq!(decode(&[0xCB, 0x36]), ("SWAP (HL)".to_string(), 2));
        assert_eq!(decode(&[0xFF]), ("RST $38".to_string(), 1));
        assert_eq!(decode(&[0xD3]), ("DB $D3".to_string(), 1));
        assert_eq!(decode(&[0x10, 0x00]), ("STOP".to_string(), 2));
    }

    #[test]
    fn lengths_cover_every_opcode() {
        let three_byte = [
            0x01, 0x08, 0x11, 0x21, 0x31, 0xC2, 0xC3, 0xC4, 0xCA, 0xCC, 0xCD, 0xD2, 0xD4, 0xDA,
            0xDC, 0xEA, 0xFA,
        ];
        for op in 0..=0xFFu8 {
            let len = opcode_length(op);
            if three_byte.contains(&op) {
                assert_eq!(len, 3, "{op:02X}");
            } else {
                assert!(len == 1 || len == 2, "{op:02X}");
            }
        }
    }
}
