use duo_emu_core::bus::BusView;
use duo_emu_core::emulator::{Emulator, EmulatorConfig, FrameOutcome};
use duo_emu_core::gameboy::Button;
use duo_emu_core::registry::{SystemId, SystemRegistry};
use duo_emu_core::rom::Rom;

fn cartridge(code: &[(u16, &[u8])]) -> Rom {
    let mut image = vec![0u8; 0x8000];
    image[0x0134..0x0138].copy_from_slice(b"TEST");
    for &(addr, bytes) in code {
        let start = addr as usize;
        image[start..start + bytes.len()].copy_from_slice(bytes);
    }
    Rom::from_bytes(image).unwrap()
}

fn emulator(rom: Rom) -> Emulator {
    SystemRegistry::with_builtin()
        .create(SystemId::GameBoy, rom, &EmulatorConfig::default())
        .unwrap()
}

fn completed(emu: &mut Emulator) -> duo_emu_core::emulator::Frame {
    match emu.execute_frame().unwrap() {
        FrameOutcome::Completed(frame) => frame,
        other => panic!("unexpected {other:?}"),
    }
}

/// Enables the timer interrupt, starts TIMA near overflow and halts.
const TIMER_PROGRAM: &[u8] = &[
    0x3E, 0x04, // LD A,$04
    0xE0, 0xFF, // LDH ($FF),A
    0x3E, 0xF0, // LD A,$F0
    0xE0, 0x05, // LDH ($05),A
    0x3E, 0x05, // LD A,$05
    0xE0, 0x07, // LDH ($07),A
    0xFB, // EI
    0x76, // HALT
    0x18, 0xFE, // JR $010E
];

/// Timer handler: writes a marker to $C000 and stops the timer.
const TIMER_HANDLER: &[u8] = &[
    0x3E, 0x77, // LD A,$77
    0xEA, 0x00, 0xC0, // LD ($C000),A
    0xAF, // XOR A
    0xE0, 0x07, // LDH ($07),A
    0xD9, // RETI
];

#[test]
fn serial_output_is_captured() {
    let rom = cartridge(&[(
        0x0100,
        &[
            0x3E, b'O', 0xE0, 0x01, 0x3E, 0x81, 0xE0, 0x02, // "O"
            0x3E, b'K', 0xE0, 0x01, 0x3E, 0x81, 0xE0, 0x02, // "K"
            0x18, 0xFE,
        ],
    )]);
    let mut emu = emulator(rom);
    completed(&mut emu);
    assert_eq!(emu.take_serial(), b"OK");
    assert!(emu.take_serial().is_empty());
}

#[test]
fn timer_interrupt_wakes_halt() {
    let rom = cartridge(&[(0x0100, TIMER_PROGRAM), (0x0050, TIMER_HANDLER)]);
    let mut emu = emulator(rom);
    assert_eq!(emu.view().read_byte(0xC000), 0x00);
    completed(&mut emu);
    assert_eq!(emu.view().read_byte(0xC000), 0x77);
    assert_eq!(emu.instruction_pointer(), 0x010E);
}

#[test]
fn breakpoint_on_interrupt_vector() {
    let rom = cartridge(&[(0x0100, TIMER_PROGRAM), (0x0050, TIMER_HANDLER)]);
    let mut emu = emulator(rom);
    emu.disassembler_mut().add_breakpoint(0x0050);

    match emu.execute_frame().unwrap() {
        FrameOutcome::Breakpoint { address } => assert_eq!(address, 0x0050),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(emu.view().read_byte(0xC000), 0x00);

    let listing = emu.listing_around_pc(0, 2);
    assert_eq!(listing[0].address, 0x0050);
    assert_eq!(listing[0].text, "LD A,$77");
    assert_eq!(listing[1].text, "LD ($C000),A");

    emu.set_stepping(true);
    emu.step_instruction().unwrap();
    assert_eq!(emu.instruction_pointer(), 0x0052);
}

#[test]
fn breakpoint_on_cartridge_entry() {
    // $0100: NOP  $0101: JR $0101
    let mut emu = emulator(cartridge(&[(0x0100, &[0x00, 0x18, 0xFE])]));
    emu.disassembler_mut().add_breakpoint(0x0100);

    let FrameOutcome::Breakpoint { address } = emu.execute_frame().unwrap() else {
        panic!("expected breakpoint at entry");
    };
    assert_eq!(address, 0x0100);

    completed(&mut emu);
    assert_eq!(emu.instruction_pointer(), 0x0101);
}

#[test]
fn joypad_press_requests_interrupt() {
    // Select the action buttons, then spin.
    let rom = cartridge(&[(0x0100, &[0x3E, 0x10, 0xE0, 0x00, 0x18, 0xFE])]);
    let mut emu = emulator(rom);
    completed(&mut emu);
    assert_eq!(emu.view().read_byte(0xFF0F) & 0x10, 0x00);
    assert!(emu.set_button(Button::Start, true));
    assert_eq!(emu.view().read_byte(0xFF0F) & 0x10, 0x10);
    assert!(!emu.set_key(1, true));
}

#[test]
fn blank_vram_renders_one_shade() {
    let rom = cartridge(&[(0x0100, &[0x18, 0xFE])]);
    let mut emu = emulator(rom);
    let frame = completed(&mut emu);
    assert_eq!((frame.video.width, frame.video.height), (160, 144));
    let first = frame.video.pixels[0];
    assert!(frame.video.pixels.iter().all(|&p| p == first));
    assert_eq!(emu.get_current_instructions_per_frame(), 17_556 / 3);
}

#[test]
fn reset_restores_post_boot_state() {
    let rom = cartridge(&[(0x0100, TIMER_PROGRAM), (0x0050, TIMER_HANDLER)]);
    let mut emu = emulator(rom);
    completed(&mut emu);
    emu.reset();
    assert_eq!(emu.instruction_pointer(), 0x0100);
    assert_eq!(emu.view().read_byte(0xC000), 0x00);
    assert!(emu.cpu_state().starts_with("AF:01B0 BC:0013 DE:00D8 HL:014D PC:0100 SP:FFFE"));
}
