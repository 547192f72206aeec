use duo_emu_core::audio::{AudioGenerator, SampleWidth, to_stereo_i16};
use duo_emu_core::gameboy::apu::Apu;

fn tick_machine(apu: &mut Apu, div: &mut u16, cycles: u16) {
    apu.step(cycles, *div);
    *div = div.wrapping_add(cycles);
}

fn powered() -> Apu {
    let mut apu = Apu::new(44_100);
    apu.write_reg(0xFF26, 0x80);
    apu
}

#[test]
fn frame_sequencer_tick() {
    let mut apu = powered();
    let mut div = 0u16;
    assert_eq!(apu.sequencer_step(), 0);
    for _ in 0..(16 * 8192 / 4) {
        tick_machine(&mut apu, &mut div, 4);
    }
    assert_eq!(apu.sequencer_step(), 0);
    for _ in 0..(8192 * 7 / 4) {
        tick_machine(&mut apu, &mut div, 4);
    }
    assert_eq!(apu.sequencer_step(), 7);
}

#[test]
fn sequencer_stops_while_unpowered() {
    let mut apu = Apu::new(44_100);
    let mut div = 0u16;
    for _ in 0..(4 * 8192 / 4) {
        tick_machine(&mut apu, &mut div, 4);
    }
    assert_eq!(apu.sequencer_step(), 0);
}

#[test]
fn sample_generation() {
    let mut apu = powered();
    apu.write_reg(0xFF24, 0x77); // max volume
    apu.write_reg(0xFF25, 0x22); // ch2 left+right
    apu.write_reg(0xFF16, 0x80); // 50% duty
    apu.write_reg(0xFF17, 0xF0); // envelope
    apu.write_reg(0xFF18, 0x00); // freq low
    apu.write_reg(0xFF19, 0x87); // trigger, freq high
    let mut div = 0u16;
    for _ in 0..(70_224 / 4) {
        tick_machine(&mut apu, &mut div, 4);
    }
    let buffer = apu.pull_samples().expect("channel 2 is audible");
    assert_eq!(buffer.format.width, SampleWidth::Bits16);
    assert_eq!(buffer.format.channels, 2);
    // 70224 T-cycles at 44.1 kHz
    assert_eq!(buffer.frames(), 738);
    let stereo = to_stereo_i16(&buffer);
    assert!(stereo.iter().any(|&s| s != 0));
    assert!(stereo.chunks_exact(2).all(|p| p[0] == p[1]));
}

#[test]
fn silent_apu_yields_no_samples() {
    let mut apu = Apu::new(44_100);
    let mut div = 0u16;
    for _ in 0..(70_224 / 4) {
        tick_machine(&mut apu, &mut div, 4);
    }
    assert!(apu.pull_samples().is_none());
}

#[test]
fn read_mask_unused_bits() {
    let mut apu = Apu::new(44_100);
    assert_eq!(apu.read_reg(0xFF11), 0x3F);
    apu.apply_boot_state();
    assert_eq!(apu.read_reg(0xFF11), 0xBF);
    assert_eq!(apu.read_reg(0xFF26), 0xF0);
}

#[test]
fn register_write_read_fidelity() {
    let mut apu = powered();
    apu.write_reg(0xFF10, 0x07);
    apu.write_reg(0xFF11, 0xA2);
    assert_eq!(apu.read_reg(0xFF10), 0x87);
    assert_eq!(apu.read_reg(0xFF11), 0xBF);
}

#[test]
fn writes_ignored_while_unpowered() {
    let mut apu = Apu::new(44_100);
    apu.write_reg(0xFF24, 0x77);
    assert_eq!(apu.read_reg(0xFF24), 0x00);
}

#[test]
fn wave_ram_access() {
    let mut apu = powered();
    // write while channel 3 inactive
    apu.write_reg(0xFF30, 0x12);
    assert_eq!(apu.read_reg(0xFF30), 0x12);

    // start channel 3
    apu.write_reg(0xFF1A, 0x80); // DAC on
    apu.write_reg(0xFF1E, 0x80); // trigger
    apu.write_reg(0xFF30, 0x34); // should be ignored
    assert_eq!(apu.read_reg(0xFF30), 0xFF);

    // disable DAC while length counter still running
    apu.write_reg(0xFF1A, 0x00);
    apu.write_reg(0xFF30, 0x56);
    assert_eq!(apu.read_reg(0xFF30), 0x56);

    // power cycle should not clear wave RAM
    apu.write_reg(0xFF26, 0x00);
    apu.write_reg(0xFF26, 0x80);
    assert_eq!(apu.read_reg(0xFF30), 0x56);
}

#[test]
fn dac_off_disables_channel() {
    let mut apu = powered();
    apu.write_reg(0xFF12, 0xF0); // envelope with volume
    apu.write_reg(0xFF14, 0x80); // trigger channel 1
    assert_eq!(apu.read_reg(0xFF26) & 0x01, 0x01);
    apu.write_reg(0xFF12, 0x00); // turn DAC off
    assert_eq!(apu.read_reg(0xFF26) & 0x01, 0x00);
}

#[test]
fn length_counter_silences_channel() {
    let mut apu = powered();
    apu.write_reg(0xFF17, 0xF0);
    apu.write_reg(0xFF16, 0x3F); // length 1
    apu.write_reg(0xFF19, 0xC0); // trigger with length enabled
    assert_eq!(apu.channel_status() & 0x02, 0x02);
    let mut div = 0u16;
    for _ in 0..(8192 * 2 / 4) {
        tick_machine(&mut apu, &mut div, 4);
    }
    assert_eq!(apu.channel_status() & 0x02, 0x00);
}

#[test]
fn div_reset_clocks_sequencer() {
    let mut apu = powered();
    apu.div_reset(0x1000);
    assert_eq!(apu.sequencer_step(), 1);
    apu.div_reset(0x0FFF);
    assert_eq!(apu.sequencer_step(), 1);
}
