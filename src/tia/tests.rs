use super::*;
use crate::random::Random;

const LINE: u32 = H_CLOCKS;

fn setup() -> (System, Tia) {
    let mut system = System::new(Random::new(Some(7)));
    let settings = Settings::default();
    let mut tia = Tia::new(&settings);
    tia.install(&mut system);
    tia.reset(&mut system);
    (system, tia)
}

/// VSYNC for three lines, then `lines - 3` more lines.
fn run_frame(system: &mut System, tia: &mut Tia, lines: u32) {
    tia.poke(system, VSYNC as u16, 0x02);
    tia.cycle(system, 3 * LINE);
    tia.poke(system, VSYNC as u16, 0x00);
    tia.cycle(system, (lines - 3) * LINE);
}

#[test]
fn install_claims_tia_pages() {
    let (system, _tia) = setup();
    assert_eq!(system.page_access(0x0000).device, Device::Tia);
    assert_eq!(system.page_access(0x0040).device, Device::Tia);
    assert_eq!(system.page_access(0x0100).device, Device::Tia);
    assert_ne!(system.page_access(0x0080).device, Device::Tia);
}

#[test]
fn playfield_write_lands_after_delay() {
    let (mut system, mut tia) = setup();
    tia.poke(&mut system, PF0 as u16, 0xF0);

    assert_eq!(tia.registers()[PF0 as usize], 0xF0);
    tia.cycle(&mut system, delay::PF as u32);
    assert_eq!(tia.playfield.registers().0, 0x00);
    tia.cycle(&mut system, 1);
    assert_eq!(tia.playfield.registers().0, 0xF0);
}

#[test]
fn newer_write_replaces_pending_one() {
    let (mut system, mut tia) = setup();
    tia.poke(&mut system, PF1 as u16, 0x11);
    tia.poke(&mut system, PF1 as u16, 0x22);
    tia.cycle(&mut system, 8);
    assert_eq!(tia.playfield.registers().1, 0x22);
}

#[test]
fn wsync_without_handler_is_fatal() {
    let (mut system, mut tia) = setup();
    tia.poke(&mut system, WSYNC as u16, 0);
    assert!(matches!(system.take_fault(), Some(EmulationFault::Fatal(_))));
}

#[test]
fn wsync_halt_runs_to_end_of_line() {
    let (mut system, mut tia) = setup();
    system.install_halt_line();

    tia.cycle(&mut system, 30);
    tia.poke(&mut system, WSYNC as u16, 0);
    assert!(system.halt_requested());

    tia.on_halt(&mut system);
    assert_eq!(system.cycles(), 66);
    tia.update_emulation(&mut system);
    assert_eq!(tia.hpos(), 0);
    assert!(!system.halt_requested());
}

#[test]
fn rsync_late_in_the_line_wraps_cleanly() {
    for start in [0, 100, H_CLOCKS - 3, H_CLOCKS - 2, H_CLOCKS - 1] {
        let (mut system, mut tia) = setup();
        tia.cycle(&mut system, start);
        tia.poke(&mut system, RSYNC as u16, 0);
        assert_eq!(tia.hpos(), H_CLOCKS - 3, "RSYNC at {start}");
        tia.cycle(&mut system, 3);
        assert_eq!(tia.hpos(), 0, "RSYNC at {start}");
    }
}

#[test]
fn ball_over_playfield_sets_cxblpf() {
    let (mut system, mut tia) = setup();
    for reg in [PF0, PF1, PF2] {
        tia.poke(&mut system, reg as u16, 0xFF);
    }
    tia.poke(&mut system, ENABL as u16, 0x02);
    tia.cycle(&mut system, 2 * LINE);

    assert_eq!(tia.peek(&mut system, CXBLPF as u16) & 0x80, 0x80);
    assert_eq!(tia.peek(&mut system, CXPPMM as u16) & 0xC0, 0x00);

    tia.poke(&mut system, CXCLR as u16, 0);
    assert_eq!(tia.collision_mask(), 0);
    assert_eq!(tia.peek(&mut system, CXBLPF as u16) & 0xC0, 0x00);
}

#[test]
fn low_bits_come_from_data_bus() {
    let (mut system, mut tia) = setup();
    system.set_data_bus_state(0x2A);
    assert_eq!(tia.peek(&mut system, CXM0P as u16), 0x2A);
}

#[test]
fn fire_button_reads_low_when_pressed() {
    let (mut system, mut tia) = setup();
    system.set_data_bus_state(0);
    assert_eq!(tia.peek(&mut system, INPT4 as u16) & 0x80, 0x80);
    tia.set_fire(0, true);
    assert_eq!(tia.peek(&mut system, INPT4 as u16) & 0x80, 0x00);
    assert_eq!(tia.peek(&mut system, INPT5 as u16) & 0x80, 0x80);
}

#[test]
fn vsync_completes_frame_and_requests_stop() {
    let (mut system, mut tia) = setup();
    run_frame(&mut system, &mut tia, 262);
    assert!(system.take_stop_request());
    assert_eq!(tia.frame_detector().frame_count(), 1);
}

#[test]
fn background_color_reaches_front_buffer() {
    let (mut system, mut tia) = setup();
    tia.poke(&mut system, COLUBK as u16, 0x45);

    run_frame(&mut system, &mut tia, 262);
    run_frame(&mut system, &mut tia, 262);

    let row = 100 * H_PIXEL as usize;
    assert_eq!(tia.front_buffer()[row + 80], 0x44);
    assert_eq!(tia.front_buffer().len(), (H_PIXEL * tia.height()) as usize);
}

#[test]
fn vblank_renders_black() {
    let (mut system, mut tia) = setup();
    tia.poke(&mut system, COLUBK as u16, 0x44);
    tia.poke(&mut system, VBLANK as u16, 0x02);

    run_frame(&mut system, &mut tia, 262);
    run_frame(&mut system, &mut tia, 262);
    assert!(tia.front_buffer().iter().all(|&c| c == 0));
}

#[test]
fn state_restores_registers_and_position() {
    let (mut system, mut tia) = setup();
    tia.poke(&mut system, COLUBK as u16, 0x44);
    tia.poke(&mut system, AUDV0 as u16, 0x0F);
    tia.cycle(&mut system, 100);

    let mut out = Serializer::new();
    assert!(tia.save(&mut out));

    tia.poke(&mut system, COLUBK as u16, 0x00);
    tia.cycle(&mut system, 50);

    out.rewind();
    assert!(tia.load(&mut out));
    assert_eq!(tia.hpos(), 100);
    assert_eq!(tia.registers()[COLUBK as usize], 0x44);
    assert_eq!(tia.audio().channel0.registers().2, 0x0F);
}

#[test]
fn load_rejects_foreign_tag() {
    let (_system, mut tia) = setup();
    let mut out = Serializer::new();
    out.put_string("M6532");
    out.rewind();
    assert!(!tia.load(&mut out));
}
