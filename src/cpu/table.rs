/*!
table.rs - 256-entry opcode table (mnemonic, addressing mode, handler).

Design
------
- `OPCODES[opcode]` describes every opcode, documented and undocumented.
- `OpHandler = fn(&mut Cpu, &mut Bus, AddrMode)`; the dispatcher fetches the
  opcode, advances PC past it, then calls the handler with the entry's mode.
- Handlers perform every bus access themselves, so an entry carries no
  cycle count: timing follows from the access sequence.
- The twelve JAM opcodes (02 12 22 32 42 52 62 72 92 B2 D2 F2) have no
  handler. The dispatcher reports them as an invalid instruction.
*/

use crate::bus::Bus;
use crate::cpu::addressing::AddrMode;
use crate::cpu::core::Cpu;
use crate::cpu::dispatch::{
    arithmetic as ar, branches as br, compare as cp, control_flow as cf, illegal as il,
    load_store as ls, logical as lg, misc as mi, rmw,
};

pub(crate) type OpHandler = fn(&mut Cpu, &mut Bus, AddrMode);

#[derive(Clone, Copy)]
pub struct OpEntry {
    pub mnemonic: &'static str,
    pub mode: AddrMode,
    pub(crate) handler: Option<OpHandler>,
}

impl OpEntry {
    pub fn is_jam(&self) -> bool {
        self.handler.is_none()
    }
}

impl std::fmt::Debug for OpEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpEntry")
            .field("mnemonic", &self.mnemonic)
            .field("mode", &self.mode)
            .field("jam", &self.is_jam())
            .finish()
    }
}

const IMP: AddrMode = AddrMode::Implied;
const ACC: AddrMode = AddrMode::Accumulator;
const IMM: AddrMode = AddrMode::Immediate;
const ZP: AddrMode = AddrMode::ZeroPage;
const ZPX: AddrMode = AddrMode::ZeroPageX;
const ZPY: AddrMode = AddrMode::ZeroPageY;
const ABS: AddrMode = AddrMode::Absolute;
const ABX: AddrMode = AddrMode::AbsoluteX;
const ABY: AddrMode = AddrMode::AbsoluteY;
const IZX: AddrMode = AddrMode::IndirectX;
const IZY: AddrMode = AddrMode::IndirectY;
const REL: AddrMode = AddrMode::Relative;
const IND: AddrMode = AddrMode::Indirect;

const fn op(mnemonic: &'static str, mode: AddrMode, handler: OpHandler) -> OpEntry {
    OpEntry {
        mnemonic,
        mode,
        handler: Some(handler),
    }
}

const fn jam() -> OpEntry {
    OpEntry {
        mnemonic: "JAM",
        mode: IMP,
        handler: None,
    }
}

#[rustfmt::skip]
pub static OPCODES: [OpEntry; 256] = [
    // 0x00
    op("BRK", IMP, cf::brk), op("ORA", IZX, lg::ora), jam(), op("SLO", IZX, il::slo),
    op("NOP", ZP, mi::nop), op("ORA", ZP, lg::ora), op("ASL", ZP, rmw::asl), op("SLO", ZP, il::slo),
    op("PHP", IMP, mi::php), op("ORA", IMM, lg::ora), op("ASL", ACC, rmw::asl), op("ANC", IMM, il::anc),
    op("NOP", ABS, mi::nop), op("ORA", ABS, lg::ora), op("ASL", ABS, rmw::asl), op("SLO", ABS, il::slo),
    // 0x10
    op("BPL", REL, br::bpl), op("ORA", IZY, lg::ora), jam(), op("SLO", IZY, il::slo),
    op("NOP", ZPX, mi::nop), op("ORA", ZPX, lg::ora), op("ASL", ZPX, rmw::asl), op("SLO", ZPX, il::slo),
    op("CLC", IMP, mi::clc), op("ORA", ABY, lg::ora), op("NOP", IMP, mi::nop), op("SLO", ABY, il::slo),
    op("NOP", ABX, mi::nop), op("ORA", ABX, lg::ora), op("ASL", ABX, rmw::asl), op("SLO", ABX, il::slo),
    // 0x20
    op("JSR", ABS, cf::jsr), op("AND", IZX, lg::and), jam(), op("RLA", IZX, il::rla),
    op("BIT", ZP, lg::bit), op("AND", ZP, lg::and), op("ROL", ZP, rmw::rol), op("RLA", ZP, il::rla),
    op("PLP", IMP, mi::plp), op("AND", IMM, lg::and), op("ROL", ACC, rmw::rol), op("ANC", IMM, il::anc),
    op("BIT", ABS, lg::bit), op("AND", ABS, lg::and), op("ROL", ABS, rmw::rol), op("RLA", ABS, il::rla),
    // 0x30
    op("BMI", REL, br::bmi), op("AND", IZY, lg::and), jam(), op("RLA", IZY, il::rla),
    op("NOP", ZPX, mi::nop), op("AND", ZPX, lg::and), op("ROL", ZPX, rmw::rol), op("RLA", ZPX, il::rla),
    op("SEC", IMP, mi::sec), op("AND", ABY, lg::and), op("NOP", IMP, mi::nop), op("RLA", ABY, il::rla),
    op("NOP", ABX, mi::nop), op("AND", ABX, lg::and), op("ROL", ABX, rmw::rol), op("RLA", ABX, il::rla),
    // 0x40
    op("RTI", IMP, cf::rti), op("EOR", IZX, lg::eor), jam(), op("SRE", IZX, il::sre),
    op("NOP", ZP, mi::nop), op("EOR", ZP, lg::eor), op("LSR", ZP, rmw::lsr), op("SRE", ZP, il::sre),
    op("PHA", IMP, mi::pha), op("EOR", IMM, lg::eor), op("LSR", ACC, rmw::lsr), op("ASR", IMM, il::asr),
    op("JMP", ABS, cf::jmp), op("EOR", ABS, lg::eor), op("LSR", ABS, rmw::lsr), op("SRE", ABS, il::sre),
    // 0x50
    op("BVC", REL, br::bvc), op("EOR", IZY, lg::eor), jam(), op("SRE", IZY, il::sre),
    op("NOP", ZPX, mi::nop), op("EOR", ZPX, lg::eor), op("LSR", ZPX, rmw::lsr), op("SRE", ZPX, il::sre),
    op("CLI", IMP, mi::cli), op("EOR", ABY, lg::eor), op("NOP", IMP, mi::nop), op("SRE", ABY, il::sre),
    op("NOP", ABX, mi::nop), op("EOR", ABX, lg::eor), op("LSR", ABX, rmw::lsr), op("SRE", ABX, il::sre),
    // 0x60
    op("RTS", IMP, cf::rts), op("ADC", IZX, ar::adc), jam(), op("RRA", IZX, il::rra),
    op("NOP", ZP, mi::nop), op("ADC", ZP, ar::adc), op("ROR", ZP, rmw::ror), op("RRA", ZP, il::rra),
    op("PLA", IMP, mi::pla), op("ADC", IMM, ar::adc), op("ROR", ACC, rmw::ror), op("ARR", IMM, il::arr),
    op("JMP", IND, cf::jmp), op("ADC", ABS, ar::adc), op("ROR", ABS, rmw::ror), op("RRA", ABS, il::rra),
    // 0x70
    op("BVS", REL, br::bvs), op("ADC", IZY, ar::adc), jam(), op("RRA", IZY, il::rra),
    op("NOP", ZPX, mi::nop), op("ADC", ZPX, ar::adc), op("ROR", ZPX, rmw::ror), op("RRA", ZPX, il::rra),
    op("SEI", IMP, mi::sei), op("ADC", ABY, ar::adc), op("NOP", IMP, mi::nop), op("RRA", ABY, il::rra),
    op("NOP", ABX, mi::nop), op("ADC", ABX, ar::adc), op("ROR", ABX, rmw::ror), op("RRA", ABX, il::rra),
    // 0x80
    op("NOP", IMM, mi::nop), op("STA", IZX, ls::sta), op("NOP", IMM, mi::nop), op("SAX", IZX, il::sax),
    op("STY", ZP, ls::sty), op("STA", ZP, ls::sta), op("STX", ZP, ls::stx), op("SAX", ZP, il::sax),
    op("DEY", IMP, ar::dey), op("NOP", IMM, mi::nop), op("TXA", IMP, mi::txa), op("ANE", IMM, il::ane),
    op("STY", ABS, ls::sty), op("STA", ABS, ls::sta), op("STX", ABS, ls::stx), op("SAX", ABS, il::sax),
    // 0x90
    op("BCC", REL, br::bcc), op("STA", IZY, ls::sta), jam(), op("SHA", IZY, il::sha),
    op("STY", ZPX, ls::sty), op("STA", ZPX, ls::sta), op("STX", ZPY, ls::stx), op("SAX", ZPY, il::sax),
    op("TYA", IMP, mi::tya), op("STA", ABY, ls::sta), op("TXS", IMP, mi::txs), op("SHS", ABY, il::shs),
    op("SHY", ABX, il::shy), op("STA", ABX, ls::sta), op("SHX", ABY, il::shx), op("SHA", ABY, il::sha),
    // 0xA0
    op("LDY", IMM, ls::ldy), op("LDA", IZX, ls::lda), op("LDX", IMM, ls::ldx), op("LAX", IZX, il::lax),
    op("LDY", ZP, ls::ldy), op("LDA", ZP, ls::lda), op("LDX", ZP, ls::ldx), op("LAX", ZP, il::lax),
    op("TAY", IMP, mi::tay), op("LDA", IMM, ls::lda), op("TAX", IMP, mi::tax), op("LXA", IMM, il::lxa),
    op("LDY", ABS, ls::ldy), op("LDA", ABS, ls::lda), op("LDX", ABS, ls::ldx), op("LAX", ABS, il::lax),
    // 0xB0
    op("BCS", REL, br::bcs), op("LDA", IZY, ls::lda), jam(), op("LAX", IZY, il::lax),
    op("LDY", ZPX, ls::ldy), op("LDA", ZPX, ls::lda), op("LDX", ZPY, ls::ldx), op("LAX", ZPY, il::lax),
    op("CLV", IMP, mi::clv), op("LDA", ABY, ls::lda), op("TSX", IMP, mi::tsx), op("LAS", ABY, il::las),
    op("LDY", ABX, ls::ldy), op("LDA", ABX, ls::lda), op("LDX", ABY, ls::ldx), op("LAX", ABY, il::lax),
    // 0xC0
    op("CPY", IMM, cp::cpy), op("CMP", IZX, cp::cmp), op("NOP", IMM, mi::nop), op("DCP", IZX, il::dcp),
    op("CPY", ZP, cp::cpy), op("CMP", ZP, cp::cmp), op("DEC", ZP, rmw::dec), op("DCP", ZP, il::dcp),
    op("INY", IMP, ar::iny), op("CMP", IMM, cp::cmp), op("DEX", IMP, ar::dex), op("SBX", IMM, il::sbx),
    op("CPY", ABS, cp::cpy), op("CMP", ABS, cp::cmp), op("DEC", ABS, rmw::dec), op("DCP", ABS, il::dcp),
    // 0xD0
    op("BNE", REL, br::bne), op("CMP", IZY, cp::cmp), jam(), op("DCP", IZY, il::dcp),
    op("NOP", ZPX, mi::nop), op("CMP", ZPX, cp::cmp), op("DEC", ZPX, rmw::dec), op("DCP", ZPX, il::dcp),
    op("CLD", IMP, mi::cld), op("CMP", ABY, cp::cmp), op("NOP", IMP, mi::nop), op("DCP", ABY, il::dcp),
    op("NOP", ABX, mi::nop), op("CMP", ABX, cp::cmp), op("DEC", ABX, rmw::dec), op("DCP", ABX, il::dcp),
    // 0xE0
    op("CPX", IMM, cp::cpx), op("SBC", IZX, ar::sbc), op("NOP", IMM, mi::nop), op("ISB", IZX, il::isb),
    op("CPX", ZP, cp::cpx), op("SBC", ZP, ar::sbc), op("INC", ZP, rmw::inc), op("ISB", ZP, il::isb),
    op("INX", IMP, ar::inx), op("SBC", IMM, ar::sbc), op("NOP", IMP, mi::nop), op("SBC", IMM, ar::sbc),
    op("CPX", ABS, cp::cpx), op("SBC", ABS, ar::sbc), op("INC", ABS, rmw::inc), op("ISB", ABS, il::isb),
    // 0xF0
    op("BEQ", REL, br::beq), op("SBC", IZY, ar::sbc), jam(), op("ISB", IZY, il::isb),
    op("NOP", ZPX, mi::nop), op("SBC", ZPX, ar::sbc), op("INC", ZPX, rmw::inc), op("ISB", ZPX, il::isb),
    op("SED", IMP, mi::sed), op("SBC", ABY, ar::sbc), op("NOP", IMP, mi::nop), op("ISB", ABY, il::isb),
    op("NOP", ABX, mi::nop), op("SBC", ABX, ar::sbc), op("INC", ABX, rmw::inc), op("ISB", ABX, il::isb),
];

/// Table entry for `opcode`.
#[inline]
pub fn lookup(opcode: u8) -> &'static OpEntry {
    &OPCODES[opcode as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAMS: [u8; 12] = [
        0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2,
    ];

    #[test]
    fn exactly_the_twelve_jams_lack_handlers() {
        let jams: Vec<u8> = (0..=255u8).filter(|&op| lookup(op).is_jam()).collect();
        assert_eq!(jams, JAMS.to_vec());
        assert!(JAMS.iter().all(|&op| lookup(op).mnemonic == "JAM"));
    }

    #[test]
    fn documented_entries_spot_check() {
        assert_eq!(lookup(0xA9).mnemonic, "LDA");
        assert_eq!(lookup(0xA9).mode, AddrMode::Immediate);
        assert_eq!(lookup(0x6C).mode, AddrMode::Indirect);
        assert_eq!(lookup(0x96).mode, AddrMode::ZeroPageY);
        assert_eq!(lookup(0xBE).mode, AddrMode::AbsoluteY);
        assert_eq!(lookup(0x0A).mode, AddrMode::Accumulator);
        assert_eq!(lookup(0xEB).mnemonic, "SBC");
    }

    #[test]
    fn undocumented_entries_present() {
        for (opcode, name) in [
            (0x07, "SLO"),
            (0x23, "RLA"),
            (0x5B, "SRE"),
            (0x7F, "RRA"),
            (0x87, "SAX"),
            (0xB3, "LAX"),
            (0xC7, "DCP"),
            (0xFF, "ISB"),
            (0x0B, "ANC"),
            (0x4B, "ASR"),
            (0x6B, "ARR"),
            (0x8B, "ANE"),
            (0xAB, "LXA"),
            (0xCB, "SBX"),
            (0xBB, "LAS"),
            (0x9B, "SHS"),
            (0x9F, "SHA"),
            (0x9E, "SHX"),
            (0x9C, "SHY"),
        ] {
            assert_eq!(lookup(opcode).mnemonic, name, "opcode {opcode:02X}");
        }
    }

    #[test]
    fn relative_mode_only_for_branches() {
        for opcode in 0..=255u8 {
            let e = lookup(opcode);
            if e.mode == AddrMode::Relative {
                assert!(e.mnemonic.starts_with('B') && e.mnemonic != "BIT" && e.mnemonic != "BRK");
            }
        }
    }
}
