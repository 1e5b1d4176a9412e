//! TIA register addresses and timing constants.

// Write registers (address & 0x3F).
pub const VSYNC: u8 = 0x00;
pub const VBLANK: u8 = 0x01;
pub const WSYNC: u8 = 0x02;
pub const RSYNC: u8 = 0x03;
pub const NUSIZ0: u8 = 0x04;
pub const NUSIZ1: u8 = 0x05;
pub const COLUP0: u8 = 0x06;
pub const COLUP1: u8 = 0x07;
pub const COLUPF: u8 = 0x08;
pub const COLUBK: u8 = 0x09;
pub const CTRLPF: u8 = 0x0A;
pub const REFP0: u8 = 0x0B;
pub const REFP1: u8 = 0x0C;
pub const PF0: u8 = 0x0D;
pub const PF1: u8 = 0x0E;
pub const PF2: u8 = 0x0F;
pub const RESP0: u8 = 0x10;
pub const RESP1: u8 = 0x11;
pub const RESM0: u8 = 0x12;
pub const RESM1: u8 = 0x13;
pub const RESBL: u8 = 0x14;
pub const AUDC0: u8 = 0x15;
pub const AUDC1: u8 = 0x16;
pub const AUDF0: u8 = 0x17;
pub const AUDF1: u8 = 0x18;
pub const AUDV0: u8 = 0x19;
pub const AUDV1: u8 = 0x1A;
pub const GRP0: u8 = 0x1B;
pub const GRP1: u8 = 0x1C;
pub const ENAM0: u8 = 0x1D;
pub const ENAM1: u8 = 0x1E;
pub const ENABL: u8 = 0x1F;
pub const HMP0: u8 = 0x20;
pub const HMP1: u8 = 0x21;
pub const HMM0: u8 = 0x22;
pub const HMM1: u8 = 0x23;
pub const HMBL: u8 = 0x24;
pub const VDELP0: u8 = 0x25;
pub const VDELP1: u8 = 0x26;
pub const VDELBL: u8 = 0x27;
pub const RESMP0: u8 = 0x28;
pub const RESMP1: u8 = 0x29;
pub const HMOVE: u8 = 0x2A;
pub const HMCLR: u8 = 0x2B;
pub const CXCLR: u8 = 0x2C;

/// Internal pseudo-registers used only inside the delay queue.
pub const SHUFFLE_P0: u8 = 0xF0;
pub const SHUFFLE_P1: u8 = 0xF1;
pub const SHUFFLE_BL: u8 = 0xF2;

// Read registers (address & 0x0F).
pub const CXM0P: u8 = 0x00;
pub const CXM1P: u8 = 0x01;
pub const CXP0FB: u8 = 0x02;
pub const CXP1FB: u8 = 0x03;
pub const CXM0FB: u8 = 0x04;
pub const CXM1FB: u8 = 0x05;
pub const CXBLPF: u8 = 0x06;
pub const CXPPMM: u8 = 0x07;
pub const INPT0: u8 = 0x08;
pub const INPT1: u8 = 0x09;
pub const INPT2: u8 = 0x0A;
pub const INPT3: u8 = 0x0B;
pub const INPT4: u8 = 0x0C;
pub const INPT5: u8 = 0x0D;

pub const WRITE_MASK: u16 = 0x3F;
pub const READ_MASK: u16 = 0x0F;

/// Number of shadowed write registers.
pub const SHADOW_COUNT: usize = 64;

// Timing.
pub const H_PIXEL: u32 = 160;
pub const H_BLANK_CLOCKS: u32 = 68;
pub const H_CLOCKS: u32 = 228;
pub const CYCLE_CLOCKS: u32 = 3;
pub const FRAME_BUFFER_HEIGHT: u32 = 320;

/// Write-to-effect delays in color clocks.
pub mod delay {
    pub const HMOVE: u8 = 6;
    pub const PF: u8 = 2;
    pub const GRP: u8 = 1;
    pub const SHUFFLE_PLAYER: u8 = 1;
    pub const SHUFFLE_BALL: u8 = 1;
    pub const HMP: u8 = 2;
    pub const HMM: u8 = 2;
    pub const HMBL: u8 = 2;
    pub const HMCLR: u8 = 2;
    pub const REFP: u8 = 1;
    pub const ENABL: u8 = 1;
    pub const ENAM: u8 = 1;
    pub const VBLANK: u8 = 1;
}

/// Counter values loaded by RESPx/RESMx/RESBL depending on beam position.
pub mod resx {
    pub const HBLANK: u8 = 159;
    pub const LATE_HBLANK: u8 = 158;
    pub const FRAME: u8 = 157;
    /// From this h-counter on, a strobe during hblank counts as late.
    pub const LATE_HBLANK_THRESHOLD: u32 = super::H_BLANK_CLOCKS - 3;
}

/// One bit per object pair; an object's "disabled" mask has every bit set
/// except the ones it participates in.
pub mod collision {
    pub const PLAYER0: u16 = 0b0111_1100_0000_0000;
    pub const PLAYER1: u16 = 0b0100_0011_1100_0000;
    pub const MISSILE0: u16 = 0b0010_0010_0011_1000;
    pub const MISSILE1: u16 = 0b0001_0001_0010_0110;
    pub const BALL: u16 = 0b0000_1000_1001_0101;
    pub const PLAYFIELD: u16 = 0b0000_0100_0100_1011;

    pub const ENABLED: u16 = 0xFFFF;

    #[inline]
    pub const fn disabled(mask: u16) -> u16 {
        !mask & 0x7FFF
    }

    /// The top bit is set only in `ENABLED`.
    #[inline]
    pub const fn is_on(collision: u16) -> bool {
        collision & 0x8000 != 0
    }
}
