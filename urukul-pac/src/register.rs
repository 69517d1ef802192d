#![allow(non_snake_case)]
#![allow(non_camel_case_types)]
#![allow(clippy::upper_case_acronyms)]

use modular_bitfield::prelude::*;

/// Implements the 24-bit word conversions used on the CFG/STA shift path.
/// Bits outside `$mask` are reserved: they read back as zero and writes to
/// them are dropped.
macro_rules! register_word {
    ($name:ty, $mask:expr) => {
        impl $name {
            pub const MASK: u32 = $mask;
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                let [b0, b1, b2, _] = (value & <$name>::MASK).to_le_bytes();
                <$name>::from_bytes([b0, b1, b2])
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> Self {
                let [b0, b1, b2] = value.into_bytes();
                u32::from_le_bytes([b0, b1, b2, 0]) & <$name>::MASK
            }
        }
    };
}

///////////////////////////////////////////////////////////////////////
// Protocol revision

/// CPLD protocol revision, as reported in STA.PROTO_REV.
///
/// Incremented whenever the register layout, the LED behavior or the EEM pin
/// usage changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProtoRev {
    /// Select-latched CFG shift register, one clock select bit.
    V8,
    /// Bit-counted CFG shift register, read-back sub-protocol, two clock
    /// select bits and a clock divider field.
    V9,
}

impl ProtoRev {
    pub const fn number(self) -> u8 {
        match self {
            ProtoRev::V8 => 8,
            ProtoRev::V9 => 9,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            8 => Some(ProtoRev::V8),
            9 => Some(ProtoRev::V9),
            _ => None,
        }
    }
}

impl Default for ProtoRev {
    fn default() -> Self {
        ProtoRev::V8
    }
}

///////////////////////////////////////////////////////////////////////
// Chip select

/// Target of an SPI transaction, encoded on CS2:CS0 (CS2 is the MSB).
///
/// | CS        | chip                                       |
/// |-----------|--------------------------------------------|
/// | 0 = 0b000 | None                                       |
/// | 1 = 0b001 | CFG                                        |
/// | 2 = 0b010 | ATT                                        |
/// | 3 = 0b011 | Multiple DDS (those with CFG.MASK_NU set)  |
/// | 4 = 0b100 | DDS0                                       |
/// | 5 = 0b101 | DDS1                                       |
/// | 6 = 0b110 | DDS2                                       |
/// | 7 = 0b111 | DDS3                                       |
///
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChipSelect {
    None = 0,
    Cfg = 1,
    Att = 2,
    DdsMulti = 3,
    Dds0 = 4,
    Dds1 = 5,
    Dds2 = 6,
    Dds3 = 7,
}

impl ChipSelect {
    pub const DDS_COUNT: usize = 4;

    pub fn dds(channel: usize) -> Self {
        assert!(channel < Self::DDS_COUNT);
        Self::from(4 + channel as u8)
    }
}

impl From<u8> for ChipSelect {
    fn from(code: u8) -> Self {
        match code & 0b111 {
            0 => ChipSelect::None,
            1 => ChipSelect::Cfg,
            2 => ChipSelect::Att,
            3 => ChipSelect::DdsMulti,
            4 => ChipSelect::Dds0,
            5 => ChipSelect::Dds1,
            6 => ChipSelect::Dds2,
            _ => ChipSelect::Dds3,
        }
    }
}

impl From<ChipSelect> for u8 {
    fn from(cs: ChipSelect) -> Self {
        cs as u8
    }
}

///////////////////////////////////////////////////////////////////////
// Mode straps

/// Interface mode DIP switches (IFC_MODE[0:3]).
///
/// * EN_9910: On if AD9910 is populated (instead of AD9912).
/// * EN_NU: On if NU-Servo mode is used. MISO and CS2 are then unavailable on
///   the SPI interface; they carry NU_CLK and NU_CS of the QSPI interface.
/// * EN_EEM1: On if the SYNC signals on EEM1 should be driven.
/// * UNUSED: Unused switch, echoed in STA.IFC_MODE.
///
#[bitfield(bits = 8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IFC_MODE {
    pub EN_9910: B1,
    pub EN_NU: B1,
    pub EN_EEM1: B1,
    pub UNUSED: B1,
    #[skip] __: B4,
}

impl IFC_MODE {
    /// The four strap bits as echoed in STA.IFC_MODE.
    pub fn bits(self) -> u8 {
        u8::from(self) & 0xf
    }
}

impl Default for IFC_MODE {
    fn default() -> Self {
        IFC_MODE::new()
            .with_EN_9910(1)
            .with_EN_EEM1(1)
    }
}

///////////////////////////////////////////////////////////////////////
// Configuration register

/// Clock divider setting (CFG.CLK_DIV, protocol revision 9).
#[derive(Copy, Clone, BitfieldSpecifier, Debug, PartialEq, Eq)]
#[bits = 2]
pub enum ClockDivider {
    /// Divide by 4 with EN_9910, by 1 otherwise.
    Default = 0b00,
    One = 0b01,
    Two = 0b10,
    Four = 0b11,
}

impl Default for ClockDivider {
    fn default() -> Self {
        ClockDivider::Default
    }
}

pub mod rev8 {
    use super::*;

    /// Configuration register, protocol revision 8.
    ///
    /// The configuration register is updated on the deassertion of CS after
    /// at least one rising SCK edge. The initial state is 0 (all bits
    /// cleared). The bits (from LSB to MSB) are:
    ///
    /// | Name      | Width | Function                                        |
    /// |-----------|-------|-------------------------------------------------|
    /// | RF_SW     | 4     | Activates RF switch per channel                 |
    /// | LED       | 4     | Activates the red LED per channel               |
    /// | PROFILE   | 3     | Controls DDS[0:3].PROFILE[0:2]                  |
    /// | DUMMY     | 1     |                                                 |
    /// | IO_UPDATE | 1     | Asserts DDS[0:3].IO_UPDATE where CFG.MASK_NU    |
    /// |           |       | is high                                         |
    /// | MASK_NU   | 4     | Disables DDS from QSPI interface, disables      |
    /// |           |       | IO_UPDATE control through IO_UPDATE EEM signal, |
    /// |           |       | enables access through CS=3, enables control of |
    /// |           |       | IO_UPDATE through CFG.IO_UPDATE                 |
    /// | CLK_SEL   | 1     | Selects CLK source                              |
    /// | SYNC_SEL  | 1     | Selects SYNC source                             |
    /// | RST       | 1     | Asserts DDS[0:3].RESET, DDS[0:3].MASTER_RESET,  |
    /// |           |       | ATT[0:3].RST                                    |
    /// | IO_RST    | 1     | Asserts DDS[0:3].IO_RESET                       |
    ///
    #[bitfield(bits = 24)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct CFG {
        pub RF_SW: B4,
        pub LED: B4,
        pub PROFILE: B3,
        #[skip] __: B1,
        pub IO_UPDATE: B1,
        pub MASK_NU: B4,
        pub CLK_SEL: B1,
        pub SYNC_SEL: B1,
        pub RST: B1,
        pub IO_RST: B1,
        #[skip] __: B3,
    }

    register_word!(CFG, 0x1f_f7ff);
}

pub mod rev9 {
    use super::*;

    /// Configuration register, protocol revision 9.
    ///
    /// The register is updated on the 24th rising SCK edge of a CS=1
    /// transaction, whether or not CS is deasserted afterwards. Bits 0..=20
    /// keep their revision 8 meaning. Additionally:
    ///
    /// | Name      | Width | Function                                        |
    /// |-----------|-------|-------------------------------------------------|
    /// | READBACK  | 1     | Enables the half-duplex read-back sub-protocol  |
    /// | CLK_SEL0  | 1     | Selects CLK source (SMA)                        |
    /// | CLK_SEL1  | 1     | Selects MMCX/oscillator CLK source              |
    /// | CLK_DIV   | 2     | Clock divider, see [`ClockDivider`]             |
    ///
    #[bitfield(bits = 24)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct CFG {
        pub RF_SW: B4,
        pub LED: B4,
        pub PROFILE: B3,
        pub READBACK: B1,
        pub IO_UPDATE: B1,
        pub MASK_NU: B4,
        pub CLK_SEL0: B1,
        pub SYNC_SEL: B1,
        pub RST: B1,
        pub IO_RST: B1,
        pub CLK_SEL1: B1,
        pub CLK_DIV: ClockDivider,
    }

    register_word!(CFG, 0xff_ffff);
}

///////////////////////////////////////////////////////////////////////
// Status register

/// Status register.
///
/// | Name      | Width | Function                                  |
/// |-----------|-------|-------------------------------------------|
/// | RF_SW     | 4     | Actual RF switch and green LED activation |
/// |           |       | (including that by EEM1.SW[0:3])          |
/// | SMP_ERR   | 4     | DDS[0:3].SMP_ERR                          |
/// | PLL_LOCK  | 4     | DDS[0:3].PLL_LOCK                         |
/// | IFC_MODE  | 4     | IFC_MODE[0:3]                             |
/// | PROTO_REV | 7     | Protocol revision (see [`ProtoRev`])      |
/// | DUMMY     | 1     | Not used                                  |
///
/// The status is loaded into the CFG shift register at the first rising SCK
/// edge of a CS=1 transaction. The MSB of a shifted-out word is never valid,
/// which is why the top bit is unused.
///
#[bitfield(bits = 24)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct STA {
    pub RF_SW: B4,
    pub SMP_ERR: B4,
    pub PLL_LOCK: B4,
    pub IFC_MODE: B4,
    pub PROTO_REV: B7,
    #[skip] __: B1,
}

register_word!(STA, 0x7f_ffff);

///////////////////////////////////////////////////////////////////////
// Attenuators

/// Attenuator chain shift register.
///
/// The four digital step attenuators are daisy-chained (ATT[n].S_OUT driving
/// ATT[n+1].S_IN) and form a 32 bit SPI compatible shift register. The byte
/// shifted in last ends up in ATT0. The data is transferred to the active
/// attenuation registers on the deselection of the attenuators.
///
#[bitfield(bits = 32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ATT {
    pub ATT0: B8,
    pub ATT1: B8,
    pub ATT2: B8,
    pub ATT3: B8,
}

impl ATT {
    pub fn channel(&self, channel: usize) -> u8 {
        assert!(channel < ChipSelect::DDS_COUNT);
        (u32::from(*self) >> (8 * channel)) as u8
    }
}

///////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modular_bitfield_is_lsb_first() {
        let dut = rev8::CFG::new()
            .with_RF_SW(0x6)
            .with_LED(0x5)
            .with_PROFILE(0x4)
            ;

        assert_eq!(u32::from(dut), 0x000456);
    }

    #[test]
    fn cfg_rev8_field_positions() {
        let dut = rev8::CFG::from(0x123456);
        assert_eq!(dut.RF_SW(), 0x6);
        assert_eq!(dut.LED(), 0x5);
        assert_eq!(dut.PROFILE(), 0x4);
        assert_eq!(dut.IO_UPDATE(), 0x1);
        assert_eq!(dut.MASK_NU(), 0x1);
        assert_eq!(dut.CLK_SEL(), 0x1);
        assert_eq!(dut.SYNC_SEL(), 0x0);
        assert_eq!(dut.RST(), 0x0);
        assert_eq!(dut.IO_RST(), 0x1);
    }

    #[test]
    fn cfg_rev8_reserved_bits_read_zero() {
        let dut = rev8::CFG::from(0xff_ffff);
        assert_eq!(u32::from(dut), 0x1f_f7ff);
    }

    #[test]
    fn cfg_rev9_field_positions() {
        let dut = rev9::CFG::new()
            .with_READBACK(1)
            .with_CLK_SEL1(1)
            .with_CLK_DIV(ClockDivider::Two)
            ;
        assert_eq!(u32::from(dut), (1 << 11) | (1 << 21) | (0b10 << 22));
        assert_eq!(rev9::CFG::from(0xc0_0000).CLK_DIV(), ClockDivider::Four);
    }

    #[test]
    fn sta_proto_rev_position() {
        let dut = STA::new()
            .with_PROTO_REV(ProtoRev::V8.number())
            .with_IFC_MODE(0b0101)
            ;
        assert_eq!(u32::from(dut), 0x08_5000);
        assert_eq!(STA::from(0xff_ffff).PROTO_REV(), 0x7f);
        assert_eq!(u32::from(STA::from(0xff_ffff)), 0x7f_ffff);
    }

    #[test]
    fn chip_select_decode() {
        assert_eq!(ChipSelect::from(0), ChipSelect::None);
        assert_eq!(ChipSelect::from(3), ChipSelect::DdsMulti);
        assert_eq!(ChipSelect::from(0b1111), ChipSelect::Dds3);
        assert_eq!(ChipSelect::dds(2), ChipSelect::Dds2);
        assert_eq!(u8::from(ChipSelect::Att), 2);
    }

    #[test]
    #[should_panic(expected="channel < Self::DDS_COUNT")]
    fn chip_select_bad_channel() {
        let _ = ChipSelect::dds(4);
    }

    #[test]
    fn att_channel_order() {
        let dut = ATT::from(0x44332211);
        assert_eq!(dut.ATT0(), 0x11);
        assert_eq!(dut.channel(3), 0x44);
    }

    #[test]
    fn ifc_mode_default() {
        let dut = IFC_MODE::default();
        assert_eq!(dut.bits(), 0b0101);
        assert_eq!(IFC_MODE::from(0xff).bits(), 0xf);
    }
}
