//! Signal-level interface of the CPLD.
//!
//! Everything the core reads from the EEM connectors and the populated chips,
//! and everything it drives back. Physical pin assignment is not modeled;
//! lines are named by function.

use crate::DDS_COUNT;

/// Host side inputs from the EEM connectors.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BusIn {
    pub sck: bool,
    pub mosi: bool,
    /// CS2:CS0. With EN_NU, CS2 is NU_CS.
    pub cs: u8,
    /// Shares the MISO pair, only an input with EN_NU.
    pub nu_clk: bool,
    pub nu_mosi: [bool; DDS_COUNT],
    pub io_update: bool,
    /// DDS_RESET without EN_9910, SYNC_OUT with EN_9910.
    pub dds_reset: bool,
    /// EEM1.SW[0:3] RF switch overrides.
    pub sw: [bool; DDS_COUNT],
}

impl BusIn {
    pub fn nu_cs(&self) -> bool {
        self.cs & 0b100 != 0
    }
}

/// Lines driven by one synthesizer towards the CPLD.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DdsStatus {
    pub sdo: bool,
    pub smp_err: bool,
    pub pll_lock: bool,
}

impl Default for DdsStatus {
    /// Pulled up when nothing drives them.
    fn default() -> Self {
        Self {
            sdo: true,
            smp_err: true,
            pll_lock: true,
        }
    }
}

/// Inputs from the populated chips.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChipInputs {
    pub dds: [DdsStatus; DDS_COUNT],
    pub att_s_out: bool,
}

impl ChipInputs {
    fn vector<F: Fn(&DdsStatus) -> bool>(&self, f: F) -> u8 {
        self.dds.iter()
            .enumerate()
            .fold(0, |v, (i, dds)| v | ((f(dds) as u8) << i))
    }

    pub fn smp_err(&self) -> u8 {
        self.vector(|dds| dds.smp_err)
    }

    pub fn pll_lock(&self) -> u8 {
        self.vector(|dds| dds.pll_lock)
    }
}

/// Per synthesizer outputs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DdsPins {
    pub cs_n: bool,
    pub sck: bool,
    pub sdi: bool,
    pub io_update: bool,
    pub reset: bool,
    pub profile: u8,
    pub rf_sw: bool,
    pub led_green: bool,
    pub led_red: bool,
}

impl Default for DdsPins {
    fn default() -> Self {
        Self {
            cs_n: true,
            sck: false,
            sdi: false,
            io_update: false,
            reset: false,
            profile: 0,
            rf_sw: false,
            led_green: false,
            led_red: false,
        }
    }
}

/// Attenuator chain outputs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AttPins {
    pub clk: bool,
    pub s_in: bool,
    pub le: bool,
    pub rst_n: bool,
}

impl Default for AttPins {
    fn default() -> Self {
        Self {
            clk: false,
            s_in: false,
            le: true,
            rst_n: true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Division {
    One,
    Two,
    Four,
}

impl Default for Division {
    fn default() -> Self {
        Division::One
    }
}

/// Clock tree outputs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClockPins {
    /// Selects the external SMA input.
    pub in_sel: bool,
    /// Selects the MMCX input over the on-board oscillator.
    pub mmcx_osc_sel: bool,
    pub osc_en_n: bool,
    pub div: Division,
}

/// Synchronization tree outputs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncPins {
    pub sync_sel: bool,
    pub clk_out_en: bool,
    pub sync_out_en: bool,
}

/// Everything the CPLD drives. `None` marks a line that is not driven.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Outputs {
    pub miso: Option<bool>,
    /// Return line of the read-back sub-protocol.
    pub readback: Option<bool>,
    pub io_update_ret: Option<bool>,
    pub dds: [DdsPins; DDS_COUNT],
    pub master_reset: bool,
    pub io_reset: bool,
    pub att: AttPins,
    pub clk: ClockPins,
    pub sync: SyncPins,
    /// TP0..TP4: DDS0 CS_N, DDS0 SCK, DDS0 SDO, DDS0 SDI, CFG latch enable.
    pub tp: [bool; 5],
}
