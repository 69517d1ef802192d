use urukul_pac::register::{rev8, rev9, ClockDivider, ProtoRev, IFC_MODE};

use crate::signals::{BusIn, ChipInputs, Division, Outputs};
use crate::DDS_COUNT;

/// Decoded configuration register, independent of the protocol revision.
///
/// Fields a revision does not have stay at their reset value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigFields {
    pub rf_sw: u8,
    pub led: u8,
    pub profile: u8,
    pub readback: bool,
    pub io_update: bool,
    pub mask_nu: u8,
    /// CLK_SEL (revision 8) or CLK_SEL1:CLK_SEL0 (revision 9).
    pub clk_sel: u8,
    pub sync_sel: bool,
    pub rst: bool,
    pub io_rst: bool,
    pub clk_div: ClockDivider,
}

impl ConfigFields {
    pub fn decode(revision: ProtoRev, raw: u32) -> Self {
        match revision {
            ProtoRev::V8 => {
                let cfg = rev8::CFG::from(raw);
                Self {
                    rf_sw: cfg.RF_SW(),
                    led: cfg.LED(),
                    profile: cfg.PROFILE(),
                    readback: false,
                    io_update: cfg.IO_UPDATE() != 0,
                    mask_nu: cfg.MASK_NU(),
                    clk_sel: cfg.CLK_SEL(),
                    sync_sel: cfg.SYNC_SEL() != 0,
                    rst: cfg.RST() != 0,
                    io_rst: cfg.IO_RST() != 0,
                    clk_div: ClockDivider::Default,
                }
            },
            ProtoRev::V9 => {
                let cfg = rev9::CFG::from(raw);
                Self {
                    rf_sw: cfg.RF_SW(),
                    led: cfg.LED(),
                    profile: cfg.PROFILE(),
                    readback: cfg.READBACK() != 0,
                    io_update: cfg.IO_UPDATE() != 0,
                    mask_nu: cfg.MASK_NU(),
                    clk_sel: (cfg.CLK_SEL1() << 1) | cfg.CLK_SEL0(),
                    sync_sel: cfg.SYNC_SEL() != 0,
                    rst: cfg.RST() != 0,
                    io_rst: cfg.IO_RST() != 0,
                    clk_div: cfg.CLK_DIV(),
                }
            },
        }
    }

    pub fn encode(&self, revision: ProtoRev) -> u32 {
        match revision {
            ProtoRev::V8 => rev8::CFG::new()
                .with_RF_SW(self.rf_sw & 0xf)
                .with_LED(self.led & 0xf)
                .with_PROFILE(self.profile & 0x7)
                .with_IO_UPDATE(self.io_update as u8)
                .with_MASK_NU(self.mask_nu & 0xf)
                .with_CLK_SEL(self.clk_sel & 0x1)
                .with_SYNC_SEL(self.sync_sel as u8)
                .with_RST(self.rst as u8)
                .with_IO_RST(self.io_rst as u8)
                .into(),
            ProtoRev::V9 => rev9::CFG::new()
                .with_RF_SW(self.rf_sw & 0xf)
                .with_LED(self.led & 0xf)
                .with_PROFILE(self.profile & 0x7)
                .with_READBACK(self.readback as u8)
                .with_IO_UPDATE(self.io_update as u8)
                .with_MASK_NU(self.mask_nu & 0xf)
                .with_CLK_SEL0(self.clk_sel & 0x1)
                .with_SYNC_SEL(self.sync_sel as u8)
                .with_RST(self.rst as u8)
                .with_IO_RST(self.io_rst as u8)
                .with_CLK_SEL1((self.clk_sel >> 1) & 0x1)
                .with_CLK_DIV(self.clk_div)
                .into(),
        }
    }

    pub fn masked(&self, channel: usize) -> bool {
        self.mask_nu & (1 << channel) != 0
    }
}

///////////////////////////////////////////////////////////////////////

/// Configuration register and the control signals it drives.
#[derive(Clone, Debug)]
pub struct ConfigRegister {
    revision: ProtoRev,
    ifc_mode: IFC_MODE,
    raw: u32,
    fields: ConfigFields,
}

impl ConfigRegister {
    pub fn new(revision: ProtoRev, ifc_mode: IFC_MODE) -> Self {
        Self {
            revision,
            ifc_mode,
            raw: 0,
            fields: ConfigFields::default(),
        }
    }

    /// Takes a newly latched word. Reserved bits are dropped.
    pub fn update(&mut self, word: u64) -> ConfigFields {
        self.fields = ConfigFields::decode(self.revision, word as u32);
        self.raw = self.fields.encode(self.revision);
        self.fields
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn fields(&self) -> &ConfigFields {
        &self.fields
    }

    /// Actual RF switch state: CFG.RF_SW or the EEM1 override.
    pub fn rf_sw(&self, bus: &BusIn) -> u8 {
        bus.sw.iter()
            .enumerate()
            .fold(self.fields.rf_sw, |v, (i, &sw)| v | ((sw as u8) << i))
    }

    fn division(&self) -> Division {
        let strap = || if self.ifc_mode.EN_9910() != 0 { Division::Four } else { Division::One };
        match self.fields.clk_div {
            ClockDivider::Default => strap(),
            ClockDivider::One => Division::One,
            ClockDivider::Two => Division::Two,
            ClockDivider::Four => Division::Four,
        }
    }

    /// Drives everything that does not depend on the chip select routing.
    pub fn drive(&self, bus: &BusIn, chips: &ChipInputs, out: &mut Outputs) {
        let f = &self.fields;
        let en_9910 = self.ifc_mode.EN_9910() != 0;
        let en_nu = self.ifc_mode.EN_NU() != 0;
        let en_eem1 = self.ifc_mode.EN_EEM1() != 0;
        let rf_sw = self.rf_sw(bus);

        for i in 0..DDS_COUNT {
            let status = &chips.dds[i];
            let pins = &mut out.dds[i];
            pins.rf_sw = rf_sw & (1 << i) != 0;
            pins.led_green = pins.rf_sw;
            pins.led_red = f.led & (1 << i) != 0
                || (en_9910 && (status.smp_err || !status.pll_lock));
            pins.profile = f.profile;
            pins.io_update = if f.masked(i) { f.io_update } else { bus.io_update };
            pins.reset = f.rst || (!en_9910 && bus.dds_reset);
        }
        out.master_reset = f.rst;
        out.io_reset = f.io_rst;
        out.att.rst_n = !f.rst;

        out.clk.div = self.division();
        match self.revision {
            ProtoRev::V8 => {
                out.clk.in_sel = f.clk_sel & 0b01 != 0;
                out.clk.mmcx_osc_sel = false;
                out.clk.osc_en_n = false;
            },
            ProtoRev::V9 => {
                out.clk.in_sel = f.clk_sel & 0b01 != 0;
                out.clk.mmcx_osc_sel = f.clk_sel & 0b10 != 0;
                // The oscillator only runs while it is the clock source.
                out.clk.osc_en_n = f.clk_sel != 0;
            },
        }

        out.sync.sync_sel = f.sync_sel;
        out.sync.clk_out_en = !en_nu && en_eem1 && en_9910;
        out.sync.sync_out_en = out.sync.clk_out_en;
        out.io_update_ret = if !en_nu && en_eem1 { Some(bus.io_update) } else { None };
    }
}
