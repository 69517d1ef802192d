//! Chip select decode and serial line routing.

use urukul_pac::register::{ChipSelect, IFC_MODE};

use crate::signals::{BusIn, ChipInputs, Outputs};
use crate::DDS_COUNT;

/// Decoded chip select.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Selection {
    Idle,
    Cfg,
    Att,
    /// Every DDS with its CFG.MASK_NU bit set.
    Broadcast,
    Dds(usize),
}

impl Selection {
    pub fn decode(code: u8) -> Self {
        match ChipSelect::from(code) {
            ChipSelect::None => Selection::Idle,
            ChipSelect::Cfg => Selection::Cfg,
            ChipSelect::Att => Selection::Att,
            ChipSelect::DdsMulti => Selection::Broadcast,
            ChipSelect::Dds0 => Selection::Dds(0),
            ChipSelect::Dds1 => Selection::Dds(1),
            ChipSelect::Dds2 => Selection::Dds(2),
            ChipSelect::Dds3 => Selection::Dds(3),
        }
    }

    pub fn code(self) -> u8 {
        ChipSelect::from(self).into()
    }

    pub fn is_idle(self) -> bool {
        self == Selection::Idle
    }
}

impl From<Selection> for ChipSelect {
    fn from(selection: Selection) -> Self {
        match selection {
            Selection::Idle => ChipSelect::None,
            Selection::Cfg => ChipSelect::Cfg,
            Selection::Att => ChipSelect::Att,
            Selection::Broadcast => ChipSelect::DdsMulti,
            Selection::Dds(channel) => ChipSelect::dds(channel),
        }
    }
}

/// Lowest index channel with its mask bit set.
pub fn first_permitted(mask_nu: u8) -> Option<usize> {
    (0..DDS_COUNT).find(|&i| mask_nu & (1 << i) != 0)
}

/// Devices selected on the shared bus.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Route {
    pub cfg: bool,
    pub att: bool,
    pub dds: [bool; DDS_COUNT],
}

impl Route {
    pub fn new(selection: Selection, mask_nu: u8) -> Self {
        let mut route = Route::default();
        match selection {
            Selection::Idle => {},
            Selection::Cfg => route.cfg = true,
            Selection::Att => route.att = true,
            Selection::Broadcast => {
                for (i, dds) in route.dds.iter_mut().enumerate() {
                    *dds = mask_nu & (1 << i) != 0;
                }
            },
            Selection::Dds(channel) => route.dds[channel] = true,
        }
        route
    }

    pub fn any(&self) -> bool {
        self.cfg || self.att || self.dds.iter().any(|&d| d)
    }
}

///////////////////////////////////////////////////////////////////////

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChipSelectRouter {
    en_nu: bool,
}

impl ChipSelectRouter {
    pub fn new(ifc_mode: IFC_MODE) -> Self {
        Self {
            en_nu: ifc_mode.EN_NU() != 0,
        }
    }

    /// MISO is only driven without EN_NU.
    pub fn miso_available(&self) -> bool {
        !self.en_nu
    }

    /// With EN_NU, CS2 is NU_CS and only CS1:CS0 select on the shared bus.
    pub fn selection(&self, bus: &BusIn) -> Selection {
        let code = if self.en_nu { bus.cs & 0b011 } else { bus.cs & 0b111 };
        Selection::decode(code)
    }

    /// Channel is driven from the QSPI bus.
    pub fn qspi(&self, mask_nu: u8, channel: usize) -> bool {
        self.en_nu && mask_nu & (1 << channel) == 0
    }

    /// Serial output of the selected device.
    pub fn miso(&self, selection: Selection, mask_nu: u8, cfg_sdo: bool, chips: &ChipInputs) -> bool {
        match selection {
            Selection::Idle => false,
            Selection::Cfg => cfg_sdo,
            Selection::Att => chips.att_s_out,
            Selection::Broadcast => first_permitted(mask_nu)
                .map(|i| chips.dds[i].sdo)
                .unwrap_or(false),
            Selection::Dds(channel) => chips.dds[channel].sdo,
        }
    }

    /// Drives the DDS and attenuator serial lines.
    pub fn drive(&self, route: &Route, mask_nu: u8, bus: &BusIn, att_le: bool, out: &mut Outputs) {
        for (i, pins) in out.dds.iter_mut().enumerate() {
            if self.qspi(mask_nu, i) {
                pins.cs_n = !bus.nu_cs();
                pins.sck = bus.nu_clk;
                pins.sdi = bus.nu_mosi[i];
            } else {
                pins.cs_n = !route.dds[i];
                pins.sck = bus.sck;
                pins.sdi = bus.mosi;
            }
        }
        out.att.clk = route.att && bus.sck;
        out.att.s_in = bus.mosi;
        out.att.le = att_le;
    }
}
