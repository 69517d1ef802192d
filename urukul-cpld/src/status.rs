use urukul_pac::register::{ProtoRev, IFC_MODE, STA};

use crate::signals::ChipInputs;

/// Read only status register.
///
/// A pure function of the live signals. It only becomes visible to the host
/// through the parallel load of the CFG shift register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusRegister {
    revision: ProtoRev,
    ifc_mode: IFC_MODE,
}

impl StatusRegister {
    pub fn new(revision: ProtoRev, ifc_mode: IFC_MODE) -> Self {
        Self {
            revision,
            ifc_mode,
        }
    }

    /// `rf_sw` is the actual switch state, CFG.RF_SW including the EEM1
    /// overrides.
    pub fn read(&self, rf_sw: u8, chips: &ChipInputs) -> STA {
        STA::new()
            .with_RF_SW(rf_sw & 0xf)
            .with_SMP_ERR(chips.smp_err())
            .with_PLL_LOCK(chips.pll_lock())
            .with_IFC_MODE(self.ifc_mode.bits())
            .with_PROTO_REV(self.revision.number())
    }

    pub fn word(&self, rf_sw: u8, chips: &ChipInputs) -> u32 {
        self.read(rf_sw, chips).into()
    }
}
