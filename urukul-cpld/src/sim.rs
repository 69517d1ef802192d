//! Simulated Urukul board.
//!
//! The CPLD together with four synthesizers and the attenuator chain. Every
//! host pin change is propagated through the CPLD to the chips and back.

use std::cell::{Ref, RefCell, RefMut};

use crossbeam::channel::Sender;
use urukul_pac::device::{check_length, Result, Spi, Word};
use urukul_pac::register::ChipSelect;

use crate::att::AttenuatorChain;
use crate::dds::Synth;
use crate::event::CpldEvent;
use crate::signals::{BusIn, ChipInputs, Outputs};
use crate::urukul::{CpldConfig, Urukul};
use crate::DDS_COUNT;

#[derive(Clone, Debug)]
pub struct Board {
    cpld: Urukul,
    dds: [Synth; DDS_COUNT],
    att: AttenuatorChain,
    bus: BusIn,
    outputs: Outputs,
}

impl Board {
    pub fn new(config: CpldConfig) -> Self {
        let cpld = Urukul::new(config);
        let dds: [Synth; DDS_COUNT] = Default::default();
        let att = AttenuatorChain::new();
        let mut board = Self {
            cpld,
            dds,
            att,
            bus: BusIn::default(),
            outputs: Outputs::default(),
        };
        board.outputs = board.cpld.outputs(&board.chip_inputs());
        board
    }

    pub fn cpld(&self) -> &Urukul {
        &self.cpld
    }

    pub fn attach_monitor(&mut self, monitor: Sender<CpldEvent>) {
        self.cpld.attach_monitor(monitor);
    }

    pub fn dds(&self, channel: usize) -> &Synth {
        assert!(channel < DDS_COUNT);
        &self.dds[channel]
    }

    pub fn dds_mut(&mut self, channel: usize) -> &mut Synth {
        assert!(channel < DDS_COUNT);
        &mut self.dds[channel]
    }

    pub fn att(&self) -> &AttenuatorChain {
        &self.att
    }

    pub fn bus(&self) -> BusIn {
        self.bus
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn chip_inputs(&self) -> ChipInputs {
        let mut chips = ChipInputs {
            att_s_out: self.att.s_out(),
            ..Default::default()
        };
        for (status, dds) in chips.dds.iter_mut().zip(self.dds.iter()) {
            *status = dds.status();
        }
        chips
    }

    pub fn apply(&mut self, bus: BusIn) {
        let chips = self.chip_inputs();
        self.cpld.step(bus, &chips);
        let pins = self.cpld.outputs(&chips);
        for (dds, pins) in self.dds.iter_mut().zip(pins.dds.iter()) {
            dds.apply(pins);
        }
        self.att.apply(&pins.att);
        self.bus = bus;
        self.outputs = self.cpld.outputs(&self.chip_inputs());
    }

    pub fn modify<F>(&mut self, f: F)
    where
        F: FnOnce(&mut BusIn),
    {
        let mut bus = self.bus;
        f(&mut bus);
        self.apply(bus);
    }

    /// Re-evaluates the outputs after a chip status line changed.
    pub fn refresh(&mut self) {
        self.apply(self.bus);
    }

    /// What the host sees on its return line: MISO, or the read-back line
    /// where MISO is not available.
    pub fn host_sdi(&self) -> bool {
        self.outputs.miso
            .or(self.outputs.readback)
            .unwrap_or(false)
    }

    /// One SPI mode 0 transaction on the shared bus, MSB first. Each bit is
    /// read before the rising edge that samples the outgoing one.
    pub fn spi_transfer(&mut self, cs: u8, length: u32, data: Word) -> Word {
        self.modify(|b| b.cs = cs);
        let mut miso = 0;
        for i in (0..length).rev() {
            self.modify(|b| {
                b.mosi = (data >> i) & 1 != 0;
                b.sck = false;
            });
            miso = (miso << 1) | self.host_sdi() as Word;
            self.modify(|b| b.sck = true);
        }
        self.modify(|b| b.sck = false);
        self.modify(|b| b.cs = 0);
        miso
    }

    /// One write on the QSPI bus. Channel `i` receives `data[i]`.
    pub fn qspi_write(&mut self, length: u32, data: [Word; DDS_COUNT]) {
        self.modify(|b| b.cs |= 0b100);
        for i in (0..length).rev() {
            self.modify(|b| {
                for (mosi, word) in b.nu_mosi.iter_mut().zip(data.iter()) {
                    *mosi = (word >> i) & 1 != 0;
                }
                b.nu_clk = false;
            });
            self.modify(|b| b.nu_clk = true);
        }
        self.modify(|b| b.nu_clk = false);
        self.modify(|b| b.cs &= !0b100);
    }
}

///////////////////////////////////////////////////////////////////////

/// Host driver transport bit-banging the simulated board.
pub struct SimBus {
    board: RefCell<Board>,
}

impl SimBus {
    pub fn new(config: CpldConfig) -> Self {
        Self::from_board(Board::new(config))
    }

    pub fn from_board(board: Board) -> Self {
        Self {
            board: RefCell::new(board),
        }
    }

    pub fn board(&self) -> Ref<'_, Board> {
        self.board.borrow()
    }

    pub fn board_mut(&self) -> RefMut<'_, Board> {
        self.board.borrow_mut()
    }

    pub fn into_board(self) -> Board {
        self.board.into_inner()
    }
}

impl Spi for SimBus {
    fn transfer(&self, cs: ChipSelect, length: u32, data: Word) -> Result<Word> {
        check_length(length)?;
        Ok(self.board.borrow_mut().spi_transfer(cs.into(), length, data))
    }
}

#[cfg(test)]
mod tests {
    use urukul_pac::device::Cpld;
    use urukul_pac::register::{ProtoRev, ATT, IFC_MODE, STA};

    use super::*;
    use crate::dds::Transaction;
    use crate::readback::ReadbackPhase;

    fn rev8() -> CpldConfig {
        CpldConfig::default()
    }

    fn rev9_nu() -> CpldConfig {
        CpldConfig {
            revision: ProtoRev::V9,
            ifc_mode: IFC_MODE::default().with_EN_NU(1),
        }
    }

    #[test]
    fn cfg_write_drives_lines() {
        let mut board = Board::new(rev8());
        board.modify(|b| b.sw[0] = true);
        board.dds_mut(0).pll_lock = true;
        for channel in 1..DDS_COUNT {
            board.dds_mut(channel).pll_lock = false;
        }
        board.dds_mut(1).smp_err = true;
        board.refresh();

        board.spi_transfer(1, 24, 0x123456);
        let out = board.outputs();
        let rf_sw: Vec<bool> = out.dds.iter().map(|p| p.rf_sw).collect();
        assert_eq!(rf_sw, vec![true, true, true, false]);
        assert!(out.dds.iter().all(|p| p.led_red));
        assert!(out.dds.iter().all(|p| p.profile == 4));
        assert_eq!(board.cpld().cfg().mask_nu, 0x1);

        // The read returns the status at the start of the transaction.
        let ret = board.spi_transfer(1, 24, 0x123456);
        assert_eq!(ret & 0xff_0000, 0x08_0000);
        assert_eq!(ret & 0xf, 0x7);
        assert_eq!(ret, 0x08_5127);
    }

    #[test]
    fn driver_round_trip_returns_status() {
        let cpld = Cpld::new(SimBus::new(rev8()), ProtoRev::V8);
        let sta = cpld.init().unwrap();
        assert_eq!(sta.PROTO_REV(), 8);
        assert_eq!(sta.RF_SW(), 0);

        let sta = cpld.cfg_rev8().write(|m| m.with_RF_SW(0x5).with_LED(0xf)).unwrap();
        // Captured before the write took effect.
        assert_eq!(sta.RF_SW(), 0x0);
        let sta = cpld.sta_read().unwrap();
        assert_eq!(sta.RF_SW(), 0x5);
        assert_eq!(cpld.bus().board().cpld().cfg().led, 0xf);
    }

    #[test]
    fn idle_code_absorbs_clocks() {
        let mut board = Board::new(rev8());
        board.spi_transfer(1, 24, 0x000456);
        board.spi_transfer(2, 32, 0x11223344);
        board.spi_transfer(0, 24, 0xff_ffff);
        assert_eq!(board.cpld().cfg_raw(), 0x456);
        assert_eq!(u32::from(board.att().active()), 0x11223344);
        for channel in 0..DDS_COUNT {
            assert!(board.dds(channel).received().is_empty());
        }
    }

    #[test]
    fn exclusive_dds_routing() {
        let mut board = Board::new(rev8());
        board.dds_mut(2).set_readback(16, 0xcafe);
        let ret = board.spi_transfer(6, 16, 0x1234);
        assert_eq!(ret, 0xcafe);
        for channel in 0..DDS_COUNT {
            let expected = if channel == 2 { vec![Transaction { length: 16, data: 0x1234 }] } else { vec![] };
            assert_eq!(board.dds(channel).received(), &expected[..]);
        }
        assert_eq!(board.cpld().cfg_raw(), 0);
    }

    #[test]
    fn broadcast_to_permitted_channels() {
        let mut board = Board::new(rev8());
        board.spi_transfer(1, 24, 0b1101 << 13);
        board.dds_mut(0).set_readback(16, 0x1234);
        board.dds_mut(2).set_readback(16, 0xffff);

        let ret = board.spi_transfer(3, 16, 0xbeef);
        assert_eq!(ret, 0x1234);
        for channel in [0, 2, 3] {
            assert_eq!(board.dds(channel).last(), Some(&Transaction { length: 16, data: 0xbeef }));
        }
        assert!(board.dds(1).received().is_empty());
    }

    #[test]
    fn driver_broadcast_honors_mask() {
        let cpld = Cpld::new(SimBus::new(rev8()), ProtoRev::V8);
        cpld.cfg_rev8().write(|m| m.with_MASK_NU(0b1101)).unwrap();
        cpld.bus().board_mut().dds_mut(0).set_readback(16, 0x1234);

        assert_eq!(cpld.dds_broadcast(16, 0xbeef).unwrap(), 0x1234);
        let board = cpld.bus().board();
        for channel in [0, 2, 3] {
            assert_eq!(board.dds(channel).last(), Some(&Transaction { length: 16, data: 0xbeef }));
        }
        assert_eq!(board.dds(1).last(), None);
    }

    #[test]
    fn attenuator_write_returns_previous() {
        let cpld = Cpld::new(SimBus::new(rev8()), ProtoRev::V8);
        let att = ATT::new().with_ATT0(0x11).with_ATT3(0x44);
        assert_eq!(u32::from(cpld.att_write(att).unwrap()), 0);
        assert_eq!(cpld.att_write(ATT::new()).unwrap(), att);
        assert_eq!(u32::from(cpld.bus().board().att().active()), 0);
    }

    #[test]
    fn attenuator_reset_by_cfg() {
        let mut board = Board::new(rev8());
        board.spi_transfer(2, 32, 0xffff_ffff);
        board.spi_transfer(1, 24, 1 << 19);
        assert!(!board.outputs().att.rst_n);
        assert_eq!(u32::from(board.att().active()), 0);
    }

    #[test]
    fn qspi_reaches_unmasked_channels() {
        let mut board = Board::new(CpldConfig {
            revision: ProtoRev::V8,
            ifc_mode: IFC_MODE::default().with_EN_NU(1),
        });
        // Channel 0 stays on the shared bus.
        board.spi_transfer(1, 24, 0b0001 << 13);
        board.qspi_write(16, [0x1000, 0x1001, 0x1002, 0x1003]);
        assert!(board.dds(0).received().is_empty());
        for channel in 1..DDS_COUNT {
            let word = Transaction { length: 16, data: 0x1000 + channel as u64 };
            assert_eq!(board.dds(channel).received(), &[word]);
        }

        board.spi_transfer(3, 8, 0x5a);
        assert_eq!(board.dds(0).last(), Some(&Transaction { length: 8, data: 0x5a }));
        assert_eq!(board.dds(1).received().len(), 1);
        assert_eq!(board.outputs().miso, None);
    }

    #[test]
    fn cs2_is_not_a_select_with_en_nu() {
        let mut board = Board::new(CpldConfig {
            revision: ProtoRev::V8,
            ifc_mode: IFC_MODE::default().with_EN_NU(1),
        });
        // CS=5 decodes as CFG with NU_CS asserted.
        board.spi_transfer(5, 24, 0x000007);
        assert_eq!(board.cpld().cfg().rf_sw, 0x7);
        assert!(board.dds(1).received().is_empty());
    }

    #[test]
    fn io_update_per_mask() {
        let mut board = Board::new(rev8());
        board.spi_transfer(1, 24, 0b0100 << 13);
        board.modify(|b| b.io_update = true);
        assert!(board.dds(0).pins().io_update);
        assert!(!board.dds(2).pins().io_update);
        board.modify(|b| b.io_update = false);
        assert_eq!(board.dds(0).io_updates(), 1);
        assert_eq!(board.dds(2).io_updates(), 0);
        assert_eq!(board.outputs().io_update_ret, Some(false));

        board.spi_transfer(1, 24, (0b0100 << 13) | (1 << 12));
        assert_eq!(board.dds(2).io_updates(), 1);
        assert_eq!(board.dds(0).io_updates(), 1);
    }

    #[test]
    fn test_points() {
        let mut board = Board::new(rev8());
        assert!(board.outputs().tp[0]);
        assert!(board.outputs().tp[4]);
        board.modify(|b| b.cs = 4);
        assert!(!board.outputs().tp[0]);
        board.modify(|b| b.sck = true);
        assert!(board.outputs().tp[1]);
        board.modify(|b| b.cs = 1);
        board.modify(|b| b.sck = false);
        board.modify(|b| b.sck = true);
        assert!(!board.outputs().tp[4]);
    }

    #[test]
    fn readback_sub_protocol() {
        let mut board = Board::new(rev9_nu());
        let cpld = board.cpld();
        assert_eq!(cpld.readback_phase(), Some(ReadbackPhase::Write));

        board.spi_transfer(2, 32, 0xaabbccdd);
        board.spi_transfer(1, 24, 1 << 11);
        assert!(board.cpld().cfg().readback);
        // Enabled during the transaction only, no flip yet.
        assert_eq!(board.cpld().readback_phase(), Some(ReadbackPhase::Write));

        // Write phase: the attenuator shifts out its previous contents.
        board.spi_transfer(2, 32, 0x44332211);
        assert_eq!(u32::from(board.att().active()), 0x44332211);
        assert_eq!(board.cpld().readback_phase(), Some(ReadbackPhase::Read));
        assert_eq!(board.cpld().readback_captured(), Some(0xdd));

        // Read phase: nothing is clocked, the captured byte comes back.
        let ret = board.spi_transfer(2, 24, 0xffffff);
        assert_eq!(ret & 0xff, 0xdd);
        assert_eq!(board.att().shift_register(), 0x44332211);
        assert_eq!(board.cpld().readback_phase(), Some(ReadbackPhase::Write));

        board.spi_transfer(1, 24, (1 << 11) | 0x3);
        assert_eq!(board.cpld().cfg().rf_sw, 0x3);
        let ret = board.spi_transfer(1, 24, 0);
        assert_eq!(ret & 0x7f_ffff, 9);
        assert_eq!(board.cpld().cfg().rf_sw, 0x3);

        board.dds_mut(1).pll_lock = false;
        board.refresh();
        board.spi_transfer(3, 8, 0);
        let ret = board.spi_transfer(3, 24, 0);
        assert_eq!(ret & 0x7f_ffff, 0b1101);

        // Clearing READBACK keeps every transaction in the write phase.
        board.spi_transfer(1, 24, 0);
        assert!(!board.cpld().cfg().readback);
        board.spi_transfer(2, 32, 0);
        assert_eq!(board.cpld().readback_phase(), Some(ReadbackPhase::Write));
        assert_eq!(u32::from(board.att().active()), 0);
    }

    #[test]
    fn readback_phase_drives_miso_without_en_nu() {
        let mut board = Board::new(CpldConfig {
            revision: ProtoRev::V9,
            ..Default::default()
        });
        board.spi_transfer(1, 24, 1 << 11);
        board.spi_transfer(1, 24, 1 << 11);
        let ret = board.spi_transfer(1, 24, 0);
        assert_eq!(ret & 0x7f_ffff, 9);
        assert!(board.cpld().cfg().readback);
    }

    #[test]
    fn sim_bus_checks_length() {
        let bus = SimBus::new(rev8());
        assert!(bus.transfer(ChipSelect::Cfg, 0, 0).is_err());
        let sta = STA::from(bus.transfer(ChipSelect::Cfg, 24, 0).unwrap() as u32);
        assert_eq!(sta.IFC_MODE(), 0b0101);
        assert_eq!(bus.into_board().cpld().cfg_raw(), 0);
    }
}
