use console::{style, Color};
use log::warn;

use urukul_cpld::sim::SimBus;
use urukul_cpld::signals::Outputs;
use urukul_pac::device::{Cpld, Result, CFG_LENGTH};
use urukul_pac::register::{rev8, rev9, ChipSelect, ProtoRev};

/// Resets the CPLD, optionally writes `cfg`, then prints CFG and STA.
pub fn registers_dump(cpld: &Cpld<SimBus>, cfg: Option<u32>) -> Result<()> {
    let en_nu = cpld.bus().board().cpld().config().ifc_mode.EN_NU() != 0;
    if en_nu {
        // MISO carries NU_CLK, nothing can be read back.
        warn!("EN_NU set, STA reads as zero");
        cpld.transfer(ChipSelect::Cfg, CFG_LENGTH, 0)?;
    } else {
        cpld.init()?;
    }
    if let Some(cfg) = cfg {
        match cpld.revision() {
            ProtoRev::V8 => cpld.cfg_rev8().write(|_| rev8::CFG::from(cfg))?,
            ProtoRev::V9 => cpld.cfg_rev9().write(|_| rev9::CFG::from(cfg))?,
        };
    }
    let sta = cpld.sta_read()?;

    println!("Device\tPROTO_REV={}, IFC_MODE=0b{:04b}", sta.PROTO_REV(), sta.IFC_MODE());
    match cpld.revision() {
        ProtoRev::V8 => println!("CFG\t0x{:06x} {:?}", cpld.cfg_raw(), cpld.cfg_rev8().shadow()),
        ProtoRev::V9 => println!("CFG\t0x{:06x} {:?}", cpld.cfg_raw(), cpld.cfg_rev9().shadow()),
    }
    println!("STA\t0x{:06x} {:?}", u32::from(sta), sta);

    let board = cpld.bus().board();
    outputs_dump(board.outputs());
    println!("ATT\t{:?}", board.att().active());

    Ok(())
}

pub fn outputs_dump(out: &Outputs) {
    let color = |v: bool| if v { Color::Green } else { Color::Black };
    let fault = |v: bool| if v { Color::Red } else { Color::Black };

    for (i, pins) in out.dds.iter().enumerate() {
        println!("DDS{i}\t[{}][{}][{}] PROFILE={} CS_N={} IO_UPDATE={} RESET={}",
            style("RF_SW").fg(color(pins.rf_sw)),
            style("LED_G").fg(color(pins.led_green)),
            style("LED_R").fg(fault(pins.led_red)),
            pins.profile,
            pins.cs_n as u8,
            pins.io_update as u8,
            pins.reset as u8,
        );
    }
    println!("Common\tMASTER_RESET={} IO_RESET={} ATT_RST_N={}",
        out.master_reset as u8,
        out.io_reset as u8,
        out.att.rst_n as u8,
    );
    println!("Clock\t{:?}", out.clk);
    println!("Sync\t{:?} IO_UPDATE_RET={:?}", out.sync, out.io_update_ret);
}
