use std::error::Error;
use std::thread;

use clap::{Parser, Subcommand, Args};

use crossbeam::channel::{unbounded, Receiver};
use log::info;
use urukul_cpld::CpldConfig;
use urukul_cpld::event::CpldEvent;
use urukul_cpld::sim::{Board, SimBus};
use urukul_pac::device::Cpld;
use urukul_pac::register::{ProtoRev, IFC_MODE};

use crate::board::dump::registers_dump;
use crate::board::monitor::print_cpld_event;
use crate::board::transaction::{parse_ifc_mode, parse_revision, parse_u32, Transaction};

mod board;
mod logger;

#[derive(Parser)]
#[clap(author, version, about, long_about=None)]
pub(crate) struct Cli {
    /// CPLD protocol revision, 8 or 9
    #[clap(long, default_value="8", parse(try_from_str=parse_revision))]
    pub rev: ProtoRev,

    /// IFC_MODE straps, LSB first: EN_9910, EN_NU, EN_EEM1, UNUSED
    #[clap(long, default_value="0b0101", parse(try_from_str=parse_ifc_mode))]
    pub ifc_mode: IFC_MODE,

    /// More log output, repeat for more
    #[clap(short, long, parse(from_occurrences))]
    pub verbose: u64,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub(crate) struct TransferArgs {
    /// Transactions as cs:bits:data, e.g. 1:24:0x000003
    #[clap(required=true)]
    transactions: Vec<Transaction>,
}

#[derive(Args)]
pub(crate) struct DumpArgs {
    /// Configuration word written before dumping
    #[clap(long, parse(try_from_str=parse_u32))]
    cfg: Option<u32>,
}

#[derive(Args)]
pub(crate) struct MonitorArgs {
    /// Transactions as cs:bits:data, e.g. 2:32:0x44332211
    #[clap(required=true)]
    transactions: Vec<Transaction>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    #[clap(name="transfer")]
    Transfer(TransferArgs),

    #[clap(name="dump")]
    Dump(DumpArgs),

    #[clap(name="monitor")]
    Monitor(MonitorArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    logger::init(logger::level(args.verbose))?;

    let config = CpldConfig {
        revision: args.rev,
        ifc_mode: args.ifc_mode,
    };
    info!("config: {:?}", config);

    match args.command {
        Commands::Transfer(a) => {
            let cpld = Cpld::new(SimBus::new(config), config.revision);
            for t in a.transactions {
                let miso = cpld.transfer(t.cs, t.length, t.data)?;
                let digits = ((t.length + 3) / 4) as usize;
                println!("{t} -> 0x{miso:0digits$x}");
            }
        },
        Commands::Dump(a) => {
            let cpld = Cpld::new(SimBus::new(config), config.revision);
            registers_dump(&cpld, a.cfg)?;
        },
        Commands::Monitor(a) => {
            let (event_sender, event_receiver) = unbounded();

            thread::Builder::new()
                .name("cpld".to_string())
                .spawn(move || {
                    let mut board = Board::new(config);
                    board.attach_monitor(event_sender);
                    for t in a.transactions {
                        let miso = board.spi_transfer(t.cs.into(), t.length, t.data);
                        info!("{t} -> {miso:#x}");
                    }
                    eprintln!("done: cpld");
                })?;

            monitor(event_receiver);
            eprintln!("done: monitor");
        },
    }

    Ok(())
}

///////////////////////////////////////////////////////////////////////

/// Prints events until the board thread hangs up.
fn monitor(receiver: Receiver<CpldEvent>) {
    while let Ok(event) = receiver.recv() {
        print_cpld_event(&event);
    }
}
