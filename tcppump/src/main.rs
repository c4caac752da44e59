mod cli;
mod linux_interface;
mod signal;

use clap::Parser;
use cli::{Cli, OutputFormat};
use linux_interface::LinuxInterface;
use std::io::Write;
use tcppump_lib::backend::pcap_file::PcapFileBackend;
use tcppump_lib::backend::text_file::{TextFileBackend, TextFormat};
use tcppump_lib::backend::Backend;
use tcppump_lib::compiler::timestamp::Resolution;
use tcppump_lib::compiler::{self, CompilerOptions, InputMode};
use tcppump_lib::config::GlobalConfigBuilder;
use tcppump_lib::filter::Filter;
use tcppump_lib::netinterface::NetInterface;
use tcppump_lib::preprocessor::Preprocessor;
use tcppump_lib::resolver::Resolver;
use tcppump_lib::rng::{PredictableRng, Rng, SecureRng};
use tcppump_lib::scheduler::{FileSink, InterfaceSink, Scheduler, SystemClock};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit code for a setup failure (bad interface, bad output path, bad flags)
/// before anything has been sent. Matches §6's "-1" on an 8-bit exit status.
const EXIT_SETUP_FAILURE: i32 = 255;
/// Exit code for a parse or runtime failure once the run was under way.
const EXIT_RUNTIME_FAILURE: i32 = 254;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => std::process::exit(0),
        Err(Stage::Setup(err)) => {
            error!(%err, "setup failed");
            std::process::exit(EXIT_SETUP_FAILURE);
        }
        Err(Stage::Runtime(err)) => {
            error!(%err, "run failed");
            std::process::exit(EXIT_RUNTIME_FAILURE);
        }
    }
}

enum Stage {
    Setup(tcppump_lib::PumpError),
    Runtime(tcppump_lib::PumpError),
}

fn init_tracing(verbose: u8, quiet: bool) {
    let directive = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}

fn run(cli: &Cli) -> Result<(), Stage> {
    let resolution = Resolution::parse(&cli.resolution)
        .ok_or_else(|| Stage::Setup(tcppump_lib::PumpError::ParamFormat { name: "resolution".into(), found: cli.resolution.clone() }))?;

    let mut interface = match &cli.interface {
        Some(name) => {
            let mut iface = LinuxInterface::new(name).map_err(Stage::Setup)?;
            iface.open(cli.write.is_some()).map_err(Stage::Setup)?;
            Some(iface)
        }
        None => None,
    };

    let mut config_builder = GlobalConfigBuilder::new();
    if let Some(iface) = &interface {
        config_builder = config_builder.own_mac(iface.get_mac());
        if let Some(ip) = iface.get_ipv4() {
            config_builder = config_builder.own_ipv4(ip);
        }
        config_builder = config_builder.mtu(iface.get_mtu());
    }
    if let Some(mac) = cli.my_mac {
        config_builder = config_builder.own_mac(mac);
    }
    if let Some(ip) = cli.my_ip4 {
        config_builder = config_builder.own_ipv4(ip);
    }
    if let Some(ip6) = cli.my_ip6 {
        config_builder = config_builder.own_ipv6(ip6);
    }
    if let Some(mtu) = cli.mtu {
        config_builder = config_builder.mtu(mtu as usize);
    }
    let config = config_builder.freeze();

    let mode = if cli.script {
        InputMode::Script
    } else if let Some(scale) = cli.pcap {
        InputMode::Pcap { scale }
    } else {
        InputMode::Packet
    };
    let options = CompilerOptions { mode, resolution, default_delay_units: cli.delay };

    info!(inputs = cli.inputs.len(), mode = ?options.mode, "compiling");
    let mut output = compiler::compile(&cli.inputs, &options, &config).map_err(Stage::Runtime)?;

    Filter::new(cli.overwrite_dmac).apply(&mut output.sequence);

    if cli.arp {
        let iface = interface.as_mut().ok_or_else(|| {
            Stage::Setup(tcppump_lib::PumpError::Resolution("--arp requires -i/--interface".into()))
        })?;
        let own_ip = config.own_ipv4().ok_or_else(|| {
            Stage::Setup(tcppump_lib::PumpError::Resolution("--arp requires a source IPv4 (--myip4 or an addressed interface)".into()))
        })?;
        Resolver::new().resolve_sequence(iface, &mut output.sequence, config.own_mac(), own_ip).map_err(Stage::Runtime)?;
    }

    let preprocessor = Preprocessor::new(cli.rand_smac, cli.rand_dmac);
    let mut rng: Box<dyn Rng> = if cli.predictable_random { Box::new(PredictableRng::new()) } else { Box::new(SecureRng::new()) };
    let shutdown = signal::install();
    let clock = SystemClock;
    let mut scheduler = Scheduler::new(&preprocessor, rng.as_mut(), &clock, shutdown, output.realtime, cli.loop_count);

    let stats = if let Some(path) = &cli.write {
        let mut backend = open_file_backend(path, cli.format).map_err(Stage::Setup)?;
        let mut sink = FileSink(backend.as_mut());
        scheduler.run(&mut output.sequence, &mut sink).map_err(Stage::Runtime)?;
        backend.statistics().packets
    } else {
        let iface = interface.as_mut().ok_or_else(|| {
            Stage::Setup(tcppump_lib::PumpError::Send("either -i/--interface or -w/--write must be given".into()))
        })?;
        {
            let mut sink = InterfaceSink(iface as &mut dyn NetInterface);
            scheduler.run(&mut output.sequence, &mut sink).map_err(Stage::Runtime)?;
        }
        iface.get_send_statistic().packets
    };

    info!(packets = stats, "done");
    Ok(())
}

fn open_file_backend(path: &str, format: OutputFormat) -> tcppump_lib::Result<Box<dyn Backend>> {
    if path == "-" {
        let stdout: Box<dyn Write + Send> = Box::new(std::io::stdout());
        return Ok(match format {
            OutputFormat::Pcap => Box::new(PcapFileBackend::to_writer(stdout, "-")?),
            OutputFormat::Text => Box::new(TextFileBackend::to_writer(stdout, "-", TextFormat::Text)),
            OutputFormat::Hexstream => Box::new(TextFileBackend::to_writer(stdout, "-", TextFormat::HexStream)),
            OutputFormat::Hexdump => Box::new(TextFileBackend::to_writer(stdout, "-", TextFormat::HexDump)),
        });
    }
    Ok(match format {
        OutputFormat::Pcap => Box::new(PcapFileBackend::create(path)?),
        OutputFormat::Text => Box::new(TextFileBackend::create(path, TextFormat::Text)?),
        OutputFormat::Hexstream => Box::new(TextFileBackend::create(path, TextFormat::HexStream)?),
        OutputFormat::Hexdump => Box::new(TextFileBackend::create(path, TextFormat::HexDump)?),
    })
}
