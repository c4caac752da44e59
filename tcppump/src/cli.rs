use clap::{Parser, ValueEnum};
use tcppump_lib::address::{Ip6Address, IpAddress, MacAddress};

/// Which of the four file dump styles `-F` selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pcap,
    Text,
    Hexstream,
    Hexdump,
}

/// `tcppump`'s single best-fit flag shape (the source's many mutually
/// exclusive front-end modes collapse to `-s`/`--pcap`/plain positional).
#[derive(Parser, Debug)]
#[command(author, version, about = "Ethernet packet generator", long_about = None)]
pub struct Cli {
    /// Network interface to bind for sending/receiving; omit for a pure file run.
    #[arg(short = 'i', long = "interface", value_name = "NAME")]
    pub interface: Option<String>,

    /// Override the interface-derived source IPv4.
    #[arg(long = "myip4", value_name = "ADDR")]
    pub my_ip4: Option<IpAddress>,

    /// Override the interface-derived source IPv6.
    #[arg(long = "myip6", value_name = "ADDR")]
    pub my_ip6: Option<Ip6Address>,

    /// Override the interface-derived source MAC.
    #[arg(long = "mymac", value_name = "MAC")]
    pub my_mac: Option<MacAddress>,

    /// Override the interface-derived MTU.
    #[arg(long = "mtu", value_parser = clap::value_parser!(u32).range(68..=1_048_576))]
    pub mtu: Option<u32>,

    /// Replace every frame's source MAC with a fresh random address at emission time.
    #[arg(long = "rand-smac")]
    pub rand_smac: bool,

    /// Replace every frame's destination MAC with a fresh random address at emission time.
    #[arg(long = "rand-dmac")]
    pub rand_dmac: bool,

    /// Filter stage: rewrite every destination MAC to this value.
    #[arg(long = "overwrite-dmac", value_name = "MAC")]
    pub overwrite_dmac: Option<MacAddress>,

    /// Treat positional arguments as script file paths instead of inline expressions.
    #[arg(short = 's', long = "script")]
    pub script: bool,

    /// Treat positional arguments as PCAP file paths; optional scale factor for replay delays
    /// (0 = throughput mode, ignore recorded timing).
    #[arg(long = "pcap", num_args = 0..=1, default_missing_value = "1", value_name = "SCALE")]
    pub pcap: Option<u32>,

    /// Repeat the whole sequence N times; 0 repeats until interrupted.
    #[arg(short = 'l', long = "loop", default_value_t = 1)]
    pub loop_count: u32,

    /// Default inter-packet delay, in the active resolution unit.
    #[arg(short = 'd', long = "delay", default_value_t = 0)]
    pub delay: u64,

    /// Time unit for timestamps and delays: (u)s, (m)s, (c)s or (s).
    #[arg(short = 't', long = "resolution", default_value = "m")]
    pub resolution: String,

    /// Write to a file (or `-` for stdout) instead of a live interface.
    #[arg(short = 'w', long = "write", value_name = "PATH")]
    pub write: Option<String>,

    /// Output format used by `-w`.
    #[arg(short = 'F', long = "format", value_enum, default_value_t = OutputFormat::Pcap)]
    pub format: OutputFormat,

    /// Resolve IPv4 destinations with no explicit MAC via ARP.
    #[arg(short = 'a', long = "arp")]
    pub arp: bool,

    /// Use a deterministic counter instead of a secure RNG for random MACs.
    #[arg(long = "predictable-random")]
    pub predictable_random: bool,

    /// Increase log verbosity (repeatable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all but error-level logging.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Packet expressions, script paths, or PCAP paths, depending on `-s`/`--pcap`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub inputs: Vec<String>,
}
