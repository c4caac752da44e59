pub mod pcap_input;
pub mod timestamp;

use crate::address::MacAddress;
use crate::config::GlobalConfig;
use crate::error::{PumpError, Result, Span};
use crate::frame::ethernet::EthernetFrame;
use crate::frame::ipv4;
use crate::item::{Item, ItemSequence, LoopControl, WaitPoint};
use crate::parser::expr::{compile_expression, CompiledPacket};
use crate::parser::paramlist::ParameterList;
use crate::parser::script::{parse_script, Directive};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use timestamp::{Resolution, TimestampAccumulator};

/// Selects which of the three front ends `compile` runs, mirroring the CLI's
/// `-s`/`--script`/`--pcap` flags (plain positional args is the default).
#[derive(Debug, Clone)]
pub enum InputMode {
    Packet,
    Script,
    Pcap { scale: u32 },
}

/// Everything the Compiler needs besides the raw input strings: all of it
/// comes straight from CLI flags, parsed once by the binary crate.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub mode: InputMode,
    pub resolution: Resolution,
    pub default_delay_units: u64,
}

/// What compilation produces: the scheduled item sequence, plus whether the
/// run should honor per-item timestamps (real-time) or emit back-to-back
/// (throughput) — see §9 Open Question 2.
pub struct CompileOutput {
    pub sequence: ItemSequence,
    pub realtime: bool,
}

/// Compiles `inputs` (inline expressions, script file paths, or pcap file
/// paths, depending on `options.mode`) into a ready-to-schedule sequence.
/// Runs once per invocation; config must already be frozen.
pub fn compile(inputs: &[String], options: &CompilerOptions, config: &GlobalConfig) -> Result<CompileOutput> {
    match &options.mode {
        InputMode::Packet => compile_packet_args(inputs, options, config),
        InputMode::Script => compile_script_files(inputs, options, config),
        InputMode::Pcap { scale } => compile_pcap_files(inputs, *scale),
    }
}

fn default_delay(options: &CompilerOptions) -> Duration {
    options.resolution.to_duration(options.default_delay_units)
}

fn compile_packet_args(inputs: &[String], options: &CompilerOptions, config: &GlobalConfig) -> Result<CompileOutput> {
    let mut sequence = ItemSequence::new();
    let mut accumulator = TimestampAccumulator::new();
    let delay = default_delay(options);

    for expr in inputs {
        let compiled = compile_expression(expr, config.own_mac())?;
        push_packet(&mut sequence, compiled, config, accumulator.advance(delay))?;
    }

    Ok(CompileOutput { realtime: accumulator.is_realtime(), sequence })
}

fn compile_pcap_files(inputs: &[String], scale: u32) -> Result<CompileOutput> {
    let mut sequence = ItemSequence::new();
    let mut running = Duration::ZERO;

    for path in inputs {
        let data = std::fs::read(path).map_err(|e| PumpError::file_io(path.clone(), "read", e))?;
        let records = pcap_input::read_pcap_file(&data, path)?;
        for record in records {
            running += pcap_input::scale_delta(record.delta_since_previous, scale);
            let mut frame = EthernetFrame::with_default_capacity();
            frame.set_raw(&record.bytes)?;
            sequence.push(Item::Frame { frame, timestamp: Some(running) });
        }
    }

    Ok(CompileOutput { realtime: scale != 0 && !inputs.is_empty(), sequence })
}

fn compile_script_files(inputs: &[String], options: &CompilerOptions, config: &GlobalConfig) -> Result<CompileOutput> {
    let mut lines = Vec::new();
    for path in inputs {
        let text = std::fs::read_to_string(path).map_err(|e| PumpError::file_io(path.clone(), "read", e))?;
        let parsed = parse_script(&text).map_err(|e| annotate_with_file(e, path))?;
        lines.push((path.clone(), parsed));
    }

    // Pass 1: compute each directive's item index so forward `goto label`
    // references resolve before the sequence is actually built.
    let mut labels: HashMap<String, usize> = HashMap::new();
    let mut position = 0usize;
    for (_, file_lines) in &lines {
        for line in file_lines {
            for (directive, _span) in &line.directives {
                match directive {
                    Directive::Label(name) => {
                        labels.insert(name.clone(), position);
                    }
                    _ => position += 1,
                }
            }
        }
    }

    // Pass 2: build the real sequence, resolving Goto targets and patching
    // each Loop's end pointer when its matching `}` is reached.
    let mut sequence = ItemSequence::new();
    let mut accumulator = TimestampAccumulator::new();
    let default_delay = default_delay(options);
    let mut loop_stack: Vec<usize> = Vec::new();

    for (path, file_lines) in &lines {
        for line in file_lines {
            let mut first_on_line = true;
            for (directive, span) in &line.directives {
                let annotated = |e: PumpError| annotate_with_file(e, path);
                match directive {
                    Directive::Label(_) => {}
                    Directive::LoopEnd => {
                        let idx = loop_stack.pop().ok_or_else(|| {
                            annotated(PumpError::parse("unmatched '}'", *span))
                        })?;
                        sequence.push(Item::Goto(idx));
                        if let Some(Item::Loop(lc)) = sequence.iter().nth(idx) {
                            lc.set_end(sequence.len());
                        }
                    }
                    Directive::LoopStart(count) => {
                        let idx = sequence.push(Item::Loop(LoopControl::new(*count)));
                        loop_stack.push(idx);
                    }
                    Directive::Goto(label) => {
                        let target = *labels.get(label).ok_or_else(|| {
                            annotated(PumpError::parse(format!("undefined label '{label}'"), *span))
                        })?;
                        sequence.push(Item::Goto(target));
                    }
                    Directive::Wait(args) => {
                        let wait = parse_wait_args(args).map_err(annotated)?;
                        let ts = if first_on_line {
                            first_on_line = false;
                            match line.timestamp {
                                Some(units) => accumulator.explicit(options.resolution, units),
                                None => accumulator.advance(default_delay),
                            }
                        } else {
                            accumulator.advance(default_delay)
                        };
                        sequence.push(Item::Wait { wait, timestamp: Some(ts) });
                    }
                    Directive::PacketExpr(expr) => {
                        let compiled = compile_expression(expr, config.own_mac()).map_err(annotated)?;
                        let ts = if first_on_line {
                            first_on_line = false;
                            match line.timestamp {
                                Some(units) => accumulator.explicit(options.resolution, units),
                                None => accumulator.advance(default_delay),
                            }
                        } else {
                            accumulator.advance(default_delay)
                        };
                        push_packet(&mut sequence, compiled, config, ts).map_err(annotated)?;
                    }
                }
            }
        }
    }

    if !loop_stack.is_empty() {
        return Err(PumpError::parse("unclosed loop: missing '}'", Span::default()));
    }

    Ok(CompileOutput { realtime: accumulator.is_realtime(), sequence })
}

fn annotate_with_file(err: PumpError, path: &str) -> PumpError {
    match err {
        PumpError::Parse { message, span } => PumpError::Parse { message: format!("{path}: {message}"), span },
        other => other,
    }
}

/// Parses a script `wait(...)` body: a bare integer timeout, or
/// `timeout=N[, pattern=HEX][, bpf=TEXT]`.
fn parse_wait_args(args: &str) -> Result<WaitPoint> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return Ok(WaitPoint::default());
    }
    if !trimmed.contains('=') {
        let units: u64 = trimmed
            .parse()
            .map_err(|_| PumpError::ParamFormat { name: "wait".into(), found: trimmed.into() })?;
        return Ok(WaitPoint { timeout: Some(Duration::from_millis(units)), ..Default::default() });
    }

    let list = ParameterList::parse(&format!("({trimmed})"))?;
    let timeout = list
        .find_optional("timeout")
        .map(|p| p.as_int_ranged(0, u64::MAX))
        .transpose()?
        .map(Duration::from_millis);
    let pattern = list.find_optional("pattern").map(|p| p.as_stream()).transpose()?;
    let bpf_text = list.find_optional("bpf").map(|p| p.as_str().to_string());
    Ok(WaitPoint { bpf_text, pattern, timeout })
}

/// Turns a compiled expression into the item it becomes: a plain Frame, or a
/// FragmentedPacket when the IPv4 payload overflows the configured MTU. An
/// explicit `dstmac` stays as given; an omitted one is written as the
/// all-zero sentinel the Resolver looks for.
fn push_packet(sequence: &mut ItemSequence, compiled: CompiledPacket, config: &GlobalConfig, ts: Duration) -> Result<()> {
    match compiled {
        CompiledPacket::Frame(frame) => {
            sequence.push(Item::Frame { frame, timestamp: Some(ts) });
        }
        CompiledPacket::Ipv4 { src_mac, dst_mac, params, payload } => {
            let dst = dst_mac.unwrap_or_else(MacAddress::zero);
            let budget = config.mtu();
            if 20 + payload.len() <= budget {
                let frame = ipv4::build_frame(src_mac, dst, &params, &payload)?;
                sequence.push(Item::Frame { frame, timestamp: Some(ts) });
            } else {
                let fragments = ipv4::fragment(src_mac, dst, &params, &payload, budget)?;
                sequence.push(Item::FragmentedPacket { fragments, timestamp: Some(ts) });
            }
        }
    }
    Ok(())
}
