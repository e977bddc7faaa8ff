//! Standalone trace inspection tool
//!
//! Decodes a trace file and prints per-function call counts plus decoder
//! statistics.
//!
//! Usage:
//!   count_calls <trace_file> [--limit <count>]

use anyhow::{bail, Context, Result};
use call_trace_decoder::Decoder;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

struct TraceStats {
    total_calls: usize,
    with_return: usize,
    arg_slots: usize,
    per_function: HashMap<String, usize>,
}

impl TraceStats {
    fn new() -> Self {
        Self {
            total_calls: 0,
            with_return: 0,
            arg_slots: 0,
            per_function: HashMap::new(),
        }
    }

    fn record(&mut self, call: &call_trace_decoder::Call) {
        self.total_calls += 1;
        if call.ret.is_some() {
            self.with_return += 1;
        }
        self.arg_slots += call.args.len();
        *self.per_function.entry(call.name().to_string()).or_insert(0) += 1;
    }

    fn print_summary(&self) {
        println!("\n=== TRACE SUMMARY ===");
        println!("Total calls: {}", self.total_calls);
        println!("Calls with a return value: {}", self.with_return);
        println!("Argument slots decoded: {}", self.arg_slots);
        println!("Unique functions: {}", self.per_function.len());

        if !self.per_function.is_empty() {
            println!("\nTop 10 most frequent functions:");
            let mut sorted: Vec<_> = self.per_function.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            for (name, count) in sorted.into_iter().take(10) {
                println!("  {:8}  {}", count, name);
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next().map(PathBuf::from) else {
        bail!("usage: count_calls <trace_file> [--limit <count>]");
    };
    let mut limit = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--limit" => {
                let count = args.next().context("--limit needs a count")?;
                limit = Some(count.parse::<usize>().context("bad --limit count")?);
            }
            other => bail!("unknown argument: {}", other),
        }
    }

    let mut decoder = Decoder::open(&path)
        .with_context(|| format!("failed to open trace {:?}", path))?;
    println!("Trace format version: {}", decoder.version());

    let mut stats = TraceStats::new();
    while let Some(call) = decoder.next_call()? {
        stats.record(&call);
        if limit.is_some_and(|limit| stats.total_calls >= limit) {
            println!("(stopping after {} calls)", stats.total_calls);
            break;
        }
    }

    let decoder_stats = decoder.stats();
    stats.print_summary();
    println!(
        "\nInterned signatures: {} functions, {} enums, {} bitmasks, {} structs",
        decoder_stats.functions,
        decoder_stats.enums,
        decoder_stats.bitmasks,
        decoder_stats.structs
    );

    Ok(())
}
