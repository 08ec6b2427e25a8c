use clap::Parser;
use log::LevelFilter;
use mondrian::sim::Simulator;
use simple_logger::SimpleLogger;
use std::path::PathBuf;

/// Lisp-to-Piet compiler with a stack-machine simulator
#[derive(Parser, Debug)]
#[command(name = "mondrian")]
#[command(version)]
#[command(about = "Compile Lisp source into Piet stack-machine instructions")]
struct CliArgs {
    /// Source file to compile
    #[arg(value_name = "FILE")]
    script: PathBuf,

    /// Print the emitted instruction listing instead of simulating
    #[arg(long)]
    listing: bool,

    /// Print the emitted program as JSON for downstream tools
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new().with_level(level).init()?;

    let source = std::fs::read_to_string(&args.script)?;
    let mut program = mondrian::compile(&source)?;

    if args.listing {
        print!("{}", program.disassemble());
        return Ok(());
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&program.emitted())?);
        return Ok(());
    }

    let mut sim = Simulator::new();
    sim.run(&mut program)?;
    if !sim.output().is_empty() {
        println!("{}", sim.output());
    }
    println!("stack: {:?}", sim.stack());
    Ok(())
}
