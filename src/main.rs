use clap::Parser;
use log::{error, info};
use simple_logger::init_with_level;

use genomeprep::{
    cli::{Args, SubArgs},
    config::{Config, RunContext},
    core::{plan, run},
    error::PipelineError,
};

fn main() {
    let start = std::time::Instant::now();
    let args: Args = Args::parse();

    if let Err(e) = init_with_level(args.log_level()) {
        eprintln!("ERROR: could not initialise logging: {}", e);
    }

    let result = match args.command {
        SubArgs::Run { args } => load(args.config).and_then(|mut ctx| {
            if let Some(threads) = args.threads {
                ctx.max_forks = threads.max(1);
            }
            run(&ctx).map(|report| report.log_summary())
        }),
        SubArgs::Plan { args } => load(args.config).and_then(|ctx| {
            for (stage, commands) in plan(&ctx)? {
                println!("[{}]", stage);
                for command in commands {
                    println!("  {}", command);
                }
            }
            Ok(())
        }),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }

    let elapsed = start.elapsed();
    info!("Elapsed time: {:.3?}", elapsed);
}

fn load(config: std::path::PathBuf) -> Result<RunContext, PipelineError> {
    Ok(Config::read(config)?.load()?)
}
