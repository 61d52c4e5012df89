use clap::Parser;
use kr_abundance::args::AbundanceArgs;
use kr_abundance::pipeline;
use std::time::Instant;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = AbundanceArgs::parse();
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.num_threads)
        .build_global()
        .ok();

    let start = Instant::now();
    match pipeline::run(&args) {
        Ok(summary) => {
            let duration = start.elapsed();
            println!(
                "Aggregated {} sample(s) into {} ({} taxa at rank {}), took: {:?}",
                summary.samples.len(),
                summary.output,
                summary.taxa,
                summary.rank,
                duration
            );
        }
        Err(e) => {
            eprintln!("kr_abundance: {}", e);
            std::process::exit(1);
        }
    }
}
