use std::path::PathBuf;

use color_eyre::eyre::Error;
use pgl::{
    bench::{
        benchmark_add,
        system_info,
        validate_correctness,
        DEFAULT_BENCH_SIZES,
        DEFAULT_VALIDATE_SIZES,
        PROFILE_PATH_VAR,
    },
    export::{
        export,
        test_exported_model,
    },
    graph::CaptureMode,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
pub enum Args {
    /// Export the add graph artifact.
    Export {
        /// Output artifact path.
        #[structopt(short, long, default_value = "add_graph.pgf")]
        output: PathBuf,

        /// Capture by tracing an example execution instead of scripting the
        /// module.
        #[structopt(long)]
        trace: bool,
    },

    /// Run tests and validation.
    Test {
        /// Artifact to test when neither --correctness nor --benchmark is
        /// given.
        #[structopt(short, long, default_value = "add_graph.pgf")]
        model: PathBuf,

        /// Validate the kernel against the fallback and a host reference.
        #[structopt(long)]
        correctness: bool,

        /// Benchmark both executors.
        #[structopt(long)]
        benchmark: bool,
    },

    /// Show adapter information.
    Info,
}

impl Args {
    pub async fn run(self) -> Result<(), Error> {
        match self {
            Args::Export { output, trace } => {
                let mode = if trace {
                    CaptureMode::Trace
                }
                else {
                    CaptureMode::Script
                };

                match export(&output, mode).await {
                    Ok(_) => println!("✓ graph exported to: {}", output.display()),
                    Err(error) => {
                        eprintln!("✗ export failed: {error}");
                        std::process::exit(1);
                    }
                }
            }

            Args::Test {
                model,
                correctness,
                benchmark,
            } => {
                if correctness {
                    println!("=== correctness validation ===");
                    let passed = validate_correctness(DEFAULT_VALIDATE_SIZES).await;
                    println!(
                        "correctness validation: {}",
                        if passed { "passed" } else { "failed" }
                    );
                }

                if benchmark {
                    println!("=== add benchmark ===");
                    let results = benchmark_add(DEFAULT_BENCH_SIZES, 10).await?;

                    for i in 0..results.kernel_times_ms.len() {
                        println!(
                            "size {:>8}: kernel {:>7.3}ms, fallback {:>7.3}ms, speedup {:>5.2}x",
                            results.sizes[i],
                            results.kernel_times_ms[i],
                            results.fallback_times_ms[i],
                            results.speedup_ratios[i],
                        );
                    }

                    if let Ok(path) = std::env::var(PROFILE_PATH_VAR) {
                        let bytes = postcard::to_stdvec(&results)?;
                        tokio::fs::write(&path, bytes).await?;
                        println!("profile written to: {path}");
                    }
                }

                if !correctness && !benchmark {
                    println!("=== testing exported graph: {} ===", model.display());
                    let passed = test_exported_model(&model).await;
                    println!("model test: {}", if passed { "passed" } else { "failed" });
                }
            }

            Args::Info => {
                match system_info().await {
                    Some((info, block_size)) => {
                        println!("adapter: {}", info.name);
                        println!("backend: {:?}", info.backend);
                        println!("driver: {} {}", info.driver, info.driver_info);
                        println!("device type: {:?}", info.device_type);
                        println!("kernel block size: {block_size}");
                    }
                    None => println!("no compute adapter available"),
                }
            }
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = Args::from_args();
    args.run().await?;

    Ok(())
}
