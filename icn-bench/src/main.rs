use std::process;

use clap::{Arg, ArgMatches, Command};
use log::{error, info};

use icn_bench::{Reporter, Workload, WorkloadConfig};

fn parse_arg<T: std::str::FromStr>(matches: &ArgMatches, id: &str, default: T) -> T {
    matches
        .get_one::<String>(id)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn main() {
    env_logger::init();

    let matches = Command::new("icn-bench")
        .version("0.1.0")
        .about("ICN forwarder benchmark - drives the message processor with synthetic traffic")
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output file for benchmark results")
                .default_value("benchmark_results.json"),
        )
        .arg(
            Arg::new("messages")
                .short('n')
                .long("messages")
                .value_name("COUNT")
                .help("Interests issued per run")
                .default_value("100000"),
        )
        .arg(
            Arg::new("names")
                .long("names")
                .value_name("COUNT")
                .help("Distinct content names")
                .default_value("10000"),
        )
        .arg(
            Arg::new("cache-sizes")
                .long("cache-sizes")
                .value_name("LIST")
                .help("Comma-separated content store capacities, one run each")
                .default_value("0,1024,65536"),
        )
        .arg(
            Arg::new("payload")
                .long("payload")
                .value_name("BYTES")
                .help("Content object payload size")
                .default_value("1024"),
        )
        .get_matches();

    let messages: u64 = parse_arg(&matches, "messages", 100_000);
    let base = WorkloadConfig {
        distinct_names: parse_arg(&matches, "names", 10_000),
        payload_size: parse_arg(&matches, "payload", 1_024),
        ..Default::default()
    };

    let cache_sizes: Vec<usize> = match matches.get_one::<String>("cache-sizes") {
        Some(list) => match list
            .split(',')
            .map(|size| size.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(sizes) => sizes,
            Err(e) => {
                error!("Invalid cache size list {:?}: {}", list, e);
                process::exit(1);
            }
        },
        None => vec![base.content_store_capacity],
    };

    let mut reporter = Reporter::new();
    for capacity in cache_sizes {
        let config = WorkloadConfig {
            content_store_capacity: capacity,
            ..base.clone()
        };
        let name = format!("cs_{}", capacity);
        info!(
            "Running {}: {} interests over {} names",
            name, messages, config.distinct_names
        );

        let mut workload = Workload::new(&config);
        let result = workload.run(&name, messages);
        reporter.add_result(result, workload.processor().status());
    }

    reporter.print_summary();

    let output = matches
        .get_one::<String>("output")
        .map(String::as_str)
        .unwrap_or("benchmark_results.json");
    if let Err(e) = reporter.save_results(output) {
        error!("Failed to save results: {}", e);
        process::exit(1);
    }
}
