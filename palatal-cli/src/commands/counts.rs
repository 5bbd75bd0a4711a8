//! Descriptive grouped counts.
//!
//! palatal counts --input tokens.csv --by cluster,outcome

use anyhow::{Context, Result};
use clap::Args;

use palatal_table::derive::grouped_counts;
use palatal_table::{load_csv, Schema};

#[derive(Args)]
pub struct CountsArgs {
    /// Input token CSV file
    #[arg(long)]
    input: String,

    /// Grouping columns (comma-separated factor names)
    #[arg(long, default_value = "cluster,outcome")]
    by: String,
}

pub fn run(args: CountsArgs) -> Result<()> {
    let table = load_csv(std::path::Path::new(&args.input), &Schema::cluster_tokens())
        .with_context(|| format!("failed to load {}", args.input))?;

    let columns: Vec<&str> = args.by.split(',').map(str::trim).collect();
    let counts = grouped_counts(&table, &columns)
        .with_context(|| format!("failed to group by [{}]", args.by))?;

    for name in &columns {
        print!("{name:<16} ");
    }
    println!("{:>8}", "n");
    for group in &counts {
        for level in &group.levels {
            print!("{level:<16} ");
        }
        println!("{:>8}", group.count);
    }

    let total: usize = counts.iter().map(|g| g.count).sum();
    println!("total: {total}");
    Ok(())
}
