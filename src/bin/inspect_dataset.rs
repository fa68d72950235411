use arrow::array::{Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use cas_analysis::data::{load_dataset, region::plain_region_name, REGION_COLUMN};
use std::collections::BTreeMap;
use std::{env, path::Path, process::exit};

fn main() {
    // Expect exactly one CLI argument: path to a CSV or Parquet dataset.
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <DATASET_FILE>", args[0]);
        exit(1);
    }
    if let Err(e) = inspect_dataset(Path::new(&args[1])) {
        eprintln!("Error: {}", e);
        exit(1);
    }
}

/// Load the dataset and print its schema, row count and region breakdown.
fn inspect_dataset(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let batch = load_dataset(path)?;

    println!("=== Dataset: {} ===", path.display());
    println!("Total rows:    {}", batch.num_rows());
    println!("Total columns: {}", batch.num_columns());
    println!();

    println!("=== Columns ===");
    for field in batch.schema().fields() {
        println!(
            "- {:<30} | {:<12} | nullable: {}",
            field.name(),
            format!("{:?}", field.data_type()),
            field.is_nullable()
        );
    }
    println!();

    // population datasets carry `Region` instead of `region`
    let Ok(idx) = batch.schema().index_of(REGION_COLUMN) else {
        println!("(no `{}` column, skipping region breakdown)", REGION_COLUMN);
        return Ok(());
    };
    let labels = cast(batch.column(idx), &DataType::Utf8)?;
    let labels = labels
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or("region column did not cast to Utf8")?;

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for label in labels.iter().flatten() {
        *counts.entry(label).or_default() += 1;
    }

    println!("=== Regions ===");
    for (label, n) in &counts {
        match plain_region_name(label) {
            Some(name) => println!("- {:<30} | {:>10} rows | config name: {}", label, n, name),
            None => println!("- {:<30} | {:>10} rows", label, n),
        }
    }
    println!("Null region rows: {}", labels.null_count());

    Ok(())
}
