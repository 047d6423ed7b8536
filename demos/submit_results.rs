use anyhow::Result;
use crossclient::{CrossClient, ResultsTable, submit_results};

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Configure credentials via env vars or a `.crossclientrc` file.
    let client = CrossClient::from_env()?;

    let mut results = ResultsTable::new(["target", "quantity", "value", "uncertainty"]);
    results.push_row(["56Fe", "thermal_xs", "1.17", "0.02"])?;
    results.push_row(["197Au", "thermal_xs", "98.71", "0.12"])?;

    submit_results(&client, "results.csv", Some(&results), None)?;
    println!("Submission successful.");
    Ok(())
}
