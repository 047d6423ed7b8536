//! Result submission to the SWEET-CROSS platform.
//!
//! Equipped with a [`CrossClient`], [`submit_results`] uploads result files
//! without going through the web form: either a locally stored CSV or Excel
//! file, or an in-memory [`ResultsTable`] rendered to CSV on the fly. The
//! `submission_contract` argument determines under which project the file
//! is submitted; the default is [`DEFAULT_SUBMISSION_CONTRACT`].

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::blocking::multipart::{Form, Part};
use serde_json::json;
use std::path::Path;
use tracing::info;

use crate::client::CrossClient;
use crate::error::error_from_response;
use crate::util::urljoin;

/// Contract used when the caller does not name one.
pub const DEFAULT_SUBMISSION_CONTRACT: &str = "submission_cross2025";

/// Column-ordered results table, the in-memory alternative to uploading a
/// prepared file. Rendered to CSV with a header line and no index column.
#[derive(Debug, Clone)]
pub struct ResultsTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultsTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row; the number of cells must match the header.
    pub fn push_row<I, S>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let row: Vec<String> = row.into_iter().map(Into::into).collect();
        if row.len() != self.columns.len() {
            bail!(
                "row has {} cell(s) but the header has {} column(s)",
                row.len(),
                self.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders the table as CSV bytes.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        if self.columns.is_empty() {
            bail!("results table has no columns");
        }

        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer
            .write_record(&self.columns)
            .context("failed to render the CSV header")?;
        for row in &self.rows {
            writer
                .write_record(row)
                .context("failed to render a CSV row")?;
        }
        writer
            .into_inner()
            .map_err(|e| anyhow!("failed to flush the CSV buffer: {}", e))
    }
}

/// Submits a results file through the given client.
///
/// `fn_results` names the upload. With `table = None` it must point at an
/// existing `.csv`, `.xlsx` or `.xls` file whose bytes are uploaded as-is;
/// with a table, the name must end in `.csv` and the rendered table is
/// uploaded under that name. The upload lands at
/// `/result/upload/{submission_contract}` and the platform is expected to
/// answer 201.
pub fn submit_results(
    client: &CrossClient,
    fn_results: impl AsRef<Path>,
    table: Option<&ResultsTable>,
    submission_contract: Option<&str>,
) -> Result<()> {
    let fn_results = fn_results.as_ref();
    let contract = submission_contract.unwrap_or(DEFAULT_SUBMISSION_CONTRACT);

    let extension = fn_results.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !matches!(extension, "csv" | "xlsx" | "xls") {
        bail!(
            "Unsupported file format. Provide a CSV or Excel file; the name must end with .csv, .xlsx or .xls"
        );
    }

    let Some(file_name) = fn_results.file_name().and_then(|n| n.to_str()) else {
        bail!("results file name is not valid UTF-8: {}", fn_results.display());
    };

    let file_description = json!({
        "description": format!(
            "Submission of results file {} at {} through crossclient.",
            file_name,
            Utc::now()
        ),
        "uploaded_by": client.username(),
    });

    let bytes = match table {
        None => {
            if !fn_results.exists() {
                bail!(
                    "the specified results file does not exist: {}",
                    fn_results.display()
                );
            }
            std::fs::read(fn_results)
                .with_context(|| format!("failed to read {}", fn_results.display()))?
        }
        Some(table) => {
            if extension != "csv" {
                bail!("when providing results as a table, the file name must end with .csv");
            }
            table.to_csv()?
        }
    };

    let part = Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str("application/octet-stream")
        .context("failed to build the upload part")?;
    let form = Form::new()
        .part("file", part)
        .text("file_description", file_description.to_string());

    let endpoint = format!("/result/upload/{}", contract);
    let resp = client.post_multipart(&endpoint, form)?;

    let status = resp.status();
    if status != StatusCode::CREATED {
        let text = resp.text().unwrap_or_default();
        let url = urljoin(client.base_url(), &endpoint);
        return Err(error_from_response(status, &url, &text)
            .context(format!("submission failed with status code {}", status.as_u16())));
    }

    info!("submission successful: {} under contract '{}'", file_name, contract);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;

    // Offline client: validation failures happen before any request is sent.
    fn offline_client() -> CrossClient {
        CrossClient::from_config(ClientConfig {
            url: "http://localhost:9".into(),
            username: "test_user".into(),
            password: "test_password".into(),
            verify: true,
        })
        .unwrap()
    }

    #[test]
    fn rejects_unsupported_file_format() {
        let err = submit_results(&offline_client(), "results.txt", None, None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("Unsupported file format"), "{err}");
    }

    #[test]
    fn rejects_table_with_non_csv_name() {
        let mut table = ResultsTable::new(["a", "b"]);
        table.push_row(["1", "3"]).unwrap();
        let err = submit_results(&offline_client(), "results.xlsx", Some(&table), None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("must end with .csv"), "{err}");
    }

    #[test]
    fn rejects_missing_file() {
        let err = submit_results(&offline_client(), "non_existent_file.csv", None, None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("does not exist"), "{err}");
    }

    #[test]
    fn table_renders_header_and_rows() {
        let mut table = ResultsTable::new(["column1", "column2"]);
        table.push_row(["1", "a"]).unwrap();
        table.push_row(["2", "b"]).unwrap();

        let csv = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert_eq!(csv, "column1,column2\n1,a\n2,b\n");
    }

    #[test]
    fn table_quotes_cells_containing_delimiters() {
        let mut table = ResultsTable::new(["name", "note"]);
        table.push_row(["x", "hello, world"]).unwrap();

        let csv = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert_eq!(csv, "name,note\nx,\"hello, world\"\n");
    }

    #[test]
    fn table_rejects_row_arity_mismatch() {
        let mut table = ResultsTable::new(["a", "b"]);
        let err = table.push_row(["only one"]).unwrap_err().to_string();
        assert!(err.contains("header"), "{err}");
        assert!(table.is_empty());
    }

    #[test]
    fn table_without_columns_cannot_render() {
        let table = ResultsTable::new(Vec::<String>::new());
        assert!(table.to_csv().is_err());
    }
}
