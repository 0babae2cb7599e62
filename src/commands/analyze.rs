//! Analyze command implementation

use crate::error::Result;
use crate::graphql::{self, RequiredVariables};
use serde::Serialize;

/// Required inputs of an operation document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub operation_name: Option<String>,
    pub required_variables: RequiredVariables,
}

/// Parse an operation document and list its required variables
pub fn cmd_analyze(source: &str) -> Result<AnalysisReport> {
    let document = graphql::parse_document(source)?;
    Ok(AnalysisReport {
        operation_name: graphql::leading_operation_name(source)?,
        required_variables: graphql::required_variables(&document),
    })
}

pub fn print_analysis(report: &AnalysisReport) {
    println!(
        "Operation: {}",
        report.operation_name.as_deref().unwrap_or("(anonymous)")
    );
    if report.required_variables.is_empty() {
        println!("Required variables: none");
    } else {
        println!("Required variables:");
        for name in &report.required_variables {
            println!("  - {}", name);
        }
    }
}
