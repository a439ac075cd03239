//! Read-only view of the enrichment rules document served by the backend.
//!
//! The rules are applied remotely; this module only turns the JSON into
//! something a person can read next to the preview.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Write;

pub const DEFAULT_REFERENCE_COLUMN: &str = "TIPO DE UNIDAD";
pub const RULES_DOWNLOAD_NAME: &str = "enrichment_rules.json";

const COVERAGE_BY_TYPE: &str = "coberturas_por_tipo";
const ASSIGNMENT: &str = "reglas_asignacion";
const FINAL_STRUCTURE: &str = "estructura_excel_final";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageTerms {
    pub name: String,
    pub limits: String,
    pub deductibles: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitCoverage {
    pub unit_type: String,
    pub coverage_type: Option<String>,
    pub coverages: Vec<CoverageTerms>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulesSummary {
    pub coverage_by_type: Vec<UnitCoverage>,
    pub reference_column: String,
    pub columns_to_add: Vec<String>,
    pub assignment_note: Option<String>,
    pub final_columns: Vec<String>,
    pub final_notes: Vec<String>,
}

impl Default for RulesSummary {
    fn default() -> Self {
        RulesSummary {
            coverage_by_type: Vec::new(),
            reference_column: DEFAULT_REFERENCE_COLUMN.to_string(),
            columns_to_add: Vec::new(),
            assignment_note: None,
            final_columns: Vec::new(),
            final_notes: Vec::new(),
        }
    }
}

/// A section stored at the top level, or nested under the coverage map.
pub fn section<'a>(rules: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    rules.get(key).and_then(Value::as_object).or_else(|| {
        rules
            .get(COVERAGE_BY_TYPE)
            .and_then(|c| c.get(key))
            .and_then(Value::as_object)
    })
}

/// Text of a scalar JSON value; strings are unquoted, null is empty.
fn scalar_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().map(|v| scalar_text(Some(v))).collect())
        .unwrap_or_default()
}

fn unit_coverage(unit_type: &str, template: &Value) -> UnitCoverage {
    let coverages = template
        .get("coberturas")
        .and_then(Value::as_object)
        .map(|covers| {
            covers
                .iter()
                .map(|(name, terms)| CoverageTerms {
                    name: name.clone(),
                    limits: scalar_text(terms.get("LIMITES")),
                    deductibles: scalar_text(terms.get("DEDUCIBLES")),
                })
                .collect()
        })
        .unwrap_or_default();

    UnitCoverage {
        unit_type: unit_type.to_string(),
        coverage_type: template
            .get("tipo_cobertura")
            .map(|v| scalar_text(Some(v))),
        coverages,
    }
}

impl RulesSummary {
    /// Summarize a rules document. Anything that is not shaped as expected
    /// is skipped rather than reported.
    pub fn from_value(rules: &Value) -> Self {
        let mut summary = RulesSummary::default();
        if !rules.is_object() {
            return summary;
        }

        if let Some(by_type) = rules.get(COVERAGE_BY_TYPE).and_then(Value::as_object) {
            summary.coverage_by_type = by_type
                .iter()
                .filter(|(key, value)| key.as_str() != ASSIGNMENT && value.is_object())
                .map(|(key, value)| unit_coverage(key, value))
                .collect();
        }

        if let Some(assign) = section(rules, ASSIGNMENT) {
            if let Some(col) = assign
                .get("mapeo_columnas")
                .and_then(|m| m.get("columna_referencia"))
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
            {
                summary.reference_column = col.to_string();
            }
            summary.columns_to_add = string_list(assign.get("columnas_a_agregar"));
            summary.assignment_note = assign
                .get("descripcion")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
                .map(str::to_string);
        }

        if let Some(structure) = rules.get(FINAL_STRUCTURE) {
            summary.final_columns = string_list(structure.get("columnas_finales"));
            summary.final_notes = string_list(structure.get("notas"));
        }

        summary
    }

    /// Plain-text explanation, one section per rule group.
    pub fn explain(&self) -> String {
        let mut out = String::new();

        out.push_str("1) Coverage templates per unit type\n");
        if self.coverage_by_type.is_empty() {
            out.push_str("   (none)\n");
        }
        for unit in &self.coverage_by_type {
            let _ = writeln!(out, "   {}", unit.unit_type);
            if let Some(kind) = &unit.coverage_type {
                let _ = writeln!(out, "     Coverage type: {}", kind);
            }
            for cover in &unit.coverages {
                let _ = writeln!(
                    out,
                    "     - {}: LIMITES {} / DEDUCIBLES {}",
                    cover.name, cover.limits, cover.deductibles
                );
            }
        }

        out.push_str("\n2) Assignment & new columns\n");
        let _ = writeln!(out, "   Reference column: {}", self.reference_column);
        for col in &self.columns_to_add {
            let _ = writeln!(out, "   + {}", col);
        }
        if let Some(note) = &self.assignment_note {
            let _ = writeln!(out, "   Note: {}", note);
        }

        out.push_str("\n3) Final Excel structure\n");
        for (i, col) in self.final_columns.iter().enumerate() {
            let _ = writeln!(out, "   {:>2}. {}", i + 1, col);
        }
        for note in &self.final_notes {
            let _ = writeln!(out, "   * {}", note);
        }

        out
    }
}

/// Pretty JSON for display or download; non-objects are shown as-is.
pub fn pretty_json(rules: &Value) -> String {
    match rules {
        Value::Object(_) => serde_json::to_string_pretty(rules).unwrap_or_else(|_| "{}".to_string()),
        Value::Null => "{}".to_string(),
        other => scalar_text(Some(other)),
    }
}
