use polars::prelude::{DataFrame, DataType};

use crate::error::{Result, RiskError};
use crate::score::in_age_range;

pub const SEX_FIELD: &str = "sexo";
pub const MALE_MARKER: &str = "H";
pub const FEMALE_MARKER: &str = "M";

/// Numeric columns every input table must carry, already lower-cased.
pub const NUMERIC_FIELDS: [&str; 7] = [
    "age", "coltot", "hdl", "presis", "presdi", "diabetes", "smoker",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Anything other than the literal male marker is scored as female,
    /// including nulls and typos.
    pub fn from_marker(marker: Option<&str>) -> Sex {
        match marker {
            Some(MALE_MARKER) => Sex::Male,
            _ => Sex::Female,
        }
    }

    pub fn is_known_marker(marker: Option<&str>) -> bool {
        matches!(marker, Some(MALE_MARKER) | Some(FEMALE_MARKER))
    }
}

/// The clinical fields the risk formulas read from one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatientRecord {
    pub age: f64,
    pub sex: Sex,
    pub coltot: f64,
    pub hdl: f64,
    pub presis: f64,
    pub presdi: f64,
    pub diabetes: f64,
    pub smoker: f64,
}

impl PatientRecord {
    pub fn required_columns() -> Vec<&'static str> {
        let mut columns = NUMERIC_FIELDS.to_vec();
        columns.insert(1, SEX_FIELD);
        columns
    }

    pub fn check_columns(df: &DataFrame) -> Result<()> {
        let present = df.get_column_names();
        for column in Self::required_columns() {
            if !present.contains(&column) {
                return Err(RiskError::MissingColumn {
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// What could be read from one row, before scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowRecord {
    Complete(PatientRecord),
    /// Age present but outside the model range; the other fields are not read.
    AgeOutOfRange,
    /// Name of the first missing or non-numeric field.
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub label: String,
    pub record: RowRecord,
    pub unknown_sex: bool,
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    // non-strict cast: unparseable text becomes null
    let series = df.column(name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::Utf8)?;
    let values = series
        .utf8()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

/* Read the scoring fields of every row in `df`, in row order. Row level problems are
kept on the row, only structural problems with the frame are returned as errors. */
pub fn extract_rows(df: &DataFrame, index: &str) -> Result<Vec<RawRow>> {
    PatientRecord::check_columns(df)?;

    let labels = text_column(df, index)?;
    let sexes = text_column(df, SEX_FIELD)?;
    let numeric = NUMERIC_FIELDS
        .iter()
        .map(|name| numeric_column(df, name))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let label = labels[i].clone().unwrap_or_else(|| "<null>".to_string());
        let marker = sexes[i].as_deref();

        rows.push(RawRow {
            label,
            record: read_record(&numeric, i, marker),
            unknown_sex: !Sex::is_known_marker(marker),
        });
    }

    Ok(rows)
}

fn read_record(numeric: &[Vec<Option<f64>>], i: usize, marker: Option<&str>) -> RowRecord {
    let value = |slot: usize| numeric[slot][i].filter(|v| !v.is_nan());

    // the age gate comes before any other field is looked at
    match value(0) {
        Some(age) if !in_age_range(age) => return RowRecord::AgeOutOfRange,
        Some(_) => {}
        None => return RowRecord::Missing(NUMERIC_FIELDS[0]),
    }

    let mut fields = [0.0_f64; NUMERIC_FIELDS.len()];
    for (slot, name) in NUMERIC_FIELDS.iter().enumerate() {
        match value(slot) {
            Some(v) => fields[slot] = v,
            None => return RowRecord::Missing(*name),
        }
    }

    let [age, coltot, hdl, presis, presdi, diabetes, smoker] = fields;
    RowRecord::Complete(PatientRecord {
        age,
        sex: Sex::from_marker(marker),
        coltot,
        hdl,
        presis,
        presdi,
        diabetes,
        smoker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn frame() -> DataFrame {
        df!(
            "id" => &["p1", "p2", "p3"],
            "age" => &[50i64, 61, 44],
            "sexo" => &[Some("H"), Some("M"), None],
            "coltot" => &[220i64, 180, 300],
            "hdl" => &[55i64, 40, 62],
            "presis" => &[Some("125"), Some("abc"), Some("150")],
            "presdi" => &[78i64, 85, 92],
            "diabetes" => &[0i64, 1, 0],
            "smoker" => &[1i64, 0, 0]
        )
        .unwrap()
    }

    #[test]
    fn sex_marker_defaults_to_female() {
        assert_eq!(Sex::from_marker(Some("H")), Sex::Male);
        assert_eq!(Sex::from_marker(Some("M")), Sex::Female);
        assert_eq!(Sex::from_marker(Some("h")), Sex::Female);
        assert_eq!(Sex::from_marker(None), Sex::Female);
        assert!(!Sex::is_known_marker(Some("x")));
    }

    #[test]
    fn extracts_rows_and_flags_bad_fields() {
        let rows = extract_rows(&frame(), "id").unwrap();
        assert_eq!(rows.len(), 3);

        let RowRecord::Complete(first) = rows[0].record else {
            panic!("unexpected {:?}", rows[0].record);
        };
        assert_eq!(first.sex, Sex::Male);
        assert_eq!(first.presis, 125.0);
        assert_eq!(first.coltot, 220.0);

        assert_eq!(rows[1].label, "p2");
        assert_eq!(rows[1].record, RowRecord::Missing("presis"));

        assert!(rows[2].unknown_sex);
        let RowRecord::Complete(third) = rows[2].record else {
            panic!("unexpected {:?}", rows[2].record);
        };
        assert_eq!(third.sex, Sex::Female);
    }

    #[test]
    fn out_of_range_age_wins_over_missing_fields() {
        let df = df!(
            "id" => &["old", "young", "unknown"],
            "age" => &[Some(80i64), Some(25), None],
            "sexo" => &["H", "M", "M"],
            "coltot" => &[Some(220i64), None, Some(200)],
            "hdl" => &[None, Some(40i64), Some(50)],
            "presis" => &[125i64, 118, 130],
            "presdi" => &[78i64, 76, 80],
            "diabetes" => &[0i64, 0, 0],
            "smoker" => &[1i64, 0, 0]
        )
        .unwrap();

        let rows = extract_rows(&df, "id").unwrap();
        assert_eq!(rows[0].record, RowRecord::AgeOutOfRange);
        assert_eq!(rows[1].record, RowRecord::AgeOutOfRange);
        assert_eq!(rows[2].record, RowRecord::Missing("age"));
    }

    #[test]
    fn missing_column_is_reported() {
        let df = frame().drop("hdl").unwrap();
        match extract_rows(&df, "id") {
            Err(RiskError::MissingColumn { column }) => assert_eq!(column, "hdl"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
