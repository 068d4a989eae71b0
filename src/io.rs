use std::fs::File;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, error};
use polars::prelude::*;
use polars_io::parquet::ParquetWriter;

use crate::error::{Result, RiskError};

static NA_VALUE: &str = "NA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Parquet,
    Xlsx,
}

impl TableFormat {
    pub fn infer<P: AsRef<Path>>(path: P) -> Result<TableFormat> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") | Some("txt") => Ok(TableFormat::Csv),
            Some("tsv") => Ok(TableFormat::Tsv),
            Some("parquet") => Ok(TableFormat::Parquet),
            Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => Ok(TableFormat::Xlsx),
            _ => Err(RiskError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    fn delimiter(&self) -> u8 {
        match self {
            TableFormat::Tsv => b'\t',
            _ => b',',
        }
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| RiskError::io(path, e))
}

/// Column names are matched case-insensitively, so they are lower-cased on load.
pub fn lowercase_columns(df: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_lowercase())
        .collect();
    df.set_column_names(&names)?;
    Ok(())
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.trim().is_empty() || s == NA_VALUE => None,
        other => Some(other.to_string()),
    }
}

/* Build a frame from spreadsheet rows, the first row being the header. Cells are kept
as text like the delimited readers do, the scorer casts the columns it needs. */
pub fn frame_from_cells(rows: Vec<Vec<Data>>) -> Result<DataFrame> {
    let mut rows = rows.into_iter();
    let header = rows.next().unwrap_or_default();
    let body: Vec<Vec<Data>> = rows.collect();

    let columns = header
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let name = cell_text(name).unwrap_or_else(|| format!("column_{j}"));
            let values: Vec<Option<String>> = body
                .iter()
                .map(|row| row.get(j).and_then(cell_text))
                .collect();
            Series::new(&name, values)
        })
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}

fn read_spreadsheet(path: &Path) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => {
            return Err(RiskError::EmptySheet {
                path: path.to_path_buf(),
            })
        }
    };
    frame_from_cells(range.rows().map(<[Data]>::to_vec).collect())
}

pub async fn read_table<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    /* Load the patient table; the format follows the file extension */
    let path = path.as_ref();
    let format = TableFormat::infer(path)?;

    let mut df = match format {
        // no type inference: row keys and pass-through columns are written back verbatim
        TableFormat::Csv | TableFormat::Tsv => CsvReader::new(open(path)?)
            .has_header(true)
            .with_delimiter(format.delimiter())
            .infer_schema(Some(0))
            .with_null_values(Some(NullValues::AllColumnsSingle(NA_VALUE.to_string())))
            .finish()?,
        TableFormat::Parquet => ParquetReader::new(open(path)?).finish()?,
        TableFormat::Xlsx => read_spreadsheet(path)?,
    };
    lowercase_columns(&mut df)?;

    debug!(
        "Read {} rows x {} columns from {:?}",
        df.height(),
        df.width(),
        path
    );
    Ok(df)
}

pub async fn write_table<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<()> {
    let path = path.as_ref();
    if df.height() == 0 {
        error!("Empty output, {:?} not written", path);
        return Err(RiskError::EmptyResult {
            path: PathBuf::from(path),
        });
    }

    let format = match TableFormat::infer(path) {
        Ok(TableFormat::Xlsx) => {
            return Err(RiskError::UnsupportedFormat {
                path: PathBuf::from(path),
            })
        }
        Ok(format) => format,
        // delimited text is the default export
        Err(_) => TableFormat::Csv,
    };
    let mut file = File::create(path).map_err(|e| RiskError::io(path, e))?;

    match format {
        TableFormat::Parquet => {
            ParquetWriter::new(&mut file).finish(df)?;
        }
        _ => {
            CsvWriter::new(&mut file)
                .has_header(true)
                .with_delimiter(format.delimiter())
                .finish(df)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_format_from_extension() {
        assert_eq!(TableFormat::infer("a/b.CSV").unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::infer("b.tsv").unwrap(), TableFormat::Tsv);
        assert_eq!(
            TableFormat::infer("b.parquet").unwrap(),
            TableFormat::Parquet
        );
        assert_eq!(
            TableFormat::infer("params.xlsx").unwrap(),
            TableFormat::Xlsx
        );
        assert!(matches!(
            TableFormat::infer("params.json"),
            Err(RiskError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn lowercases_column_names() {
        let mut df = df!("ID" => &[1i64], "Age" => &[40i64], "SEXO" => &["H"]).unwrap();
        lowercase_columns(&mut df).unwrap();
        assert_eq!(df.get_column_names(), vec!["id", "age", "sexo"]);
    }

    #[test]
    fn spreadsheet_cells_become_text_columns() {
        let rows = vec![
            vec![
                Data::String("Codigo".to_string()),
                Data::String("AGE".to_string()),
                Data::Empty,
            ],
            vec![
                Data::String("007".to_string()),
                Data::Float(50.0),
                Data::String("x".to_string()),
            ],
            vec![
                Data::String("008".to_string()),
                Data::String("NA".to_string()),
                Data::Empty,
            ],
        ];

        let df = frame_from_cells(rows).unwrap();
        assert_eq!(df.get_column_names(), vec!["Codigo", "AGE", "column_2"]);

        let codes: Vec<Option<&str>> = df.column("Codigo").unwrap().utf8().unwrap().into_iter().collect();
        assert_eq!(codes, vec![Some("007"), Some("008")]);

        let ages: Vec<Option<&str>> = df.column("AGE").unwrap().utf8().unwrap().into_iter().collect();
        assert_eq!(ages, vec![Some("50"), None]);
        assert_eq!(df.column("column_2").unwrap().null_count(), 1);
    }

    #[tokio::test]
    async fn empty_table_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut df = df!("id" => Vec::<i64>::new()).unwrap();

        let result = write_table(&path, &mut df).await;
        assert!(matches!(result, Err(RiskError::EmptyResult { .. })));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn spreadsheet_output_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let mut df = df!("id" => &[1i64]).unwrap();

        let result = write_table(&path, &mut df).await;
        assert!(matches!(result, Err(RiskError::UnsupportedFormat { .. })));
        assert!(!path.exists());
    }
}
