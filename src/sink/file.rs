use anyhow::{anyhow, Context, Result};
use excelstream::writer::ExcelWriterBuilder;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::{Builder, NamedTempFile};
use tracing::debug;

use super::arrow::{arrow_schema, to_record_batch};
use super::Sink;
use crate::consolidate::{ColumnValues, ConsolidatedTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Parquet,
    Xlsx,
}

const XLSX_SHEET: &str = "Vendas";

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
            FileFormat::Xlsx => "xlsx",
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Ok(FileFormat::Csv),
            Some("parquet") => Ok(FileFormat::Parquet),
            Some("xlsx") => Ok(FileFormat::Xlsx),
            _ => Err(anyhow!(
                "unsupported output file {} (use .csv, .xlsx or .parquet)",
                path.display()
            )),
        }
    }
}

/// Writes the table to a file, replacing whatever was there.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for FileSink {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    /// Data goes to a temp file beside the target and is renamed over it
    /// once complete, so a failed write leaves any previous file intact.
    fn write(&self, table: &ConsolidatedTable) -> Result<usize> {
        let format = FileFormat::from_path(&self.path)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp: NamedTempFile = Builder::new()
            .prefix(".salesetl")
            .suffix(&format!(".{}", format.extension()))
            .tempfile_in(dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;

        match format {
            FileFormat::Csv => write_csv(tmp.as_file_mut(), table)?,
            FileFormat::Parquet => write_parquet(tmp.as_file_mut(), table)?,
            FileFormat::Xlsx => write_xlsx(tmp.path(), table)?,
        }

        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        debug!(path = %self.path.display(), ?format, "file written");
        Ok(table.num_rows())
    }
}

fn write_csv(file: &mut File, table: &ConsolidatedTable) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(file);
    wtr.write_record(table.column_names())?;
    for row in 0..table.num_rows() {
        wtr.write_record(table.columns.iter().map(|c| csv_cell(&c.values, row)))?;
    }
    wtr.flush().context("flushing CSV")?;
    Ok(())
}

/// One worksheet named after the table, header row first, every cell as text
/// in the same rendering as the CSV output.
fn write_xlsx(path: &Path, table: &ConsolidatedTable) -> Result<()> {
    let target = path
        .to_str()
        .ok_or_else(|| anyhow!("non UTF-8 path {}", path.display()))?;
    let mut writer = ExcelWriterBuilder::new(target)
        .with_sheet_name(XLSX_SHEET)
        .build()
        .map_err(|e| anyhow!("opening workbook {}: {}", path.display(), e))?;
    writer
        .write_header(table.column_names())
        .map_err(|e| anyhow!("writing header row: {}", e))?;
    for row in 0..table.num_rows() {
        let cells: Vec<String> = table
            .columns
            .iter()
            .map(|c| csv_cell(&c.values, row))
            .collect();
        writer
            .write_row(&cells)
            .map_err(|e| anyhow!("writing row {}: {}", row, e))?;
    }
    writer
        .save()
        .map_err(|e| anyhow!("saving workbook {}: {}", path.display(), e))?;
    Ok(())
}

fn csv_cell(values: &ColumnValues, row: usize) -> String {
    match values {
        ColumnValues::Text(v) => v[row].clone().unwrap_or_default(),
        ColumnValues::Number(v) => v[row].map(|n| n.to_string()).unwrap_or_default(),
        ColumnValues::Date(v) => v[row]
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    }
}

fn write_parquet(file: &mut File, table: &ConsolidatedTable) -> Result<()> {
    let batch = to_record_batch(table).context("building record batch")?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, Arc::new(arrow_schema(table)), Some(props))
        .context("creating Arrow writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing Parquet writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidate::Column;
    use arrow::array::{Array, Date32Array, Float64Array};
    use chrono::NaiveDate;
    use excelstream::ExcelReader;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs;
    use tempfile::tempdir;

    fn table() -> ConsolidatedTable {
        ConsolidatedTable::new(vec![
            Column {
                name: "Date".into(),
                values: ColumnValues::Date(vec![NaiveDate::from_ymd_opt(2024, 3, 5), None]),
            },
            Column {
                name: "Product".into(),
                values: ColumnValues::Text(vec![Some("Caneta, azul".into()), None]),
            },
            Column {
                name: "Unit Price".into(),
                values: ColumnValues::Number(vec![Some(1234.56), None]),
            },
        ])
    }

    #[test]
    fn csv_overwrites_existing_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vendas_consolidadas.csv");
        fs::write(&path, "stale contents that are longer than the new file\n".repeat(50))?;

        let n = FileSink::new(&path).write(&table())?;
        assert_eq!(n, 2);
        let text = fs::read_to_string(&path)?;
        assert_eq!(
            text,
            "Date,Product,Unit Price\n2024-03-05,\"Caneta, azul\",1234.56\n,,\n"
        );
        Ok(())
    }

    #[test]
    fn parquet_round_trips_types() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.parquet");
        FileSink::new(&path).write(&table())?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let batches: Vec<_> = reader.collect::<Result<_, _>>()?;
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);
        let b = &batches[0];
        let dates = b.column(0).as_any().downcast_ref::<Date32Array>().unwrap();
        assert_eq!(dates.value(0), 19_787);
        assert!(dates.is_null(1));
        let prices = b.column(2).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(prices.value(0), 1234.56);
        Ok(())
    }

    #[test]
    fn unknown_extension_fails_without_touching_target() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vendas.ods");
        fs::write(&path, "keep me")?;
        assert!(FileSink::new(&path).write(&table()).is_err());
        assert_eq!(fs::read_to_string(&path)?, "keep me");
        Ok(())
    }

    #[test]
    fn xlsx_replaces_workbook() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vendas_consolidadas.xlsx");
        fs::write(&path, "not a workbook")?;

        assert_eq!(FileSink::new(&path).write(&table())?, 2);

        let mut reader = ExcelReader::open(&path).unwrap();
        let sheets: Vec<String> = reader.sheet_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(sheets, vec![XLSX_SHEET]);
        let rows: Vec<Vec<String>> = reader
            .rows_by_index(0)
            .unwrap()
            .map(|r| r.unwrap().to_strings())
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["Date", "Product", "Unit Price"]);
        assert_eq!(rows[1], vec!["2024-03-05", "Caneta, azul", "1234.56"]);
        Ok(())
    }

    #[test]
    fn format_follows_extension() {
        for (name, fmt) in [
            ("a.csv", FileFormat::Csv),
            ("a.XLSX", FileFormat::Xlsx),
            ("dir/a.parquet", FileFormat::Parquet),
        ] {
            assert_eq!(FileFormat::from_path(Path::new(name)).unwrap(), fmt);
        }
        assert!(FileFormat::from_path(Path::new("a")).is_err());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let sink = FileSink::new("/no/such/dir/out.csv");
        assert!(sink.write(&table()).is_err());
    }
}
