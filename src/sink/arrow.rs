use anyhow::Result;
use arrow::{
    array::{ArrayRef, Date32Array, Float64Array, StringArray},
    datatypes::{DataType, Date32Type, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use std::sync::Arc;

use crate::consolidate::{ColumnValues, ConsolidatedTable};

/// `Date32` value (days since 1970-01-01) of `d`.
pub fn epoch_days(d: NaiveDate) -> i32 {
    Date32Type::from_naive_date(d)
}

/// Text → Utf8, numbers → Float64, dates → Date32; every field nullable.
pub fn arrow_schema(table: &ConsolidatedTable) -> Schema {
    Schema::new(
        table
            .columns
            .iter()
            .map(|c| {
                let ty = match c.values {
                    ColumnValues::Text(_) => DataType::Utf8,
                    ColumnValues::Number(_) => DataType::Float64,
                    ColumnValues::Date(_) => DataType::Date32,
                };
                Field::new(&c.name, ty, true)
            })
            .collect::<Vec<_>>(),
    )
}

pub fn to_record_batch(table: &ConsolidatedTable) -> Result<RecordBatch> {
    let arrays: Vec<ArrayRef> = table
        .columns
        .iter()
        .map(|c| match &c.values {
            ColumnValues::Text(v) => Arc::new(StringArray::from(v.clone())) as ArrayRef,
            ColumnValues::Number(v) => Arc::new(Float64Array::from(v.clone())) as ArrayRef,
            ColumnValues::Date(v) => Arc::new(Date32Array::from(
                v.iter().map(|d| d.map(epoch_days)).collect::<Vec<_>>(),
            )) as ArrayRef,
        })
        .collect();
    RecordBatch::try_new(Arc::new(arrow_schema(table)), arrays).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidate::Column;
    use arrow::array::Array;

    #[test]
    fn epoch_is_day_zero() {
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()), 19_787);
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()), -1);
    }

    #[test]
    fn maps_column_kinds() -> Result<()> {
        let table = ConsolidatedTable::new(vec![
            Column {
                name: "Date".into(),
                values: ColumnValues::Date(vec![NaiveDate::from_ymd_opt(2024, 3, 5), None]),
            },
            Column {
                name: "Total".into(),
                values: ColumnValues::Number(vec![Some(1234.56), None]),
            },
            Column {
                name: "Product".into(),
                values: ColumnValues::Text(vec![Some("Caneta".into()), None]),
            },
        ]);
        let batch = to_record_batch(&table)?;
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Date32);
        assert_eq!(batch.schema().field(1).data_type(), &DataType::Float64);
        assert_eq!(batch.schema().field(2).data_type(), &DataType::Utf8);
        assert_eq!(batch.column(1).null_count(), 1);
        let dates = batch
            .column(0)
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert_eq!(dates.value(0), 19_787);
        Ok(())
    }
}
