use crate::column::{Column, ColumnKind};
use crate::error::{FrameError, FrameResult};
use claimguard_core::Matrix;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Options controlling CSV ingestion.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Cell text treated as a missing value (in addition to empty cells).
    pub missing_marker: String,
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            missing_marker: "?".to_string(),
            delimiter: b',',
        }
    }
}

/// An ordered set of equally long, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    pub fn new(columns: Vec<Column>) -> FrameResult<Self> {
        let mut seen = HashSet::new();
        let expected = columns.first().map_or(0, Column::len);
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(FrameError::DuplicateColumn(col.name.clone()));
            }
            if col.len() != expected {
                return Err(FrameError::LengthMismatch {
                    column: col.name.clone(),
                    expected,
                    found: col.len(),
                });
            }
        }
        Ok(Frame { columns })
    }

    /// Read a CSV file with a header row.
    pub fn read_csv(path: impl AsRef<Path>, options: &CsvOptions) -> FrameResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let frame = Self::from_reader(file, options)?;
        debug!(
            path = %path.as_ref().display(),
            rows = frame.n_rows(),
            cols = frame.n_cols(),
            "loaded csv"
        );
        Ok(frame)
    }

    /// Read CSV text from any reader. Empty cells and the missing marker become missing.
    pub fn from_reader<R: Read>(reader: R, options: &CsvOptions) -> FrameResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(options.delimiter)
            .from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

        for result in rdr.records() {
            let record = result?;
            if record.len() != headers.len() {
                return Err(FrameError::Ragged {
                    line: record.position().map_or(0, |p| p.line()),
                    expected: headers.len(),
                    found: record.len(),
                });
            }
            for (j, field) in record.iter().enumerate() {
                let missing = field.is_empty() || field.trim() == options.missing_marker;
                cells[j].push(if missing { None } else { Some(field.to_string()) });
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| Column::infer(name, raw))
            .collect();
        Frame::new(columns)
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> FrameResult<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))
    }

    fn column_mut(&mut self, name: &str) -> FrameResult<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))
    }

    pub fn kinds(&self) -> Vec<(String, ColumnKind)> {
        self.columns.iter().map(|c| (c.name.clone(), c.kind())).collect()
    }

    /// Missing-value count per column, in column order.
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.missing_count()))
            .collect()
    }

    /// Distinct present values per column, in column order.
    pub fn n_unique(&self) -> Vec<(String, usize)> {
        self.columns.iter().map(|c| (c.name.clone(), c.n_unique())).collect()
    }

    /// Distinct values of a categorical column in order of first appearance.
    pub fn unique_values(&self, name: &str) -> FrameResult<Vec<String>> {
        let values = self
            .column(name)?
            .as_categorical()
            .ok_or_else(|| FrameError::NotCategorical(name.to_string()))?;
        let mut seen = HashSet::new();
        Ok(values
            .iter()
            .flatten()
            .filter(|v| seen.insert(v.as_str()))
            .cloned()
            .collect())
    }

    /// Impute a column's missing values with its mode. Returns the fill value.
    pub fn fill_mode(&mut self, name: &str) -> FrameResult<String> {
        let col = self.column_mut(name)?;
        col.fill_mode()
            .ok_or_else(|| FrameError::EmptyColumn(name.to_string()))
    }

    pub fn fill_mode_all<S: AsRef<str>>(&mut self, names: &[S]) -> FrameResult<Vec<(String, String)>> {
        names
            .iter()
            .map(|n| {
                let fill = self.fill_mode(n.as_ref())?;
                Ok((n.as_ref().to_string(), fill))
            })
            .collect()
    }

    /// Remove columns by name; every name must exist.
    pub fn drop<S: AsRef<str>>(&mut self, names: &[S]) -> FrameResult<()> {
        for n in names {
            self.column(n.as_ref())?;
        }
        let remove: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        self.columns.retain(|c| !remove.contains(c.name.as_str()));
        Ok(())
    }

    /// Remove and return a column.
    pub fn take(&mut self, name: &str) -> FrameResult<Column> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))?;
        Ok(self.columns.remove(idx))
    }

    /// Sub-frame holding only columns of the given kinds, in column order.
    pub fn select_kinds(&self, kinds: &[ColumnKind]) -> Frame {
        Frame {
            columns: self
                .columns
                .iter()
                .filter(|c| kinds.contains(&c.kind()))
                .cloned()
                .collect(),
        }
    }

    /// Append the columns of `other` (which must have the same row count).
    pub fn concat(mut self, other: Frame) -> FrameResult<Frame> {
        self.columns.extend(other.columns);
        Frame::new(self.columns)
    }

    /// Convert fully imputed numeric columns into a dense matrix.
    pub fn to_matrix(&self) -> FrameResult<Matrix> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let values = col
                .as_numeric()
                .ok_or_else(|| FrameError::NotNumeric(col.name.clone()))?;
            let dense: Option<Vec<f64>> = values.iter().copied().collect();
            let dense = dense.ok_or_else(|| FrameError::MissingValues {
                column: col.name.clone(),
                count: col.missing_count(),
            })?;
            columns.push(dense);
        }
        if columns.is_empty() {
            return Ok(Matrix::zeros(self.n_rows(), 0));
        }
        Ok(Matrix::from_columns(&columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
policy_number,age,collision_type,premium,fraud_reported,_c39
1,30,Rear Collision,100.5,Y,
2,?,?,200.0,N,
3,45,Side Collision,150.25,N,
";

    fn sample() -> Frame {
        Frame::from_reader(SAMPLE.as_bytes(), &CsvOptions::default()).unwrap()
    }

    #[test]
    fn test_read_infers_kinds_and_missing() {
        let f = sample();
        assert_eq!(f.n_rows(), 3);
        assert_eq!(f.n_cols(), 6);
        let kinds: Vec<ColumnKind> = f.kinds().into_iter().map(|(_, k)| k).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Integer,
                ColumnKind::Integer,
                ColumnKind::Categorical,
                ColumnKind::Float,
                ColumnKind::Categorical,
                ColumnKind::Float,
            ]
        );
        let missing = f.missing_counts();
        assert_eq!(missing[1], ("age".to_string(), 1));
        assert_eq!(missing[2], ("collision_type".to_string(), 1));
        assert_eq!(missing[5], ("_c39".to_string(), 3));
    }

    #[test]
    fn test_ragged_record_reports_line() {
        let text = "a,b\n1,2\n3\n";
        match Frame::from_reader(text.as_bytes(), &CsvOptions::default()) {
            Err(FrameError::Ragged { line, expected, found }) => {
                assert_eq!(line, 3);
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("expected ragged error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let f = Frame::read_csv(file.path(), &CsvOptions::default()).unwrap();
        assert_eq!(f, sample());
    }

    #[test]
    fn test_fill_drop_and_matrix() {
        let mut f = sample();
        assert_eq!(f.fill_mode("collision_type").unwrap(), "Rear Collision");
        assert!(f.fill_mode("_c39").is_err());
        assert!(f.drop(&["nope"]).is_err());
        f.drop(&["collision_type", "fraud_reported", "_c39"]).unwrap();
        assert!(matches!(f.to_matrix(), Err(FrameError::MissingValues { .. })));
        f.fill_mode("age").unwrap();
        let m = f.to_matrix().unwrap();
        assert_eq!(m.shape(), (3, 3));
        assert_eq!(m.row(1), &[2.0, 30.0, 200.0]);
    }

    #[test]
    fn test_unique_values_in_appearance_order() {
        let f = sample();
        assert_eq!(f.unique_values("fraud_reported").unwrap(), vec!["Y", "N"]);
        assert!(f.unique_values("age").is_err());
    }

    #[test]
    fn test_select_kinds_keeps_order() {
        let f = sample();
        let ints = f.select_kinds(&[ColumnKind::Integer]);
        assert_eq!(ints.column_names(), vec!["policy_number", "age"]);
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let text = "a,a\n1,2\n";
        assert!(matches!(
            Frame::from_reader(text.as_bytes(), &CsvOptions::default()),
            Err(FrameError::DuplicateColumn(_))
        ));
    }
}
