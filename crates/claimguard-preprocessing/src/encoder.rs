use claimguard_core::{ClaimError, ClaimResult};
use claimguard_frame::{Column, Frame, FrameResult};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Encode categorical string labels as integer indices.
///
/// Classes are sorted, so `["N", "Y"]` always maps `N -> 0`, `Y -> 1`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
    #[serde(skip)]
    class_to_idx: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn new() -> Self {
        LabelEncoder::default()
    }

    /// Fit the encoder on string labels.
    pub fn fit<S: AsRef<str>>(&mut self, labels: &[S]) {
        let unique: BTreeSet<&str> = labels.iter().map(|l| l.as_ref()).collect();
        self.classes = unique.into_iter().map(str::to_string).collect();
        self.class_to_idx = self
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
    }

    /// Transform string labels to class indices.
    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> ClaimResult<Vec<usize>> {
        labels
            .iter()
            .map(|l| {
                self.class_to_idx.get(l.as_ref()).copied().ok_or_else(|| {
                    ClaimError::InvalidOperation(format!("unknown label `{}`", l.as_ref()))
                })
            })
            .collect()
    }

    pub fn fit_transform<S: AsRef<str>>(&mut self, labels: &[S]) -> ClaimResult<Vec<usize>> {
        self.fit(labels);
        self.transform(labels)
    }

    /// Inverse transform: index → string.
    pub fn inverse_transform(&self, encoded: &[usize]) -> ClaimResult<Vec<String>> {
        encoded
            .iter()
            .map(|&idx| {
                self.classes.get(idx).cloned().ok_or(ClaimError::IndexOutOfBounds {
                    index: idx,
                    axis: 0,
                    size: self.classes.len(),
                })
            })
            .collect()
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

/// One-hot encode every categorical column of `frame`.
///
/// Categories are sorted; with `drop_first` the first one is left out so a
/// k-level column yields k - 1 indicators. Output columns are named
/// `{column}_{category}` and hold integer 0/1. A missing cell encodes as all
/// zeros. Non-categorical columns are not part of the output.
pub fn get_dummies(frame: &Frame, drop_first: bool) -> FrameResult<Frame> {
    let mut out = Vec::new();
    for col in frame.columns() {
        let Some(values) = col.as_categorical() else {
            continue;
        };
        let categories: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
        let skip = usize::from(drop_first);
        for category in categories.into_iter().skip(skip) {
            let indicator = values
                .iter()
                .map(|v| Some(if v.as_deref() == Some(category) { 1.0 } else { 0.0 }))
                .collect();
            out.push(Column::numeric(
                format!("{}_{}", col.name, category),
                indicator,
                true,
            ));
        }
    }
    Frame::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimguard_frame::{ColumnKind, CsvOptions};

    #[test]
    fn test_label_encoder() {
        let mut enc = LabelEncoder::new();
        let labels = ["Y", "N", "N", "Y", "N"];
        let encoded = enc.fit_transform(&labels).unwrap();
        assert_eq!(enc.classes, vec!["N", "Y"]);
        assert_eq!(encoded, vec![1, 0, 0, 1, 0]);
        assert_eq!(enc.inverse_transform(&encoded).unwrap(), labels);
        assert!(enc.transform(&["maybe"]).is_err());
        assert!(enc.inverse_transform(&[2]).is_err());
    }

    #[test]
    fn test_get_dummies_drop_first() {
        let text = "\
sex,severity,age
MALE,Minor Damage,30
FEMALE,Total Loss,40
MALE,Major Damage,?
FEMALE,?,50
";
        let frame = Frame::from_reader(text.as_bytes(), &CsvOptions::default()).unwrap();
        let dummies = get_dummies(&frame, true).unwrap();
        assert_eq!(
            dummies.column_names(),
            vec!["sex_MALE", "severity_Minor Damage", "severity_Total Loss"]
        );
        assert!(dummies.kinds().iter().all(|(_, k)| *k == ColumnKind::Integer));
        let m = dummies.to_matrix().unwrap();
        assert_eq!(m.row(0), &[1.0, 1.0, 0.0]);
        assert_eq!(m.row(2), &[1.0, 0.0, 0.0]);
        assert_eq!(m.row(3), &[0.0, 0.0, 0.0]);

        let full = get_dummies(&frame, false).unwrap();
        assert_eq!(full.n_cols(), 5);
    }
}
