use crate::{error::TransformError, schema::CategoricalColumn};

/// Maps a grade to its rank in the column's ordered vocabulary.
pub fn encode(column: CategoricalColumn, value: &str) -> Result<f64, TransformError> {
    column
        .rank(value)
        .map(|rank| rank as f64)
        .ok_or_else(|| TransformError::UnknownCategory {
            column: column.name(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_strictly_increase_along_vocabulary() {
        for column in CategoricalColumn::ALL {
            let codes: Vec<f64> = column
                .vocabulary()
                .iter()
                .map(|value| encode(column, value).unwrap())
                .collect();
            assert!(codes.windows(2).all(|pair| pair[0] < pair[1]), "{column:?}");
        }
    }

    #[test]
    fn rejects_unknown_values() {
        assert_eq!(
            encode(CategoricalColumn::Cut, "Unknown"),
            Err(TransformError::UnknownCategory {
                column: "cut",
                value: "Unknown".into()
            })
        );
        // Grades are case sensitive.
        assert!(encode(CategoricalColumn::Clarity, "if").is_err());
    }
}
