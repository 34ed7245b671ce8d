//! Column layout and record types for the gemstone dataset.

use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Header the raw dataset must carry, in this exact order.
pub const RAW_COLUMNS: [&str; 11] = [
    "id", "carat", "cut", "color", "clarity", "depth", "table", "x", "y", "z", "price",
];

/// Transformed feature names, in output order.
pub const FEATURE_NAMES: [&str; 9] = [
    "carat", "depth", "table", "x", "y", "z", "cut", "color", "clarity",
];

/// Number of columns produced by the preprocessor.
pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// Continuous input attributes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NumericColumn {
    /// Weight in carats.
    Carat,
    /// Depth percentage.
    Depth,
    /// Table width percentage.
    Table,
    /// Length in mm.
    X,
    /// Width in mm.
    Y,
    /// Height in mm.
    Z,
}

impl NumericColumn {
    /// Numeric columns in output order.
    pub const ALL: [Self; 6] = [Self::Carat, Self::Depth, Self::Table, Self::X, Self::Y, Self::Z];

    /// Column name as it appears in CSV headers and forms.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Carat => "carat",
            Self::Depth => "depth",
            Self::Table => "table",
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }
}

/// Graded input attributes with a fixed ordered vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CategoricalColumn {
    /// Cut quality.
    Cut,
    /// Color grade.
    Color,
    /// Clarity grade.
    Clarity,
}

impl CategoricalColumn {
    /// Categorical columns in output order.
    pub const ALL: [Self; 3] = [Self::Cut, Self::Color, Self::Clarity];

    /// Column name as it appears in CSV headers and forms.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cut => "cut",
            Self::Color => "color",
            Self::Clarity => "clarity",
        }
    }

    /// Ordered vocabulary, lowest grade first.
    #[must_use]
    pub const fn vocabulary(self) -> &'static [&'static str] {
        match self {
            Self::Cut => &["Fair", "Good", "Very Good", "Premium", "Ideal"],
            Self::Color => &["D", "E", "F", "G", "H", "I", "J"],
            Self::Clarity => &["I1", "SI2", "SI1", "VS2", "VS1", "VVS2", "VVS1", "IF"],
        }
    }

    /// Rank of `value` in the vocabulary.
    #[must_use]
    pub fn rank(self, value: &str) -> Option<usize> {
        self.vocabulary().iter().position(|known| *known == value)
    }
}

/// The nine model inputs. Any of them may be missing inside a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GemFeatures {
    /// Weight in carats.
    pub carat: Option<f64>,
    /// Depth percentage.
    pub depth: Option<f64>,
    /// Table width percentage.
    pub table: Option<f64>,
    /// Length in mm.
    pub x: Option<f64>,
    /// Width in mm.
    pub y: Option<f64>,
    /// Height in mm.
    pub z: Option<f64>,
    /// Cut grade.
    pub cut: Option<String>,
    /// Color grade.
    pub color: Option<String>,
    /// Clarity grade.
    pub clarity: Option<String>,
}

impl GemFeatures {
    /// Value of a numeric column.
    #[must_use]
    pub const fn numeric(&self, column: NumericColumn) -> Option<f64> {
        match column {
            NumericColumn::Carat => self.carat,
            NumericColumn::Depth => self.depth,
            NumericColumn::Table => self.table,
            NumericColumn::X => self.x,
            NumericColumn::Y => self.y,
            NumericColumn::Z => self.z,
        }
    }

    /// Value of a categorical column.
    #[must_use]
    pub fn categorical(&self, column: CategoricalColumn) -> Option<&str> {
        match column {
            CategoricalColumn::Cut => self.cut.as_deref(),
            CategoricalColumn::Color => self.color.as_deref(),
            CategoricalColumn::Clarity => self.clarity.as_deref(),
        }
    }
}

/// One row of the raw dataset, matching [`RAW_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemRecord {
    /// Row identifier; never used as a feature.
    pub id: u64,
    /// Weight in carats.
    pub carat: Option<f64>,
    /// Cut grade.
    pub cut: Option<String>,
    /// Color grade.
    pub color: Option<String>,
    /// Clarity grade.
    pub clarity: Option<String>,
    /// Depth percentage.
    pub depth: Option<f64>,
    /// Table width percentage.
    pub table: Option<f64>,
    /// Length in mm.
    pub x: Option<f64>,
    /// Width in mm.
    pub y: Option<f64>,
    /// Height in mm.
    pub z: Option<f64>,
    /// Target price.
    pub price: f64,
}

impl GemRecord {
    /// Drops the identifier and target.
    #[must_use]
    pub fn features(&self) -> GemFeatures {
        GemFeatures {
            carat: self.carat,
            depth: self.depth,
            table: self.table,
            x: self.x,
            y: self.y,
            z: self.z,
            cut: self.cut.clone(),
            color: self.color.clone(),
            clarity: self.clarity.clone(),
        }
    }

    /// Generates a deterministic labelled dataset for tests and demos.
    ///
    /// Prices grow with carat and with every grade, plus a little noise.
    #[must_use]
    pub fn synthetic(count: usize, seed: u64) -> Vec<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..count)
            .map(|idx| {
                let carat: f64 = rng.gen_range(0.2..2.5);
                let cut = *CategoricalColumn::Cut.vocabulary().choose(&mut rng).unwrap_or(&"Ideal");
                let color = *CategoricalColumn::Color.vocabulary().choose(&mut rng).unwrap_or(&"G");
                let clarity =
                    *CategoricalColumn::Clarity.vocabulary().choose(&mut rng).unwrap_or(&"SI1");
                let grade_bonus = CategoricalColumn::Cut.rank(cut).unwrap_or(0) as f64 * 150.0
                    + (6 - CategoricalColumn::Color.rank(color).unwrap_or(0)) as f64 * 120.0
                    + CategoricalColumn::Clarity.rank(clarity).unwrap_or(0) as f64 * 180.0;
                let diameter = 6.4 * carat.cbrt();
                let price = 3_800.0f64.mul_add(carat, grade_bonus) + rng.gen_range(-150.0..150.0);
                Self {
                    id: idx as u64,
                    carat: Some(carat),
                    cut: Some(cut.to_string()),
                    color: Some(color.to_string()),
                    clarity: Some(clarity.to_string()),
                    depth: Some(rng.gen_range(58.0..64.0)),
                    table: Some(rng.gen_range(54.0..62.0)),
                    x: Some(diameter + rng.gen_range(-0.05..0.05)),
                    y: Some(diameter + rng.gen_range(-0.05..0.05)),
                    z: Some(0.62 * diameter),
                    price: price.max(300.0),
                }
            })
            .collect()
    }
}

/// A complete serving record: all nine attributes are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomData {
    /// Weight in carats.
    pub carat: f64,
    /// Depth percentage.
    pub depth: f64,
    /// Table width percentage.
    pub table: f64,
    /// Length in mm.
    pub x: f64,
    /// Width in mm.
    pub y: f64,
    /// Height in mm.
    pub z: f64,
    /// Cut grade.
    pub cut: String,
    /// Color grade.
    pub color: String,
    /// Clarity grade.
    pub clarity: String,
}

impl CustomData {
    /// Builds a record from raw text fields, as submitted by a form.
    ///
    /// `lookup` returns the submitted text for a column name. Blank fields
    /// count as missing.
    pub fn from_fields<'a, F>(mut lookup: F) -> Result<Self, ValidationError>
    where
        F: FnMut(&str) -> Option<&'a str>,
    {
        let mut text = |name: &'static str| -> Result<&'a str, ValidationError> {
            lookup(name)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or(ValidationError::MissingAttribute(name))
        };
        let mut number = |column: NumericColumn| -> Result<f64, ValidationError> {
            let raw = text(column.name())?;
            raw.parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| ValidationError::InvalidNumber {
                    field: column.name(),
                    value: raw.to_string(),
                })
        };
        let carat = number(NumericColumn::Carat)?;
        let depth = number(NumericColumn::Depth)?;
        let table = number(NumericColumn::Table)?;
        let x = number(NumericColumn::X)?;
        let y = number(NumericColumn::Y)?;
        let z = number(NumericColumn::Z)?;
        Ok(Self {
            carat,
            depth,
            table,
            x,
            y,
            z,
            cut: text(CategoricalColumn::Cut.name())?.to_string(),
            color: text(CategoricalColumn::Color.name())?.to_string(),
            clarity: text(CategoricalColumn::Clarity.name())?.to_string(),
        })
    }

    /// Rejects non-finite measurements and blank grades. Fields filled in
    /// directly, rather than through [`Self::from_fields`], skip parsing and
    /// must pass this before prediction.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let numbers = [
            (NumericColumn::Carat, self.carat),
            (NumericColumn::Depth, self.depth),
            (NumericColumn::Table, self.table),
            (NumericColumn::X, self.x),
            (NumericColumn::Y, self.y),
            (NumericColumn::Z, self.z),
        ];
        if let Some((column, value)) = numbers.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ValidationError::InvalidNumber {
                field: column.name(),
                value: value.to_string(),
            });
        }
        let grades = [
            (CategoricalColumn::Cut, &self.cut),
            (CategoricalColumn::Color, &self.color),
            (CategoricalColumn::Clarity, &self.clarity),
        ];
        match grades.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((column, _)) => Err(ValidationError::MissingAttribute(column.name())),
            None => Ok(()),
        }
    }

    /// Converts into a feature row with every value present.
    #[must_use]
    pub fn to_features(&self) -> GemFeatures {
        GemFeatures {
            carat: Some(self.carat),
            depth: Some(self.depth),
            table: Some(self.table),
            x: Some(self.x),
            y: Some(self.y),
            z: Some(self.z),
            cut: Some(self.cut.clone()),
            color: Some(self.color.clone()),
            clarity: Some(self.clarity.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn vocabularies_are_ordered_lowest_first() {
        assert_eq!(CategoricalColumn::Cut.rank("Fair"), Some(0));
        assert_eq!(CategoricalColumn::Cut.rank("Ideal"), Some(4));
        assert_eq!(CategoricalColumn::Clarity.rank("IF"), Some(7));
        assert_eq!(CategoricalColumn::Color.rank("Z"), None);
    }

    #[test]
    fn feature_names_follow_column_groups() {
        let names: Vec<&str> = NumericColumn::ALL
            .iter()
            .map(|c| c.name())
            .chain(CategoricalColumn::ALL.iter().map(|c| c.name()))
            .collect();
        assert_eq!(names, FEATURE_NAMES);
    }

    #[test]
    fn synthetic_is_deterministic() {
        let first = GemRecord::synthetic(20, 7);
        let second = GemRecord::synthetic(20, 7);
        assert_eq!(first, second);
        assert!(first.iter().all(|r| r.price > 0.0));
    }

    #[test]
    fn custom_data_requires_every_field() {
        let mut fields: HashMap<&str, &str> = [
            ("carat", "0.3"),
            ("depth", "62.1"),
            ("table", "58.0"),
            ("x", "4.3"),
            ("y", "4.2"),
            ("z", "2.6"),
            ("cut", "Ideal"),
            ("color", "E"),
            ("clarity", "VS1"),
        ]
        .into_iter()
        .collect();
        let data = CustomData::from_fields(|name| fields.get(name).copied()).unwrap();
        assert_eq!(data.cut, "Ideal");
        assert!((data.carat - 0.3).abs() < f64::EPSILON);

        fields.insert("table", "  ");
        let err = CustomData::from_fields(|name| fields.get(name).copied()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingAttribute("table")));

        fields.insert("table", "wide");
        let err = CustomData::from_fields(|name| fields.get(name).copied()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidNumber { field: "table", .. }));

        fields.insert("table", "NaN");
        let err = CustomData::from_fields(|name| fields.get(name).copied()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidNumber { field: "table", .. }));
    }

    #[test]
    fn validate_rejects_non_finite_and_blank_fields() {
        let data = CustomData {
            carat: 0.3,
            depth: 62.1,
            table: 58.0,
            x: 4.3,
            y: 4.2,
            z: 2.6,
            cut: "Ideal".into(),
            color: "E".into(),
            clarity: "VS1".into(),
        };
        assert_eq!(data.validate(), Ok(()));

        let nan = CustomData {
            depth: f64::NAN,
            ..data.clone()
        };
        assert!(matches!(
            nan.validate(),
            Err(ValidationError::InvalidNumber { field: "depth", .. })
        ));

        let infinite = CustomData {
            z: f64::INFINITY,
            ..data.clone()
        };
        assert!(matches!(
            infinite.validate(),
            Err(ValidationError::InvalidNumber { field: "z", .. })
        ));

        let blank = CustomData {
            color: " ".into(),
            ..data
        };
        assert_eq!(blank.validate(), Err(ValidationError::MissingAttribute("color")));
    }
}
