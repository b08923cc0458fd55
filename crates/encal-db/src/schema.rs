//! Row types matching the existing calibration MySQL schema
//!
//! IMPORTANT: these structures must maintain strict parity with the
//! schema already deployed in production. Do not modify field names or
//! types without verifying against the live tables.

use crate::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One stored data point of a graph. NULL error columns decode as `None`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct GraphPointRow {
    pub x_value: f64,
    pub x_error: Option<f64>,
    pub y_value: f64,
    pub y_error: Option<f64>,
}

/// A GMS run number paired with its start time (Unix epoch seconds)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct GmsRunTime {
    pub run_number: i32,
    pub start_time: i64,
}

/// Column layout of an uploaded point set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointShape {
    /// (x_value, x_error, y_value, y_error) from columns [0..4]
    WithErrors,
    /// (x_value, y_value) from columns [0..2]
    Bare,
}

impl PointShape {
    pub fn min_width(self) -> usize {
        match self {
            PointShape::WithErrors => 4,
            PointShape::Bare => 2,
        }
    }
}

/// Check an uploaded point set for a consistent shape.
///
/// The first row decides the shape: 4 or more columns means errors are
/// present, 2 or 3 means bare (x, y) pairs. Every row must then carry at
/// least the shape's width; columns beyond it are ignored at insert time.
/// Empty sets and rows narrower than two columns are rejected.
pub fn validate_points(points: &[Vec<f64>]) -> DbResult<PointShape> {
    let first = points
        .first()
        .ok_or_else(|| DbError::ValidationError("empty point set".to_string()))?;

    let shape = match first.len() {
        w if w >= 4 => PointShape::WithErrors,
        w if w >= 2 => PointShape::Bare,
        w => {
            return Err(DbError::ValidationError(format!(
                "points need at least 2 columns, first row has {}",
                w
            )))
        }
    };

    for (i, row) in points.iter().enumerate() {
        if row.len() < shape.min_width() {
            return Err(DbError::ValidationError(format!(
                "row {} has {} columns, expected at least {}",
                i,
                row.len(),
                shape.min_width()
            )));
        }
    }

    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_column_rows_carry_errors() {
        let points = vec![vec![1.0, 0.1, 10.0, 1.0], vec![2.0, 0.1, 20.0, 1.0]];
        assert_eq!(validate_points(&points).unwrap(), PointShape::WithErrors);
    }

    #[test]
    fn extra_columns_beyond_four_are_accepted() {
        let points = vec![vec![1.0, 0.1, 10.0, 1.0, 99.0]];
        assert_eq!(validate_points(&points).unwrap(), PointShape::WithErrors);
    }

    #[test]
    fn two_column_rows_are_bare() {
        let points = vec![vec![1.0, 10.0], vec![2.0, 20.0]];
        assert_eq!(validate_points(&points).unwrap(), PointShape::Bare);
    }

    #[test]
    fn three_column_rows_fall_back_to_bare() {
        let points = vec![vec![1.0, 10.0, 3.0]];
        assert_eq!(validate_points(&points).unwrap(), PointShape::Bare);
    }

    #[test]
    fn empty_set_is_rejected() {
        assert!(matches!(
            validate_points(&[]),
            Err(DbError::ValidationError(_))
        ));
    }

    #[test]
    fn single_column_rows_are_rejected() {
        let points = vec![vec![1.0]];
        assert!(matches!(
            validate_points(&points),
            Err(DbError::ValidationError(_))
        ));
    }

    #[test]
    fn mixed_shapes_are_rejected() {
        // First row promises error columns, second row cannot deliver them.
        let points = vec![vec![1.0, 0.1, 10.0, 1.0], vec![2.0, 20.0]];
        assert!(matches!(
            validate_points(&points),
            Err(DbError::ValidationError(_))
        ));
    }
}
