//! Standard scaler: per-column zero mean, unit variance.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    /// Population standard deviation; constant columns use 1.0.
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Result<Self, ModelError> {
        if x.nrows() == 0 {
            return Err(ModelError::InsufficientData(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }
        let n = x.nrows() as f64;
        let mut mean = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());
        for column in x.axis_iter(Axis(1)) {
            let mu = column.sum() / n;
            let var = column.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / n;
            let sd = var.sqrt();
            mean.push(mu);
            scale.push(if sd > f64::EPSILON { sd } else { 1.0 });
        }
        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        self.check_width(x.ncols())?;
        let mut out = x.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (mu, sd) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|v| (v - mu) / sd);
        }
        Ok(out)
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.check_width(row.len())?;
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (mu, sd))| (v - mu) / sd)
            .collect())
    }

    fn check_width(&self, width: usize) -> Result<(), ModelError> {
        if width != self.n_features() {
            return Err(ModelError::Schema(format!(
                "scaler expects {} features, got {width}",
                self.n_features()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let scaled = scaler.transform(&x).unwrap();
        for column in scaled.axis_iter(Axis(1)) {
            let mean = column.sum() / 4.0;
            let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_is_centered_not_divided_by_zero() {
        let x = array![[5.0], [5.0], [5.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        assert_eq!(scaler.transform_row(&[7.0]).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_row_transform_matches_matrix_transform() {
        let x = array![[1.0, 0.0], [3.0, 4.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let scaled = scaler.transform(&x).unwrap();
        let row = scaler.transform_row(&[3.0, 4.0]).unwrap();
        assert_eq!(row, scaled.row(1).to_vec());
    }

    #[test]
    fn test_width_mismatch_is_schema_error() {
        let scaler = StandardScaler::fit(&array![[1.0, 2.0]]).unwrap();
        assert!(matches!(
            scaler.transform_row(&[1.0]),
            Err(ModelError::Schema(_))
        ));
    }
}
