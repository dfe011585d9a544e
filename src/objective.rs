//! Objective functions for the built-in trainable models.
//!
//! A point model minimizes one of these objectives; quantile (pinball) loss is
//! what turns the same model family into a conditional-quantile regressor.
use crate::errors::ConformaError;
use serde::{Deserialize, Serialize};

/// The contract a loss function exposes to a gradient-based fitting routine.
pub trait ObjectiveFunction: Send + Sync {
    /// Per-observation loss.
    fn loss(&self, y: &[f64], yhat: &[f64]) -> Vec<f64>;
    /// Per-observation gradient with respect to the prediction.
    fn gradient(&self, y: &[f64], yhat: &[f64]) -> Vec<f64>;
    /// Constant prediction minimizing the loss, used to seed fitting.
    fn initial_value(&self, y: &[f64]) -> f64;
}

/// Squared error loss, for conditional-mean point forecasts.
#[derive(Default, Debug, Deserialize, Serialize, Clone)]
pub struct SquaredLoss {}

impl ObjectiveFunction for SquaredLoss {
    #[inline]
    fn loss(&self, y: &[f64], yhat: &[f64]) -> Vec<f64> {
        y.iter()
            .zip(yhat)
            .map(|(y_, yhat_)| {
                let s = *y_ - *yhat_;
                s * s * 0.5
            })
            .collect()
    }

    #[inline]
    fn gradient(&self, y: &[f64], yhat: &[f64]) -> Vec<f64> {
        y.iter().zip(yhat).map(|(y_, yhat_)| yhat_ - y_).collect()
    }

    fn initial_value(&self, y: &[f64]) -> f64 {
        y.iter().sum::<f64>() / y.len() as f64
    }
}

/// Pinball loss, for conditional-quantile forecasts.
///
/// Penalizes under- and over-prediction asymmetrically: `q * (y - yhat)` when
/// under-predicting, `(1 - q) * (yhat - y)` when over-predicting.
#[derive(Default, Debug, Deserialize, Serialize, Clone)]
pub struct QuantileLoss {
    pub quantile: f64,
}

impl ObjectiveFunction for QuantileLoss {
    #[inline]
    fn loss(&self, y: &[f64], yhat: &[f64]) -> Vec<f64> {
        y.iter()
            .zip(yhat)
            .map(|(y_, yhat_)| {
                let s = *y_ - *yhat_;
                if s >= 0.0 {
                    self.quantile * s
                } else {
                    (self.quantile - 1.0) * s
                }
            })
            .collect()
    }

    #[inline]
    fn gradient(&self, y: &[f64], yhat: &[f64]) -> Vec<f64> {
        y.iter()
            .zip(yhat)
            .map(|(y_, yhat_)| {
                let delta = yhat_ - *y_;
                if delta >= 0.0 {
                    1.0 - self.quantile
                } else {
                    -self.quantile
                }
            })
            .collect()
    }

    fn initial_value(&self, y: &[f64]) -> f64 {
        let mut indices = (0..y.len()).collect::<Vec<_>>();
        indices.sort_by(|&a, &b| y[a].total_cmp(&y[b]));
        let w_target = y.len() as f64 * self.quantile;
        let mut w_cum = 0.0_f64;
        let mut init_value = f64::NAN;
        for i in indices {
            w_cum += 1.0;
            if w_cum >= w_target {
                init_value = y[i];
                break;
            }
        }
        init_value
    }
}

/// The objective a model is constructed with.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub enum Objective {
    SquaredLoss,
    QuantileLoss { quantile: f64 },
}

impl Default for Objective {
    fn default() -> Self {
        Objective::SquaredLoss
    }
}

impl Objective {
    /// Materialize the loss function behind this objective.
    pub fn function(&self) -> Box<dyn ObjectiveFunction> {
        match self {
            Objective::SquaredLoss => Box::new(SquaredLoss::default()),
            Objective::QuantileLoss { quantile } => Box::new(QuantileLoss { quantile: *quantile }),
        }
    }

    /// Validate construction-time parameters.
    pub fn validate(&self) -> Result<(), ConformaError> {
        match self {
            Objective::SquaredLoss => Ok(()),
            Objective::QuantileLoss { quantile } => {
                if *quantile > 0.0 && *quantile < 1.0 {
                    Ok(())
                } else {
                    Err(ConformaError::InvalidParameter(
                        "quantile".to_string(),
                        "a quantile level in (0, 1)".to_string(),
                        format!("{}", quantile),
                    ))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_loss_values() {
        use crate::utils::precision_round;
        let obj = QuantileLoss { quantile: 0.1 };
        // Over-prediction: (q - 1) * (y - yhat) = -0.9 * -1 = 0.9.
        assert_eq!(precision_round(obj.loss(&[1.0], &[2.0])[0], 10), 0.9);
        // Under-prediction: q * (y - yhat) = 0.1 * 1 = 0.1.
        assert_eq!(precision_round(obj.loss(&[2.0], &[1.0])[0], 10), 0.1);
    }

    #[test]
    fn test_quantile_gradient_sign() {
        let obj = QuantileLoss { quantile: 0.9 };
        let g = obj.gradient(&[1.0, 3.0], &[2.0, 2.0]);
        // Over-predicting pushes down weakly, under-predicting pushes up hard.
        assert!(g[0] > 0.0 && g[1] < 0.0);
        assert!(g[1].abs() > g[0].abs());
    }

    #[test]
    fn test_initial_values() {
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(SquaredLoss::default().initial_value(&y), 3.0);
        assert_eq!(QuantileLoss { quantile: 0.5 }.initial_value(&y), 3.0);
        assert_eq!(QuantileLoss { quantile: 0.9 }.initial_value(&y), 5.0);
    }

    #[test]
    fn test_objective_validation() {
        assert!(Objective::SquaredLoss.validate().is_ok());
        assert!(Objective::QuantileLoss { quantile: 0.5 }.validate().is_ok());
        assert!(Objective::QuantileLoss { quantile: 0.0 }.validate().is_err());
        assert!(Objective::QuantileLoss { quantile: 1.0 }.validate().is_err());
    }
}
