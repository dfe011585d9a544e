//! The trainable point-model boundary.
//!
//! Everything downstream of this module (conformal calibration, quantile
//! ensembles, evaluation) depends only on the two-method [`PointModel`]
//! contract: `fit` on a feature view and targets, `predict` one value per
//! row. Any external regression library can be wrapped behind it; the
//! concrete models here are deliberately small.
//!
//! A model instance is fit at most once. Refitting is a new instance, which
//! keeps cold models safely reusable across parallel calibration runs.
use crate::data::DatasetView;
use crate::errors::ConformaError;
use crate::objective::Objective;

/// A trainable regressor mapping a feature matrix to one prediction per row.
pub trait PointModel: Send + Sync {
    /// Fit the model. Returns [`ConformaError::AlreadyFitted`] on a second call.
    ///
    /// * `x` - Training features.
    /// * `y` - Training targets, one per row of `x`.
    fn fit(&mut self, x: &DatasetView, y: &[f64]) -> Result<(), ConformaError>;

    /// Predict one value per row of `x`.
    /// Returns [`ConformaError::NotFitted`] before `fit` has succeeded.
    fn predict(&self, x: &DatasetView) -> Result<Vec<f64>, ConformaError>;
}

/// Builds a fresh, cold model for a given objective.
///
/// This is how per-quantile regressors are constructed: the quantile level is
/// a construction-time parameter carried by the objective. Implemented for
/// any `Fn(Objective) -> Box<dyn PointModel>` closure.
pub trait ModelFactory: Send + Sync {
    fn build(&self, objective: Objective) -> Box<dyn PointModel>;
}

impl<F> ModelFactory for F
where
    F: Fn(Objective) -> Box<dyn PointModel> + Send + Sync,
{
    fn build(&self, objective: Objective) -> Box<dyn PointModel> {
        (self)(objective)
    }
}

struct LinearCoef {
    weights: Vec<f64>,
    intercept: f64,
    col_means: Vec<f64>,
    col_scales: Vec<f64>,
}

/// A linear-in-features model fit by batch gradient descent on a pluggable
/// objective.
///
/// With [`Objective::SquaredLoss`] and an `l2` penalty this is ridge
/// regression; with [`Objective::QuantileLoss`] it is a linear quantile
/// regressor. Features are standardized per column before fitting, so the
/// learning rate is scale free.
pub struct LinearModel {
    objective: Objective,
    l2: f64,
    learning_rate: f64,
    iterations: usize,
    tolerance: f64,
    coef: Option<LinearCoef>,
}

impl Default for LinearModel {
    fn default() -> Self {
        LinearModel {
            objective: Objective::SquaredLoss,
            l2: 0.0,
            learning_rate: 0.1,
            iterations: 500,
            tolerance: 1e-8,
            coef: None,
        }
    }
}

impl LinearModel {
    /// Set the objective to minimize.
    pub fn set_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Set the L2 penalty on the (standardized) weights.
    pub fn set_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    /// Set the gradient-descent step size.
    pub fn set_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the maximum number of gradient-descent iterations.
    pub fn set_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the mean-absolute-gradient threshold for early stopping.
    pub fn set_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn raw_predict(&self, coef: &LinearCoef, x: &DatasetView) -> Vec<f64> {
        let n = x.rows();
        let mut yhat = vec![coef.intercept; n];
        for j in 0..x.cols() {
            let col = x.get_col(j);
            let w = coef.weights[j];
            let m = coef.col_means[j];
            let s = coef.col_scales[j];
            for (pred, v) in yhat.iter_mut().zip(col) {
                *pred += w * ((v - m) / s);
            }
        }
        yhat
    }
}

impl PointModel for LinearModel {
    fn fit(&mut self, x: &DatasetView, y: &[f64]) -> Result<(), ConformaError> {
        if self.coef.is_some() {
            return Err(ConformaError::AlreadyFitted("LinearModel"));
        }
        self.objective.validate()?;
        let n = x.rows();
        let p = x.cols();
        if y.len() != n || n == 0 {
            return Err(ConformaError::InvalidParameter(
                "y".to_string(),
                format!("{} target values", n.max(1)),
                format!("{}", y.len()),
            ));
        }

        let mut col_means = vec![0.0; p];
        let mut col_scales = vec![1.0; p];
        for j in 0..p {
            let col = x.get_col(j);
            let mean = col.iter().sum::<f64>() / n as f64;
            let var = col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
            col_means[j] = mean;
            if var > 0.0 {
                col_scales[j] = var.sqrt();
            }
        }

        let objective = self.objective.function();
        let mut weights = vec![0.0; p];
        let mut intercept = objective.initial_value(y);
        let mut yhat = vec![intercept; n];

        for _ in 0..self.iterations {
            let grad = objective.gradient(y, &yhat);
            let g_intercept = grad.iter().sum::<f64>() / n as f64;
            let mut g_max = g_intercept.abs();

            let mut g_weights = vec![0.0; p];
            for j in 0..p {
                let col = x.get_col(j);
                let m = col_means[j];
                let s = col_scales[j];
                let mut g = 0.0;
                for (gi, v) in grad.iter().zip(col) {
                    g += gi * ((v - m) / s);
                }
                g = g / n as f64 + self.l2 * weights[j];
                g_max = g_max.max(g.abs());
                g_weights[j] = g;
            }

            intercept -= self.learning_rate * g_intercept;
            for (w, g) in weights.iter_mut().zip(&g_weights) {
                *w -= self.learning_rate * g;
            }

            if g_max < self.tolerance {
                break;
            }

            // Recompute predictions with the updated coefficients.
            yhat.iter_mut().for_each(|v| *v = intercept);
            for j in 0..p {
                let col = x.get_col(j);
                let w = weights[j];
                let m = col_means[j];
                let s = col_scales[j];
                for (pred, v) in yhat.iter_mut().zip(col) {
                    *pred += w * ((v - m) / s);
                }
            }
        }

        self.coef = Some(LinearCoef {
            weights,
            intercept,
            col_means,
            col_scales,
        });
        Ok(())
    }

    fn predict(&self, x: &DatasetView) -> Result<Vec<f64>, ConformaError> {
        match &self.coef {
            Some(coef) => Ok(self.raw_predict(coef, x)),
            None => Err(ConformaError::NotFitted("LinearModel")),
        }
    }
}

/// A baseline that forwards one feature column as its prediction.
///
/// Pointed at a lagged-target column this reproduces the classic persistence
/// (`y_hat_t = y_{t-H}`) and seasonal-naive (`y_hat_t = y_{t-168}`) baselines
/// without the model knowing anything about time.
pub struct ColumnBaseline {
    column: usize,
    fitted: bool,
}

impl ColumnBaseline {
    /// * `column` - Index of the feature column to forward.
    pub fn new(column: usize) -> Self {
        ColumnBaseline { column, fitted: false }
    }
}

impl PointModel for ColumnBaseline {
    fn fit(&mut self, x: &DatasetView, _y: &[f64]) -> Result<(), ConformaError> {
        if self.fitted {
            return Err(ConformaError::AlreadyFitted("ColumnBaseline"));
        }
        if self.column >= x.cols() {
            return Err(ConformaError::InvalidParameter(
                "column".to_string(),
                format!("a feature column index < {}", x.cols()),
                format!("{}", self.column),
            ));
        }
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &DatasetView) -> Result<Vec<f64>, ConformaError> {
        if !self.fitted {
            return Err(ConformaError::NotFitted("ColumnBaseline"));
        }
        Ok(x.get_col(self.column).to_vec())
    }
}
