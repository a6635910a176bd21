//! Damped least-squares (Levenberg–Marquardt) minimizer.
//!
//! Small dense problems only: the normal equations are formed explicitly and
//! solved by Cholesky, which is plenty for the 5–6 parameter Gaussian fits.

use nalgebra::{DMatrix, DVector};

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e8;

/// Convergence tolerances and the iteration cap.
#[derive(Clone, Copy, Debug)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    /// Relative step-size tolerance.
    pub xtol: f64,
    /// Gradient infinity-norm tolerance.
    pub gtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
        }
    }
}

/// Minimizer output; `converged` is false when the iteration cap stopped it.
#[derive(Clone, Debug)]
pub struct LmOutcome {
    pub params: DVector<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimize `‖residuals(x)‖²` starting from `x0`.
///
/// Returns `None` when the normal equations are numerically singular, which
/// the callers treat as a failed fit.
pub fn levenberg_marquardt<F, J>(
    residuals: F,
    jacobian: J,
    x0: DVector<f64>,
    opts: &LmOptions,
) -> Option<LmOutcome>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
    J: Fn(&DVector<f64>) -> DMatrix<f64>,
{
    let mut x = x0;
    let mut r = residuals(&x);
    let mut cost = r.norm_squared();
    let mut lambda = LAMBDA_INIT;

    for iteration in 1..=opts.max_iterations {
        let jac = jacobian(&x);
        let a = jac.transpose() * &jac;
        let g = jac.transpose() * &r;

        if g.amax() < opts.gtol {
            return Some(LmOutcome {
                params: x,
                iterations: iteration,
                converged: true,
            });
        }

        // A vanishing diagonal means a parameter the data does not constrain.
        let dmax = (0..a.nrows()).map(|i| a[(i, i)]).fold(0.0_f64, f64::max);
        let dmin = (0..a.nrows())
            .map(|i| a[(i, i)])
            .fold(f64::INFINITY, f64::min);
        if !dmax.is_finite() || dmin < 1e-12 * dmax {
            return None;
        }

        // Retry with increasing damping until a step lowers the cost.
        loop {
            let mut damped = a.clone();
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda * a[(i, i)];
            }
            let Some(chol) = damped.cholesky() else {
                lambda *= 10.0;
                if lambda >= LAMBDA_MAX {
                    return Some(LmOutcome {
                        params: x,
                        iterations: iteration,
                        converged: false,
                    });
                }
                continue;
            };
            let step = chol.solve(&g);
            let x_new = &x - &step;
            let r_new = residuals(&x_new);
            let cost_new = r_new.norm_squared();

            if cost_new < cost {
                let reduction = cost - cost_new;
                let small_step = step.norm() <= opts.xtol * (x.norm() + opts.xtol);
                x = x_new;
                r = r_new;
                cost = cost_new;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                if reduction <= opts.ftol * cost.max(f64::MIN_POSITIVE) || small_step {
                    return Some(LmOutcome {
                        params: x,
                        iterations: iteration,
                        converged: true,
                    });
                }
                break;
            }

            lambda *= 10.0;
            if lambda >= LAMBDA_MAX {
                return Some(LmOutcome {
                    params: x,
                    iterations: iteration,
                    converged: false,
                });
            }
        }
    }

    Some(LmOutcome {
        params: x,
        iterations: opts.max_iterations,
        converged: false,
    })
}
