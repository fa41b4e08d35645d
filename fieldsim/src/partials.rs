//! Finite-difference partial derivatives of rendered stamps
//!
//! For a parameter `p` with step `δ` and order `k` the derivative image is
//!
//! ```text
//! ∂I/∂p ≈ Σ_{s=1..k} (c_s / δ) · (I(p + sδ) - I(p - sδ))
//! ```
//!
//! with the standard central-difference coefficients `c_s`. Every target is
//! perturbed independently from the nominal parameters, so each one costs
//! `2k` renders.

use ndarray::Array2;

use crate::config::ConfigError;
use crate::render::{RenderEngine, RenderError, RenderParameters, SourceRenderer};
use crate::stamp::StampBounds;

/// Central-difference coefficients indexed by `order - 1`
const COEFFICIENTS: [&[f64]; 4] = [
    &[1.0 / 2.0],
    &[2.0 / 3.0, -1.0 / 12.0],
    &[3.0 / 4.0, -3.0 / 20.0, 1.0 / 60.0],
    &[4.0 / 5.0, -1.0 / 5.0, 4.0 / 105.0, -1.0 / 280.0],
];

/// Fractional half-light radius step
pub const HLR_STEP_FRACTION: f64 = 0.05;
/// Shear component step
pub const SHEAR_STEP: f64 = 0.03;
/// Center step as a fraction of a pixel
pub const CENTER_STEP_PIXELS: f64 = 1.0 / 3.0;

/// Order of the central-difference stencil, 1 through 4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiniteDifferenceOrder(u8);

impl FiniteDifferenceOrder {
    pub const MAX: u8 = 4;

    pub fn new(order: u8) -> Result<Self, ConfigError> {
        if (1..=Self::MAX).contains(&order) {
            Ok(Self(order))
        } else {
            Err(ConfigError::InvalidPartialsOrder(order))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Coefficients `c_1 .. c_k`
    pub fn coefficients(&self) -> &'static [f64] {
        COEFFICIENTS[self.0 as usize - 1]
    }
}

/// Source parameters that partials are taken with respect to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartialTarget {
    CenterX,
    CenterY,
    HalfLightRadius,
    ShearG1,
    ShearG2,
}

impl PartialTarget {
    /// Targets in the order their planes are stored
    pub const ALL: [PartialTarget; 5] = [
        PartialTarget::CenterX,
        PartialTarget::CenterY,
        PartialTarget::HalfLightRadius,
        PartialTarget::ShearG1,
        PartialTarget::ShearG2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PartialTarget::CenterX => "xc",
            PartialTarget::CenterY => "yc",
            PartialTarget::HalfLightRadius => "hlr",
            PartialTarget::ShearG1 => "g1",
            PartialTarget::ShearG2 => "g2",
        }
    }

    /// Step size for this target at the nominal parameters
    pub fn step(&self, nominal: &RenderParameters, pixel_scale: f64) -> f64 {
        match self {
            PartialTarget::CenterX | PartialTarget::CenterY => CENTER_STEP_PIXELS * pixel_scale,
            PartialTarget::HalfLightRadius => HLR_STEP_FRACTION * nominal.half_light_radius,
            PartialTarget::ShearG1 | PartialTarget::ShearG2 => SHEAR_STEP,
        }
    }

    /// Copy of `nominal` with this target moved by `offset`
    pub fn perturb(&self, nominal: &RenderParameters, offset: f64) -> RenderParameters {
        let mut params = *nominal;
        match self {
            PartialTarget::CenterX => params.xc += offset,
            PartialTarget::CenterY => params.yc += offset,
            PartialTarget::HalfLightRadius => params.half_light_radius += offset,
            PartialTarget::ShearG1 => params.g1 += offset,
            PartialTarget::ShearG2 => params.g2 += offset,
        }
        params
    }
}

/// Central difference of an image-valued function of one offset.
///
/// `eval(x)` returns the image at parameter offset `x` from nominal. It is
/// called at `+sδ` then `-sδ` for `s = 1..=k`, in that order.
pub fn central_difference<F, E>(
    order: FiniteDifferenceOrder,
    delta: f64,
    mut eval: F,
) -> Result<Array2<f64>, E>
where
    F: FnMut(f64) -> Result<Array2<f64>, E>,
{
    let mut derivative: Option<Array2<f64>> = None;

    for (i, &c) in order.coefficients().iter().enumerate() {
        let offset = (i + 1) as f64 * delta;
        let plus = eval(offset)?;
        let minus = eval(-offset)?;
        let term = (plus - minus) * (c / delta);
        derivative = Some(match derivative {
            Some(acc) => acc + term,
            None => term,
        });
    }

    // Coefficient tables are never empty
    Ok(derivative.unwrap_or_default())
}

/// Computes one derivative plane per [`PartialTarget`]
#[derive(Debug, Clone, Copy)]
pub struct PartialsEngine {
    order: FiniteDifferenceOrder,
    pixel_scale: f64,
}

impl PartialsEngine {
    pub fn new(order: FiniteDifferenceOrder, pixel_scale: f64) -> Self {
        Self { order, pixel_scale }
    }

    pub fn order(&self) -> FiniteDifferenceOrder {
        self.order
    }

    /// Derivative planes in [`PartialTarget::ALL`] order, all rendered with the PSF
    pub fn compute<E: RenderEngine>(
        &self,
        renderer: &SourceRenderer<E>,
        nominal: &RenderParameters,
        bounds: &StampBounds,
    ) -> Result<Vec<Array2<f64>>, RenderError> {
        PartialTarget::ALL
            .iter()
            .map(|target| {
                let delta = target.step(nominal, self.pixel_scale);
                central_difference(self.order, delta, |offset| {
                    renderer.render_nominal(&target.perturb(nominal, offset), bounds)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::convert::Infallible;

    fn nominal() -> RenderParameters {
        RenderParameters {
            flux: 100.0,
            xc: 0.01,
            yc: -0.02,
            half_light_radius: 0.4,
            axis_ratio: 0.7,
            position_angle: 0.3,
            g1: 0.01,
            g2: -0.02,
        }
    }

    #[test]
    fn test_order_validation() {
        assert!(FiniteDifferenceOrder::new(0).is_err());
        assert!(FiniteDifferenceOrder::new(5).is_err());
        for k in 1..=4 {
            let order = FiniteDifferenceOrder::new(k).unwrap();
            assert_eq!(order.coefficients().len(), k as usize);
        }
    }

    #[test]
    fn test_coefficients_are_consistent() {
        // Exact on f(x) = x: 2 Σ s c_s = 1
        for k in 1..=4 {
            let order = FiniteDifferenceOrder::new(k).unwrap();
            let sum: f64 = order
                .coefficients()
                .iter()
                .enumerate()
                .map(|(i, c)| 2.0 * (i + 1) as f64 * c)
                .sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_steps_and_perturbation() {
        let p = nominal();
        assert_relative_eq!(PartialTarget::CenterX.step(&p, 0.2), 0.2 / 3.0);
        assert_relative_eq!(PartialTarget::HalfLightRadius.step(&p, 0.2), 0.02);
        assert_relative_eq!(PartialTarget::ShearG2.step(&p, 0.2), 0.03);

        let moved = PartialTarget::HalfLightRadius.perturb(&p, 0.1);
        assert_relative_eq!(moved.half_light_radius, 0.5);
        assert_eq!(moved.xc, p.xc);
        // Nominal is left untouched
        assert_relative_eq!(p.half_light_radius, 0.4);

        let moved = PartialTarget::ShearG1.perturb(&p, -0.03);
        assert_relative_eq!(moved.g1, -0.02);
        assert_eq!(moved.g2, p.g2);
    }

    #[test]
    fn test_linear_function_exact() {
        let k = 3.5;
        let base = Array2::from_shape_fn((3, 4), |(r, c)| (r + c) as f64);
        for order in 1..=4 {
            let order = FiniteDifferenceOrder::new(order).unwrap();
            let d = central_difference(order, 0.1, |x| {
                Ok::<_, Infallible>(&base * (k * (1.0 + x)))
            })
            .unwrap();
            for (got, b) in d.iter().zip(base.iter()) {
                assert_relative_eq!(*got, k * b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_higher_order_reduces_error() {
        // d/dx sin(x0 + x) at x = 0
        let x0: f64 = 0.7;
        let delta = 0.2;
        let exact = x0.cos();
        let mut last = f64::INFINITY;
        for order in 1..=4 {
            let order = FiniteDifferenceOrder::new(order).unwrap();
            let d = central_difference(order, delta, |x| {
                Ok::<_, Infallible>(Array2::from_elem((1, 1), (x0 + x).sin()))
            })
            .unwrap();
            let err = (d[[0, 0]] - exact).abs();
            assert!(err < last, "order {} error {err} not below {last}", order.get());
            last = err;
        }
        assert!(last < 1e-7);
    }

    #[test]
    fn test_evaluation_order() {
        let mut offsets = Vec::new();
        let order = FiniteDifferenceOrder::new(2).unwrap();
        central_difference(order, 0.5, |x| {
            offsets.push(x);
            Ok::<_, Infallible>(Array2::zeros((1, 1)))
        })
        .unwrap();
        assert_eq!(offsets, vec![0.5, -0.5, 1.0, -1.0]);
    }

    #[test]
    fn test_errors_propagate() {
        let order = FiniteDifferenceOrder::new(1).unwrap();
        let result = central_difference(order, 0.5, |_| Err::<Array2<f64>, _>("boom"));
        assert_eq!(result.unwrap_err(), "boom");
    }
}
