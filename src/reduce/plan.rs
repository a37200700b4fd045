//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use ndarray::{Array2, ArrayView2};
use smallvec::SmallVec;

use crate::ErrPack;
use crate::reduce::cache::ProgramCache;
use crate::reduce::descriptor::ReduceDescriptor;
use crate::reduce::error::ReduceError;
use crate::reduce::interp;
use crate::reduce::kind::ReduceKind;

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanConfig {
	/// Rows up to this length are reduced by a single window.
	pub parallelize_threshold: usize,
}

impl Default for PlanConfig {
	fn default() -> Self {
		Self { parallelize_threshold: 30 }
	}
}

//--------------------------------------------------------------------------------------------------

/// Window size that splits a row of `in_size` elements into roughly
/// `sqrt(in_size)` windows of roughly `sqrt(in_size)` elements.
///
/// Returns the smallest divisor of `in_size` that is at least `sqrt(in_size)`
/// (and at least 2), so that the windows tile the row exactly when possible.
pub fn compute_optimal_window_size(in_size: usize, config: &PlanConfig) -> usize {
	if in_size <= config.parallelize_threshold {
		return in_size;
	}
	nearest_divisor(in_size, in_size.isqrt().max(2))
}

fn nearest_divisor(size: usize, start: usize) -> usize {
	(start..size).find(|d| size % d == 0).unwrap_or(size)
}

//--------------------------------------------------------------------------------------------------

/// A chain of reductions that brings every row down to a single value.
/// The output of each pass is the input of the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducePlan {
	passes: SmallVec<[ReduceDescriptor; 4]>,
}

impl ReducePlan {
	pub fn new(
		kind: ReduceKind,
		batch_size: usize,
		in_size: usize,
		config: &PlanConfig,
	) -> Result<Self, ErrPack<ReduceError>> {
		let mut passes: SmallVec<[ReduceDescriptor; 4]> = SmallVec::new();
		let mut in_size = in_size;
		loop {
			let window_size = compute_optimal_window_size(in_size, config).max(1);
			let desc = ReduceDescriptor::new(kind, window_size, batch_size, in_size)?;
			let out_size = desc.geometry().out_size;
			log::debug!(
				"reduce pass {}: {kind} window={window_size} in={in_size} out={out_size}",
				passes.len()
			);
			passes.push(desc);
			if out_size <= 1 {
				break;
			}
			in_size = out_size;
		}
		Ok(Self { passes })
	}

	pub fn passes(&self) -> &[ReduceDescriptor] {
		&self.passes
	}

	pub fn output_shape(&self) -> [usize; 2] {
		match self.passes.last() {
			Some(last) => [last.batch_size(), last.geometry().out_size],
			None => [0, 0],
		}
	}

	/// Runs every pass through the reference executor.
	pub fn execute(
		&self,
		input: ArrayView2<f32>,
		cache: &ProgramCache,
	) -> Result<Array2<f32>, ErrPack<ReduceError>> {
		let mut current = input.to_owned();
		for desc in &self.passes {
			let program = cache.get_or_build(desc);
			current = interp::execute(&program, current.view())?;
		}
		Ok(current)
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use assert_approx_eq::assert_approx_eq;
	use ndarray::Array2;

	use super::*;

	#[test]
	fn small_rows_use_one_window() {
		let config = PlanConfig::default();
		assert_eq!(compute_optimal_window_size(0, &config), 0);
		assert_eq!(compute_optimal_window_size(7, &config), 7);
		assert_eq!(compute_optimal_window_size(30, &config), 30);
	}

	#[test]
	fn large_rows_use_divisor_near_sqrt() {
		let config = PlanConfig::default();
		assert_eq!(compute_optimal_window_size(100, &config), 10);
		assert_eq!(compute_optimal_window_size(1000, &config), 40);
		// prime: no divisor below the row length
		assert_eq!(compute_optimal_window_size(31, &config), 31);
		assert_eq!(compute_optimal_window_size(35, &config), 5);
	}

	#[test]
	fn zero_threshold_still_terminates() {
		let config = PlanConfig { parallelize_threshold: 0 };
		let plan = ReducePlan::new(ReduceKind::Sum, 1, 2, &config).unwrap();
		assert_eq!(plan.passes().len(), 1);
		assert_eq!(plan.output_shape(), [1, 1]);
	}

	#[test]
	fn passes_chain() {
		let plan = ReducePlan::new(ReduceKind::Max, 2, 1000, &PlanConfig::default()).unwrap();
		let passes = plan.passes();
		assert_eq!(passes.len(), 2);
		assert_eq!((passes[0].window_size(), passes[0].in_size()), (40, 1000));
		assert_eq!((passes[1].window_size(), passes[1].in_size()), (25, 25));
		assert_eq!(plan.output_shape(), [2, 1]);
	}

	#[test]
	fn empty_rows() {
		let plan = ReducePlan::new(ReduceKind::Sum, 3, 0, &PlanConfig::default()).unwrap();
		assert_eq!(plan.passes().len(), 1);
		assert_eq!(plan.output_shape(), [3, 0]);
	}

	#[test]
	#[allow(clippy::cast_precision_loss)]
	fn multi_pass_matches_single_pass() {
		let (batch_size, in_size) = (3, 1000);
		let input =
			Array2::from_shape_fn((batch_size, in_size), |(b, i)| ((b * 7 + i * 13) % 101) as f32);
		let cache = ProgramCache::new();
		let plan = ReducePlan::new(ReduceKind::Sum, batch_size, in_size, &PlanConfig::default())
			.unwrap();
		let out = plan.execute(input.view(), &cache).unwrap();
		assert_eq!(out.dim(), (batch_size, 1));
		for b in 0..batch_size {
			let expected: f32 = input.row(b).sum();
			assert_approx_eq!(out[[b, 0]], expected, 1e-3);
		}

		let plan = ReducePlan::new(ReduceKind::Min, batch_size, in_size, &PlanConfig::default())
			.unwrap();
		let out = plan.execute(input.view(), &cache).unwrap();
		for b in 0..batch_size {
			let expected = input.row(b).iter().copied().fold(f32::INFINITY, f32::min);
			assert_eq!(out[[b, 0]], expected);
		}
	}
}

//--------------------------------------------------------------------------------------------------
