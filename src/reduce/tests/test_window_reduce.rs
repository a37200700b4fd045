//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use ndarray::{Array2, ArrayView1, array};

use crate::ErrPack;
use crate::reduce::descriptor::ReduceDescriptor;
use crate::reduce::error::ReduceError;
use crate::reduce::interp::execute;
use crate::reduce::kind::ReduceKind;
use crate::reduce::{KernelProgram, WindowReduceKernelBuilder};

//--------------------------------------------------------------------------------------------------

fn program(kind: ReduceKind, window_size: usize, batch_size: usize, in_size: usize) -> KernelProgram {
	let desc = ReduceDescriptor::new(kind, window_size, batch_size, in_size).unwrap();
	WindowReduceKernelBuilder::build(&desc)
}

/// Small integers, about a fifth of them zero. Sums of these are exact in `f32`
/// in any order.
#[allow(clippy::cast_precision_loss)]
fn test_input(batch_size: usize, in_size: usize) -> Array2<f32> {
	Array2::from_shape_fn((batch_size, in_size), |(b, i)| {
		let h = (i * 7919 + b * 104_729 + 17) % 23;
		if h % 5 == 0 { 0.0 } else { h as f32 - 11.0 }
	})
}

/// Element-by-element reduction of one window, left to right.
fn naive_window(kind: ReduceKind, row: ArrayView1<f32>, desc: &ReduceDescriptor, out_idx: usize) -> f32 {
	let neutral = kind.semantics().neutral;
	desc.window_range(out_idx)
		.map(|i| row.get(i).copied().unwrap_or(neutral))
		.fold(neutral, |acc, x| kind.fold_scalar(acc, x))
}

//--------------------------------------------------------------------------------------------------

#[test]
fn vectorized_path_matches_naive_reduction() -> Result<(), ErrPack<ReduceError>> {
	let batch_size = 3;
	for kind in ReduceKind::KINDS {
		for window_size in 1..=8 {
			for in_size in [1, 5, 7, 8, 13, 16, 24, 29] {
				let program = program(kind, window_size, batch_size, in_size);
				let desc = program.descriptor;
				let input = test_input(batch_size, in_size);
				let out = execute(&program, input.view())?;
				assert_eq!(out.dim(), (batch_size, desc.geometry().out_size));
				for ((b, o), &value) in out.indexed_iter() {
					let expected = naive_window(kind, input.row(b), &desc, o);
					assert_eq!(
						value, expected,
						"{kind} window={window_size} in={in_size} at ({b}, {o})"
					);
				}
			}
		}
	}
	Ok(())
}

#[test]
fn all_is_true_only_without_zeros() -> Result<(), ErrPack<ReduceError>> {
	for window_size in 1..=8 {
		for zero_at in 0..window_size {
			let mut input = Array2::<f32>::from_elem((1, window_size), 3.0);
			input[[0, zero_at]] = 0.0;
			let out = execute(&program(ReduceKind::All, window_size, 1, window_size), input.view())?;
			assert_eq!(out, array![[0.0]], "window={window_size} zero_at={zero_at}");
		}
		let input = Array2::<f32>::from_elem((1, window_size), -0.5);
		let out = execute(&program(ReduceKind::All, window_size, 1, window_size), input.view())?;
		assert_eq!(out, array![[1.0]]);
	}
	Ok(())
}

#[test]
fn infinite_inputs() -> Result<(), ErrPack<ReduceError>> {
	let input = array![[1.0, f32::INFINITY, 2.0, -3.0, 5.0]];
	let max = execute(&program(ReduceKind::Max, 3, 1, 5), input.view())?;
	assert_eq!(max, array![[f32::INFINITY, 5.0]]);

	let input = array![[1.0, 2.0, f32::NEG_INFINITY, 4.0, 5.0]];
	let min = execute(&program(ReduceKind::Min, 2, 1, 5), input.view())?;
	assert_eq!(min, array![[1.0, f32::NEG_INFINITY, 5.0]]);
	Ok(())
}

//--------------------------------------------------------------------------------------------------

#[test]
fn evenly_divided_rows_never_leave_the_row() {
	for window_size in 1..=12 {
		for out_size in 0..=6 {
			let in_size = window_size * out_size;
			let desc = ReduceDescriptor::new(ReduceKind::Sum, window_size, 1, in_size).unwrap();
			let geom = desc.geometry();
			assert!(!geom.needs_bounds_guard);
			assert_eq!(geom.out_size, out_size);
			for o in 0..geom.out_size {
				assert!(desc.window_range(o).end <= in_size);
			}
		}
	}
}

#[test]
fn unguarded_kernels_stay_in_bounds() -> Result<(), ErrPack<ReduceError>> {
	for kind in ReduceKind::KINDS {
		for window_size in 1..=9 {
			for out_size in 1..=4 {
				let in_size = window_size * out_size;
				let program = program(kind, window_size, 2, in_size);
				assert_eq!(program.ir.fetch.guard, None);
				let input = test_input(2, in_size);
				// an out of range fetch would fail with IndexOutOfBounds
				execute(&program, input.view())?;
			}
		}
	}
	Ok(())
}

#[test]
fn guarded_kernels_pad_with_neutral() -> Result<(), ErrPack<ReduceError>> {
	for kind in ReduceKind::KINDS {
		let neutral = kind.semantics().neutral;
		for window_size in 2..=9 {
			let in_size = window_size + 1;
			let program = program(kind, window_size, 1, in_size);
			assert!(program.ir.fetch.guard.is_some());

			// the last window sees one real element and `window_size - 1` padded ones
			let input = Array2::<f32>::from_elem((1, in_size), 4.0);
			let out = execute(&program, input.view())?;
			let expected = if kind == ReduceKind::All { 1.0 } else { kind.fold_scalar(neutral, 4.0) };
			assert_eq!(out[[0, 1]], expected, "{kind} window={window_size}");
		}
	}
	Ok(())
}

//--------------------------------------------------------------------------------------------------

#[test]
fn identical_descriptors_give_identical_source() {
	for kind in ReduceKind::KINDS {
		for window_size in 1..=8 {
			let a = program(kind, window_size, 4, 19);
			let b = program(kind, window_size, 4, 19);
			assert_eq!(a.source.as_bytes(), b.source.as_bytes());
		}
	}
}

#[test]
fn kinds_give_different_source() {
	let sources: Vec<String> =
		ReduceKind::KINDS.iter().map(|&kind| program(kind, 6, 1, 13).source).collect();
	for (i, a) in sources.iter().enumerate() {
		for b in sources.iter().skip(i + 1) {
			assert_ne!(a, b);
		}
	}
}

//--------------------------------------------------------------------------------------------------
