//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use smallvec::{SmallVec, smallvec};

use crate::reduce::descriptor::{ReduceDescriptor, ReduceGeometry, VEC_WIDTH};
use crate::reduce::glsl;
use crate::reduce::ir::{BoundsGuard, Expr, FetchFn, KernelIr, Stmt, Ty, Var};
use crate::reduce::kind::KindSemantics;

//--------------------------------------------------------------------------------------------------

/// Logical name of the single input the generated kernel reads.
pub const INPUT_BINDING: &str = "x";

//--------------------------------------------------------------------------------------------------

/// A generated kernel, ready to be compiled and dispatched by the execution engine.
///
/// The engine runs the body once per cell of `output_shape`.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelProgram {
	pub input_bindings: SmallVec<[&'static str; 1]>,
	pub output_shape: [usize; 2],
	pub source: String,
	pub ir: KernelIr,
	pub descriptor: ReduceDescriptor,
}

//--------------------------------------------------------------------------------------------------

pub struct WindowReduceKernelBuilder;

impl WindowReduceKernelBuilder {
	/// Generates the kernel for `desc`.
	///
	/// Depends on nothing but `desc`. Identical descriptors produce identical programs.
	pub fn build(desc: &ReduceDescriptor) -> KernelProgram {
		let geom = desc.geometry();
		let sem = desc.kind().semantics();
		log::trace!(
			"building {} kernel: window={} batch={} in={} -> {:?}",
			desc.kind(),
			desc.window_size(),
			desc.batch_size(),
			desc.in_size(),
			geom
		);

		let ir = Self::emit(desc, &geom, &sem);
		let source = glsl::render(&ir, INPUT_BINDING);

		KernelProgram {
			input_bindings: smallvec![INPUT_BINDING],
			output_shape: [desc.batch_size(), geom.out_size],
			source,
			ir,
			descriptor: *desc,
		}
	}

	pub fn emit(desc: &ReduceDescriptor, geom: &ReduceGeometry, sem: &KindSemantics) -> KernelIr {
		let mut main = Self::emit_prologue(desc, sem);
		main.extend(Self::emit_vectorized_loop(geom, sem));
		main.extend(Self::emit_remainder(geom, sem));
		main.push(Stmt::SetOutput(sem.combine()));

		KernelIr {
			neutral: sem.neutral,
			fetch: Self::emit_fetch(desc, geom),
			main,
		}
	}

	/// When every window fits in its row the guard is not emitted at all.
	fn emit_fetch(desc: &ReduceDescriptor, geom: &ReduceGeometry) -> FetchFn {
		FetchFn {
			guard: geom.needs_bounds_guard.then_some(BoundsGuard { in_size: desc.in_size() }),
		}
	}

	fn emit_prologue(desc: &ReduceDescriptor, sem: &KindSemantics) -> Vec<Stmt> {
		vec![
			Stmt::let_(Var::Batch, Ty::Int, Expr::OutputCoord(0)),
			Stmt::let_(Var::OutIdx, Ty::Int, Expr::OutputCoord(1)),
			Stmt::let_(
				Var::InOffset,
				Ty::Int,
				Expr::mul(Expr::var(Var::OutIdx), int_const(desc.window_size())),
			),
			Stmt::let_(Var::Acc, sem.accumulator_ty(), sem.init_accumulator()),
		]
	}

	fn emit_vectorized_loop(geom: &ReduceGeometry, sem: &KindSemantics) -> Option<Stmt> {
		if geom.vectorized_count == 0 {
			return None;
		}
		let mut body = vec![Stmt::let_(
			Var::InIdx,
			Ty::Int,
			Expr::add(Expr::var(Var::InOffset), Expr::var(Var::I)),
		)];
		body.extend(Self::emit_group(sem, VEC_WIDTH));
		Some(Stmt::For {
			var: Var::I,
			count: geom.vectorized_count,
			step: VEC_WIDTH,
			body,
		})
	}

	/// The tail is padded with the neutral element and folded in
	/// with the same update as the full groups.
	fn emit_remainder(geom: &ReduceGeometry, sem: &KindSemantics) -> Option<Stmt> {
		if geom.remainder == 0 {
			return None;
		}
		let mut body = vec![Stmt::let_(
			Var::InIdx,
			Ty::Int,
			Expr::add(Expr::var(Var::InOffset), int_const(geom.vectorized_count)),
		)];
		body.extend(Self::emit_group(sem, geom.remainder));
		Some(Stmt::Block(body))
	}

	/// Packs `live_lanes` fetched elements starting at `Var::InIdx` and applies the update.
	fn emit_group(sem: &KindSemantics, live_lanes: usize) -> Vec<Stmt> {
		let lane = |i: usize| {
			if i >= live_lanes {
				Expr::Neutral
			} else if i == 0 {
				Expr::fetch(Expr::var(Var::Batch), Expr::var(Var::InIdx))
			} else {
				Expr::fetch(
					Expr::var(Var::Batch),
					Expr::add(Expr::var(Var::InIdx), int_const(i)),
				)
			}
		};
		let values = Expr::pack(sem.group_ty, [lane(0), lane(1), lane(2), lane(3)]);

		let mut stmts = vec![Stmt::let_(Var::Values, sem.group_ty, values)];
		stmts.extend(sem.update());
		stmts
	}
}

/// `ReduceDescriptor::new` keeps every size below `i32::MAX`.
fn int_const(value: usize) -> Expr {
	Expr::Int(i64::try_from(value).unwrap_or(i64::MAX))
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reduce::kind::ReduceKind;

	fn build(kind: ReduceKind, window_size: usize, batch_size: usize, in_size: usize) -> KernelProgram {
		let desc = ReduceDescriptor::new(kind, window_size, batch_size, in_size).unwrap();
		WindowReduceKernelBuilder::build(&desc)
	}

	#[test]
	fn output_shape_and_bindings() {
		let program = build(ReduceKind::Sum, 4, 3, 10);
		assert_eq!(program.output_shape, [3, 3]);
		assert_eq!(program.input_bindings.as_slice(), ["x"]);
	}

	#[test]
	fn guard_follows_divisibility() {
		let even = build(ReduceKind::Max, 3, 1, 9);
		assert_eq!(even.ir.fetch.guard, None);

		let uneven = build(ReduceKind::Max, 3, 1, 7);
		assert_eq!(uneven.ir.fetch.guard, Some(BoundsGuard { in_size: 7 }));
	}

	#[test]
	fn fetch_count_matches_window() {
		for window_size in 1..=12 {
			let program = build(ReduceKind::Min, window_size, 1, 100);
			let geom = program.descriptor.geometry();
			let groups = geom.vectorized_count / VEC_WIDTH;
			let expected = if groups > 0 { VEC_WIDTH } else { 0 } + geom.remainder;
			assert_eq!(program.ir.fetch_count(), expected, "window={window_size}");
		}
	}

	#[test]
	fn no_loop_for_small_windows() {
		let program = build(ReduceKind::Sum, 3, 1, 3);
		assert!(!program.ir.main.iter().any(|s| matches!(s, Stmt::For { .. })));
	}

	#[test]
	fn no_tail_for_multiples_of_four() {
		let program = build(ReduceKind::All, 8, 1, 8);
		assert!(!program.ir.main.iter().any(|s| matches!(s, Stmt::Block(..))));
		let Some(Stmt::For { count, step, .. }) =
			program.ir.main.iter().find(|s| matches!(s, Stmt::For { .. }))
		else {
			panic!("missing vectorized loop");
		};
		assert_eq!((*count, *step), (8, 4));
	}

	#[test]
	fn tail_is_padded_with_neutral() {
		let program = build(ReduceKind::Max, 6, 1, 12);
		let Some(Stmt::Block(tail)) = program.ir.main.iter().find(|s| matches!(s, Stmt::Block(..)))
		else {
			panic!("missing tail");
		};
		let Some(Stmt::Let { init: Expr::Pack { lanes, .. }, .. }) = tail.get(1) else {
			panic!("missing packed group");
		};
		assert!(matches!(lanes[0], Expr::Fetch { .. }));
		assert!(matches!(lanes[1], Expr::Fetch { .. }));
		assert_eq!(lanes[2], Expr::Neutral);
		assert_eq!(lanes[3], Expr::Neutral);
	}

	#[test]
	fn largest_window_renders_exact_literals() {
		let window_size = usize::try_from(i32::MAX).unwrap();
		let program = build(ReduceKind::Sum, window_size, 1, 1);
		assert!(program.source.contains("int inOffset = outIdx * 2147483647;"));
		assert!(program.source.contains("for (int i = 0; i < 2147483644; i += 4) {"));
		assert!(program.source.contains("int inIdx = inOffset + 2147483644;"));
		assert!(program.source.contains("if (inIdx < 0 || inIdx >= 1) {"));
	}

	#[test]
	fn build_is_deterministic() {
		for kind in ReduceKind::KINDS {
			let a = build(kind, 7, 2, 23);
			let b = build(kind, 7, 2, 23);
			assert_eq!(a.source, b.source);
			assert_eq!(a, b);
		}
	}
}

//--------------------------------------------------------------------------------------------------
