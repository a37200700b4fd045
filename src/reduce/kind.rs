//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use arrayvec::ArrayVec;

use crate::ErrPack;
use crate::reduce::error::ReduceError;
use crate::reduce::ir::{Expr, Stmt, Ty, Var};

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceKind {
	Sum,
	Min,
	Max,

	/// Logical AND. Nonzero input is true, the result is `1.0` or `0.0`.
	All,
}

impl ReduceKind {
	pub const KINDS: [Self; 4] = [Self::Sum, Self::Min, Self::Max, Self::All];

	pub fn name(self) -> &'static str {
		match self {
			Self::Sum => "sum",
			Self::Min => "min",
			Self::Max => "max",
			Self::All => "all",
		}
	}

	pub fn semantics(self) -> KindSemantics {
		match self {
			Self::Sum => KindSemantics {
				kind: self,
				neutral: 0.0,
				accumulator: Accumulator::Scalar,
				group_ty: Ty::Vec4,
				update: UpdateRule::DotOnes,
				combine: CombineRule::Identity,
			},
			Self::Min => KindSemantics {
				kind: self,
				neutral: f32::INFINITY,
				accumulator: Accumulator::Lanes,
				group_ty: Ty::Vec4,
				update: UpdateRule::LaneMin,
				combine: CombineRule::HorizontalMin,
			},
			Self::Max => KindSemantics {
				kind: self,
				neutral: f32::NEG_INFINITY,
				accumulator: Accumulator::Lanes,
				group_ty: Ty::Vec4,
				update: UpdateRule::LaneMax,
				combine: CombineRule::HorizontalMax,
			},
			Self::All => KindSemantics {
				kind: self,
				neutral: 1.0,
				accumulator: Accumulator::Scalar,
				group_ty: Ty::BVec4,
				update: UpdateRule::LogicalAnd,
				combine: CombineRule::Identity,
			},
		}
	}

	/// Folds one element into a running value, element by element.
	/// This is the plain sequential definition of each kind.
	pub fn fold_scalar(self, acc: f32, x: f32) -> f32 {
		match self {
			Self::Sum => acc + x,
			Self::Min => {
				if x < acc {
					x
				} else {
					acc
				}
			},
			Self::Max => {
				if acc < x {
					x
				} else {
					acc
				}
			},
			Self::All => {
				if acc >= 1.0 && x != 0.0 {
					1.0
				} else {
					0.0
				}
			},
		}
	}
}

impl std::fmt::Display for ReduceKind {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

impl std::str::FromStr for ReduceKind {
	type Err = ErrPack<ReduceError>;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"sum" => Ok(Self::Sum),
			"min" => Ok(Self::Min),
			"max" => Ok(Self::Max),
			"all" => Ok(Self::All),
			_ => Err(ErrPack::with_message(
				ReduceError::UnknownKind,
				format!("unknown reduce kind `{s}`, expected one of sum, min, max, all"),
			)),
		}
	}
}

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulator {
	/// Each group is folded into one float immediately.
	Scalar,

	/// A running `vec4`, reduced horizontally only at the end.
	Lanes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRule {
	/// `acc += dot(group, vec4(1.0))`
	DotOnes,

	/// `acc = min(group, acc)`, lanewise
	LaneMin,

	/// `acc = max(group, acc)`, lanewise
	LaneMax,

	/// `acc = float(acc >= 1.0 && float(all(group)) >= 1.0)`
	LogicalAnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineRule {
	Identity,
	HorizontalMin,
	HorizontalMax,
}

/// One row of the per-kind table: what the accumulator looks like,
/// how a group of four lanes is folded in, and how the result is read out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindSemantics {
	pub kind: ReduceKind,
	pub neutral: f32,
	pub accumulator: Accumulator,
	pub group_ty: Ty,
	pub update: UpdateRule,
	pub combine: CombineRule,
}

impl KindSemantics {
	pub fn accumulator_ty(&self) -> Ty {
		match self.accumulator {
			Accumulator::Scalar => Ty::Float,
			Accumulator::Lanes => Ty::Vec4,
		}
	}

	pub fn init_accumulator(&self) -> Expr {
		match self.accumulator {
			Accumulator::Scalar => Expr::Neutral,
			Accumulator::Lanes => Expr::splat(Ty::Vec4, Expr::Neutral),
		}
	}

	/// Statements folding `Var::Values` into `Var::Acc`.
	/// The same statements serve full groups and the padded tail.
	pub fn update(&self) -> ArrayVec<Stmt, 2> {
		let acc = || Expr::var(Var::Acc);
		let values = || Expr::var(Var::Values);

		let mut stmts = ArrayVec::new();
		match self.update {
			UpdateRule::DotOnes => {
				let ones = Expr::splat(Ty::Vec4, Expr::Float(1.0));
				stmts.push(Stmt::assign(Var::Acc, Expr::add(acc(), Expr::dot(values(), ones))));
			},
			UpdateRule::LaneMin => {
				stmts.push(Stmt::assign(Var::Acc, Expr::min(values(), acc())));
			},
			UpdateRule::LaneMax => {
				stmts.push(Stmt::assign(Var::Acc, Expr::max(values(), acc())));
			},
			UpdateRule::LogicalAnd => {
				// Truth is carried as a float. Anything `>= 1.0` is true.
				stmts.push(Stmt::let_(Var::GroupAll, Ty::Bool, Expr::all_lanes(values())));
				let acc_true = Expr::greater_eq(acc(), Expr::Float(1.0));
				let group_true = Expr::greater_eq(
					Expr::to_float(Expr::var(Var::GroupAll)),
					Expr::Float(1.0),
				);
				stmts.push(Stmt::assign(Var::Acc, Expr::to_float(Expr::and(acc_true, group_true))));
			},
		}
		stmts
	}

	/// Scalar result computed from the final accumulator.
	pub fn combine(&self) -> Expr {
		let acc = || Expr::var(Var::Acc);
		let fold = |op: fn(Expr, Expr) -> Expr| {
			let mut result = Expr::lane(acc(), 0);
			for lane in 1..4 {
				result = op(result, Expr::lane(acc(), lane));
			}
			result
		};
		match self.combine {
			CombineRule::Identity => acc(),
			CombineRule::HorizontalMin => fold(Expr::min),
			CombineRule::HorizontalMax => fold(Expr::max),
		}
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn neutral_elements() {
		assert_eq!(ReduceKind::Sum.semantics().neutral, 0.0);
		assert_eq!(ReduceKind::Min.semantics().neutral, f32::INFINITY);
		assert_eq!(ReduceKind::Max.semantics().neutral, f32::NEG_INFINITY);
		assert_eq!(ReduceKind::All.semantics().neutral, 1.0);
	}

	#[test]
	fn neutral_is_identity_of_fold() {
		for kind in ReduceKind::KINDS {
			let neutral = kind.semantics().neutral;
			for x in [-1.0e30_f32, -2.5, 0.0, 1.0, 3.0, 7.0e25] {
				let expected = if kind == ReduceKind::All { f32::from(x != 0.0) } else { x };
				assert_eq!(kind.fold_scalar(neutral, x), expected, "{kind} {x}");
			}
		}
	}

	#[test]
	fn accumulator_shapes() {
		assert_eq!(ReduceKind::Sum.semantics().accumulator_ty(), Ty::Float);
		assert_eq!(ReduceKind::All.semantics().accumulator_ty(), Ty::Float);
		assert_eq!(ReduceKind::Min.semantics().accumulator_ty(), Ty::Vec4);
		assert_eq!(ReduceKind::Max.semantics().accumulator_ty(), Ty::Vec4);
		assert_eq!(ReduceKind::All.semantics().group_ty, Ty::BVec4);
	}

	#[test]
	fn update_only_touches_accumulator() {
		for kind in ReduceKind::KINDS {
			let update = kind.semantics().update();
			let last = update.last().unwrap();
			assert!(matches!(last, Stmt::Assign { var: Var::Acc, .. }), "{kind}");
		}
		assert_eq!(ReduceKind::All.semantics().update().len(), 2);
	}

	#[test]
	fn horizontal_combine_uses_every_lane() {
		for kind in [ReduceKind::Min, ReduceKind::Max] {
			let mut lanes = Vec::new();
			kind.semantics().combine().walk(&mut |e| {
				if let Expr::Lane(_, lane) = e {
					lanes.push(*lane);
				}
			});
			lanes.sort_unstable();
			assert_eq!(lanes, [0, 1, 2, 3]);
		}
		assert_eq!(ReduceKind::Sum.semantics().combine(), Expr::Var(Var::Acc));
	}

	#[test]
	fn parse_kind() {
		for kind in ReduceKind::KINDS {
			assert_eq!(kind.name().parse::<ReduceKind>().unwrap(), kind);
		}
		let err = "mean".parse::<ReduceKind>().unwrap_err();
		assert_eq!(err.code, ReduceError::UnknownKind);
	}
}

//--------------------------------------------------------------------------------------------------
