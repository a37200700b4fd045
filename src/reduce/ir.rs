//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

//! Statement tree for the body of a windowed-reduction kernel.
//!
//! The tree is target independent. `glsl` renders it to kernel source and
//! `interp` executes it on the CPU.

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ty {
	Int,
	Float,
	Bool,
	Vec4,
	BVec4,
}

/// Local variables of the kernel's `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Var {
	Batch,
	OutIdx,
	InOffset,
	I,
	InIdx,
	Acc,
	Values,
	GroupAll,
}

impl Var {
	pub const COUNT: usize = 8;

	pub fn index(self) -> usize {
		self as usize
	}

	pub fn name(self) -> &'static str {
		match self {
			Self::Batch => "batch",
			Self::OutIdx => "outIdx",
			Self::InOffset => "inOffset",
			Self::I => "i",
			Self::InIdx => "inIdx",
			Self::Acc => "accumulator",
			Self::Values => "values",
			Self::GroupAll => "groupAll",
		}
	}
}

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Int(i64),
	Float(f32),

	/// The reduction kind's neutral element.
	Neutral,

	Var(Var),

	/// Coordinate `axis` of the output cell handled by this invocation.
	/// Axis 0 is the batch, axis 1 the window.
	OutputCoord(usize),

	/// One input element, read through the (possibly guarded) fetch helper.
	Fetch { batch: Box<Expr>, index: Box<Expr> },

	Add(Box<Expr>, Box<Expr>),
	Mul(Box<Expr>, Box<Expr>),
	Dot(Box<Expr>, Box<Expr>),
	Min(Box<Expr>, Box<Expr>),
	Max(Box<Expr>, Box<Expr>),
	GreaterEq(Box<Expr>, Box<Expr>),
	And(Box<Expr>, Box<Expr>),

	Lane(Box<Expr>, usize),
	Pack { ty: Ty, lanes: Box<[Expr; 4]> },
	Splat { ty: Ty, value: Box<Expr> },

	/// `true` iff every lane of a `BVec4` is true.
	AllLanes(Box<Expr>),
	ToFloat(Box<Expr>),
}

impl Expr {
	pub fn var(var: Var) -> Self {
		Self::Var(var)
	}

	pub fn fetch(batch: Self, index: Self) -> Self {
		Self::Fetch { batch: Box::new(batch), index: Box::new(index) }
	}

	pub fn add(a: Self, b: Self) -> Self {
		Self::Add(Box::new(a), Box::new(b))
	}

	pub fn mul(a: Self, b: Self) -> Self {
		Self::Mul(Box::new(a), Box::new(b))
	}

	pub fn dot(a: Self, b: Self) -> Self {
		Self::Dot(Box::new(a), Box::new(b))
	}

	pub fn min(a: Self, b: Self) -> Self {
		Self::Min(Box::new(a), Box::new(b))
	}

	pub fn max(a: Self, b: Self) -> Self {
		Self::Max(Box::new(a), Box::new(b))
	}

	pub fn greater_eq(a: Self, b: Self) -> Self {
		Self::GreaterEq(Box::new(a), Box::new(b))
	}

	pub fn and(a: Self, b: Self) -> Self {
		Self::And(Box::new(a), Box::new(b))
	}

	pub fn lane(v: Self, lane: usize) -> Self {
		Self::Lane(Box::new(v), lane)
	}

	pub fn pack(ty: Ty, lanes: [Self; 4]) -> Self {
		Self::Pack { ty, lanes: Box::new(lanes) }
	}

	pub fn splat(ty: Ty, value: Self) -> Self {
		Self::Splat { ty, value: Box::new(value) }
	}

	pub fn all_lanes(v: Self) -> Self {
		Self::AllLanes(Box::new(v))
	}

	pub fn to_float(v: Self) -> Self {
		Self::ToFloat(Box::new(v))
	}

	pub fn is_binary_op(&self) -> bool {
		matches!(self, Self::Add(..) | Self::Mul(..) | Self::GreaterEq(..) | Self::And(..))
	}

	/// Visits `self` and all sub-expressions, parents first.
	pub fn walk(&self, f: &mut impl FnMut(&Self)) {
		f(self);
		match self {
			Self::Int(_) | Self::Float(_) | Self::Neutral | Self::Var(_) | Self::OutputCoord(_) => {},
			Self::Fetch { batch: a, index: b }
			| Self::Add(a, b)
			| Self::Mul(a, b)
			| Self::Dot(a, b)
			| Self::Min(a, b)
			| Self::Max(a, b)
			| Self::GreaterEq(a, b)
			| Self::And(a, b) => {
				a.walk(f);
				b.walk(f);
			},
			Self::Lane(a, _)
			| Self::Splat { value: a, .. }
			| Self::AllLanes(a)
			| Self::ToFloat(a) => {
				a.walk(f);
			},
			Self::Pack { lanes, .. } => {
				for lane in lanes.iter() {
					lane.walk(f);
				}
			},
		}
	}
}

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
	Let { var: Var, ty: Ty, init: Expr },
	Assign { var: Var, value: Expr },

	/// `for (int var = 0; var < count; var += step) { body }`
	For { var: Var, count: usize, step: usize, body: Vec<Stmt> },

	Block(Vec<Stmt>),

	/// Writes the result of this invocation's output cell.
	SetOutput(Expr),
}

impl Stmt {
	pub fn let_(var: Var, ty: Ty, init: Expr) -> Self {
		Self::Let { var, ty, init }
	}

	pub fn assign(var: Var, value: Expr) -> Self {
		Self::Assign { var, value }
	}

	/// Visits every expression in `self`, including nested statements.
	pub fn walk_exprs(&self, f: &mut impl FnMut(&Expr)) {
		match self {
			Self::Let { init: e, .. } | Self::Assign { value: e, .. } | Self::SetOutput(e) => {
				e.walk(f);
			},
			Self::For { body, .. } | Self::Block(body) => {
				for stmt in body {
					stmt.walk_exprs(f);
				}
			},
		}
	}
}

//--------------------------------------------------------------------------------------------------

/// Element is out of the row when `index < 0 || index >= in_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsGuard {
	pub in_size: usize,
}

/// The fetch helper. Reads `input[batch, index]`, or returns the neutral
/// element when a guard is present and rejects the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchFn {
	pub guard: Option<BoundsGuard>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KernelIr {
	pub neutral: f32,
	pub fetch: FetchFn,
	pub main: Vec<Stmt>,
}

impl KernelIr {
	pub fn walk_exprs(&self, f: &mut impl FnMut(&Expr)) {
		for stmt in &self.main {
			stmt.walk_exprs(f);
		}
	}

	pub fn fetch_count(&self) -> usize {
		let mut count = 0;
		self.walk_exprs(&mut |e| {
			if let Expr::Fetch { .. } = e {
				count += 1;
			}
		});
		count
	}
}

//--------------------------------------------------------------------------------------------------
