//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

//! Reference executor for generated kernels.
//!
//! Runs the kernel body once per output cell, the same way the GPU engine
//! dispatches it, with GLSL semantics for every operation in the IR.

use ndarray::{Array2, ArrayView2};

use crate::ErrPack;
use crate::reduce::builder::KernelProgram;
use crate::reduce::error::{IndexOutOfBoundsError, ReduceError, ShapeMismatchError, TypeMismatchError};
use crate::reduce::ir::{Expr, KernelIr, Stmt, Ty, Var};

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
	Int(i64),
	Float(f32),
	Bool(bool),
	Vec4([f32; 4]),
	BVec4([bool; 4]),
}

impl Value {
	pub fn ty(&self) -> Ty {
		match self {
			Self::Int(_) => Ty::Int,
			Self::Float(_) => Ty::Float,
			Self::Bool(_) => Ty::Bool,
			Self::Vec4(_) => Ty::Vec4,
			Self::BVec4(_) => Ty::BVec4,
		}
	}

	fn as_int(self) -> Result<i64, ErrPack<ReduceError>> {
		match self {
			Self::Int(v) => Ok(v),
			_ => Err(TypeMismatchError.into()),
		}
	}

	fn as_bool(self) -> Result<bool, ErrPack<ReduceError>> {
		match self {
			Self::Bool(v) => Ok(v),
			_ => Err(TypeMismatchError.into()),
		}
	}

	/// Scalar conversion used by the `float(..)` and `vec4(..)` constructors.
	#[allow(clippy::cast_precision_loss)]
	fn to_float(self) -> Result<f32, ErrPack<ReduceError>> {
		match self {
			Self::Int(v) => Ok(v as f32),
			Self::Float(v) => Ok(v),
			Self::Bool(v) => Ok(f32::from(u8::from(v))),
			Self::Vec4(_) | Self::BVec4(_) => Err(TypeMismatchError.into()),
		}
	}

	/// Scalar conversion used by the `bool(..)` and `bvec4(..)` constructors.
	fn to_bool(self) -> Result<bool, ErrPack<ReduceError>> {
		match self {
			Self::Int(v) => Ok(v != 0),
			Self::Float(v) => Ok(v != 0.0),
			Self::Bool(v) => Ok(v),
			Self::Vec4(_) | Self::BVec4(_) => Err(TypeMismatchError.into()),
		}
	}
}

//--------------------------------------------------------------------------------------------------

/// Runs `program` over `input`, which must have shape `[batch_size, in_size]`.
/// Returns a tensor of shape `program.output_shape`.
pub fn execute(
	program: &KernelProgram,
	input: ArrayView2<f32>,
) -> Result<Array2<f32>, ErrPack<ReduceError>> {
	let desc = &program.descriptor;
	let expected = (desc.batch_size(), desc.in_size());
	if input.dim() != expected {
		crate::cold_path();
		return Err(ErrPack::with_message(
			ReduceError::ShapeMismatch,
			format!("input shape {:?} doesn't match {expected:?}", input.dim()),
		));
	}

	let [batch_size, out_size] = program.output_shape;
	let mut output = Array2::zeros((batch_size, out_size));
	for ((batch, out_idx), o) in output.indexed_iter_mut() {
		let mut invocation = Invocation::new(&program.ir, input.view(), [batch, out_idx]);
		*o = invocation.run()?;
	}
	Ok(output)
}

//--------------------------------------------------------------------------------------------------

struct Invocation<'ir, 'x> {
	ir: &'ir KernelIr,
	input: ArrayView2<'x, f32>,
	coords: [usize; 2],
	vars: [Option<Value>; Var::COUNT],
	output: Option<f32>,
}

impl<'ir, 'x> Invocation<'ir, 'x> {
	fn new(ir: &'ir KernelIr, input: ArrayView2<'x, f32>, coords: [usize; 2]) -> Self {
		Self { ir, input, coords, vars: [None; Var::COUNT], output: None }
	}

	fn run(&mut self) -> Result<f32, ErrPack<ReduceError>> {
		let ir = self.ir;
		self.exec_all(&ir.main)?;
		self.output.ok_or_else(|| {
			ErrPack::with_message(ReduceError::MissingOutput, "kernel finished without setOutput")
		})
	}

	fn exec_all(&mut self, stmts: &[Stmt]) -> Result<(), ErrPack<ReduceError>> {
		for stmt in stmts {
			self.exec(stmt)?;
		}
		Ok(())
	}

	#[allow(clippy::cast_possible_wrap)]
	fn exec(&mut self, stmt: &Stmt) -> Result<(), ErrPack<ReduceError>> {
		match stmt {
			Stmt::Let { var, ty, init } => {
				let value = self.eval(init)?;
				if value.ty() != *ty {
					crate::cold_path();
					return Err(TypeMismatchError.into());
				}
				self.set(*var, value);
			},
			Stmt::Assign { var, value } => {
				let old = self.get(*var)?;
				let value = self.eval(value)?;
				if value.ty() != old.ty() {
					crate::cold_path();
					return Err(TypeMismatchError.into());
				}
				self.set(*var, value);
			},
			Stmt::For { var, count, step, body } => {
				if *step == 0 {
					crate::cold_path();
					return Err(TypeMismatchError.into());
				}
				for i in (0..*count).step_by(*step) {
					self.set(*var, Value::Int(i as i64));
					self.exec_all(body)?;
				}
			},
			Stmt::Block(body) => {
				self.exec_all(body)?;
			},
			Stmt::SetOutput(value) => {
				let value = self.eval(value)?;
				let Value::Float(value) = value else {
					crate::cold_path();
					return Err(TypeMismatchError.into());
				};
				self.output = Some(value);
			},
		}
		Ok(())
	}

	fn get(&self, var: Var) -> Result<Value, ErrPack<ReduceError>> {
		self.vars.get(var.index()).copied().flatten().ok_or_else(|| {
			ErrPack::with_message(
				ReduceError::UnboundVariable,
				format!("variable `{}` read before assignment", var.name()),
			)
		})
	}

	fn set(&mut self, var: Var, value: Value) {
		if let Some(slot) = self.vars.get_mut(var.index()) {
			*slot = Some(value);
		}
	}

	fn fetch(&self, batch: i64, index: i64) -> Result<f32, ErrPack<ReduceError>> {
		if let Some(guard) = self.ir.fetch.guard {
			if index < 0 || index >= i64::try_from(guard.in_size).unwrap_or(i64::MAX) {
				return Ok(self.ir.neutral);
			}
		}
		let element = usize::try_from(batch)
			.ok()
			.zip(usize::try_from(index).ok())
			.and_then(|(b, i)| self.input.get((b, i)));
		match element {
			Some(v) => Ok(*v),
			None => {
				crate::cold_path();
				log::warn!(
					"unguarded fetch out of range: batch={batch} index={index} shape={:?}",
					self.input.dim()
				);
				Err(IndexOutOfBoundsError.into())
			},
		}
	}

	#[allow(clippy::cast_possible_wrap)]
	fn eval(&self, e: &Expr) -> Result<Value, ErrPack<ReduceError>> {
		let value = match e {
			Expr::Int(v) => Value::Int(*v),
			Expr::Float(v) => Value::Float(*v),
			Expr::Neutral => Value::Float(self.ir.neutral),
			Expr::Var(var) => self.get(*var)?,
			Expr::OutputCoord(axis) => {
				let Some(coord) = self.coords.get(*axis) else {
					crate::cold_path();
					return Err(ShapeMismatchError.into());
				};
				Value::Int(*coord as i64)
			},
			Expr::Fetch { batch, index } => {
				let batch = self.eval(batch)?.as_int()?;
				let index = self.eval(index)?.as_int()?;
				Value::Float(self.fetch(batch, index)?)
			},
			Expr::Add(a, b) => match (self.eval(a)?, self.eval(b)?) {
				(Value::Int(a), Value::Int(b)) => Value::Int(a + b),
				(Value::Float(a), Value::Float(b)) => Value::Float(a + b),
				(Value::Vec4(a), Value::Vec4(b)) => Value::Vec4(lanewise(a, b, |x, y| x + y)),
				_ => return Err(TypeMismatchError.into()),
			},
			Expr::Mul(a, b) => match (self.eval(a)?, self.eval(b)?) {
				(Value::Int(a), Value::Int(b)) => Value::Int(a * b),
				(Value::Float(a), Value::Float(b)) => Value::Float(a * b),
				(Value::Vec4(a), Value::Vec4(b)) => Value::Vec4(lanewise(a, b, |x, y| x * y)),
				_ => return Err(TypeMismatchError.into()),
			},
			Expr::Dot(a, b) => match (self.eval(a)?, self.eval(b)?) {
				(Value::Vec4(a), Value::Vec4(b)) => {
					Value::Float(a.iter().zip(b.iter()).fold(0.0, |acc, (x, y)| acc + x * y))
				},
				_ => return Err(TypeMismatchError.into()),
			},
			Expr::Min(a, b) => match (self.eval(a)?, self.eval(b)?) {
				(Value::Float(a), Value::Float(b)) => Value::Float(glsl_min(a, b)),
				(Value::Vec4(a), Value::Vec4(b)) => Value::Vec4(lanewise(a, b, glsl_min)),
				_ => return Err(TypeMismatchError.into()),
			},
			Expr::Max(a, b) => match (self.eval(a)?, self.eval(b)?) {
				(Value::Float(a), Value::Float(b)) => Value::Float(glsl_max(a, b)),
				(Value::Vec4(a), Value::Vec4(b)) => Value::Vec4(lanewise(a, b, glsl_max)),
				_ => return Err(TypeMismatchError.into()),
			},
			Expr::GreaterEq(a, b) => match (self.eval(a)?, self.eval(b)?) {
				(Value::Int(a), Value::Int(b)) => Value::Bool(a >= b),
				(Value::Float(a), Value::Float(b)) => Value::Bool(a >= b),
				_ => return Err(TypeMismatchError.into()),
			},
			Expr::And(a, b) => {
				let a = self.eval(a)?.as_bool()?;
				let b = self.eval(b)?.as_bool()?;
				Value::Bool(a && b)
			},
			Expr::Lane(v, lane) => match self.eval(v)? {
				Value::Vec4(v) => Value::Float(*v.get(*lane).ok_or(TypeMismatchError)?),
				Value::BVec4(v) => Value::Bool(*v.get(*lane).ok_or(TypeMismatchError)?),
				_ => return Err(TypeMismatchError.into()),
			},
			Expr::Pack { ty, lanes } => {
				let [a, b, c, d] = &**lanes;
				let lanes = [self.eval(a)?, self.eval(b)?, self.eval(c)?, self.eval(d)?];
				match ty {
					Ty::Vec4 => Value::Vec4(try_map4(lanes, Value::to_float)?),
					Ty::BVec4 => Value::BVec4(try_map4(lanes, Value::to_bool)?),
					_ => return Err(TypeMismatchError.into()),
				}
			},
			Expr::Splat { ty, value } => {
				let value = self.eval(value)?;
				match ty {
					Ty::Vec4 => Value::Vec4([value.to_float()?; 4]),
					Ty::BVec4 => Value::BVec4([value.to_bool()?; 4]),
					_ => return Err(TypeMismatchError.into()),
				}
			},
			Expr::AllLanes(v) => match self.eval(v)? {
				Value::BVec4(v) => Value::Bool(v.iter().all(|&b| b)),
				_ => return Err(TypeMismatchError.into()),
			},
			Expr::ToFloat(v) => Value::Float(self.eval(v)?.to_float()?),
		};
		Ok(value)
	}
}

//--------------------------------------------------------------------------------------------------

/// GLSL defines `min(x, y)` as `y < x ? y : x`.
fn glsl_min(x: f32, y: f32) -> f32 {
	if y < x { y } else { x }
}

/// GLSL defines `max(x, y)` as `x < y ? y : x`.
fn glsl_max(x: f32, y: f32) -> f32 {
	if x < y { y } else { x }
}

fn lanewise(a: [f32; 4], b: [f32; 4], f: impl Fn(f32, f32) -> f32) -> [f32; 4] {
	let [a0, a1, a2, a3] = a;
	let [b0, b1, b2, b3] = b;
	[f(a0, b0), f(a1, b1), f(a2, b2), f(a3, b3)]
}

fn try_map4<T>(
	values: [Value; 4],
	f: impl Fn(Value) -> Result<T, ErrPack<ReduceError>>,
) -> Result<[T; 4], ErrPack<ReduceError>> {
	let [a, b, c, d] = values;
	Ok([f(a)?, f(b)?, f(c)?, f(d)?])
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
