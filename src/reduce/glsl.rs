//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

//! Renders a `KernelIr` to a GLSL kernel body.
//!
//! The execution engine provides `getOutputCoords()`, `setOutput(float)`
//! and one accessor `get<Binding>(int, int)` per input binding.

use crate::reduce::ir::{Expr, FetchFn, KernelIr, Stmt, Ty};

//--------------------------------------------------------------------------------------------------

const NEUTRAL_NAME: &str = "initializationValue";
const FETCH_NAME: &str = "getValue";
const INDENT: &str = "  ";

pub fn render(ir: &KernelIr, binding: &str) -> String {
	let mut r = Renderer { out: String::new(), depth: 0 };
	r.line(&format!("const float {NEUTRAL_NAME} = {};", float_literal(ir.neutral)));
	r.blank();
	r.fetch_fn(&ir.fetch, binding);
	r.blank();
	r.line("void main() {");
	r.depth += 1;
	for stmt in &ir.main {
		r.stmt(stmt);
	}
	r.depth -= 1;
	r.line("}");
	r.out
}

/// Name of the accessor the engine generates for `binding`, e.g. `x` -> `getX`.
pub fn accessor_name(binding: &str) -> String {
	let mut chars = binding.chars();
	let mut name = String::from("get");
	if let Some(first) = chars.next() {
		name.extend(first.to_uppercase());
		name.push_str(chars.as_str());
	}
	name
}

pub fn ty_name(ty: Ty) -> &'static str {
	match ty {
		Ty::Int => "int",
		Ty::Float => "float",
		Ty::Bool => "bool",
		Ty::Vec4 => "vec4",
		Ty::BVec4 => "bvec4",
	}
}

/// GLSL has no literal for infinity, so it is spelled as a division.
pub fn float_literal(value: f32) -> String {
	if value.is_nan() {
		"0.0 / 0.0".to_string()
	} else if value == f32::INFINITY {
		"1.0 / 0.0".to_string()
	} else if value == f32::NEG_INFINITY {
		"-1.0 / 0.0".to_string()
	} else {
		// `Debug` always keeps a decimal point or an exponent.
		format!("{value:?}")
	}
}

//--------------------------------------------------------------------------------------------------

struct Renderer {
	out: String,
	depth: usize,
}

impl Renderer {
	fn line(&mut self, text: &str) {
		for _ in 0..self.depth {
			self.out.push_str(INDENT);
		}
		self.out.push_str(text);
		self.out.push('\n');
	}

	fn blank(&mut self) {
		self.out.push('\n');
	}

	fn fetch_fn(&mut self, fetch: &FetchFn, binding: &str) {
		self.line(&format!("float {FETCH_NAME}(int batch, int inIdx) {{"));
		self.depth += 1;
		if let Some(guard) = fetch.guard {
			self.line(&format!("if (inIdx < 0 || inIdx >= {}) {{", guard.in_size));
			self.depth += 1;
			self.line(&format!("return {NEUTRAL_NAME};"));
			self.depth -= 1;
			self.line("}");
		}
		self.line(&format!("return {}(batch, inIdx);", accessor_name(binding)));
		self.depth -= 1;
		self.line("}");
	}

	fn stmt(&mut self, stmt: &Stmt) {
		match stmt {
			Stmt::Let { var, ty, init } => {
				let init = expr(init);
				self.line(&format!("{} {} = {init};", ty_name(*ty), var.name()));
			},
			Stmt::Assign { var, value } => {
				let value = expr(value);
				self.line(&format!("{} = {value};", var.name()));
			},
			Stmt::For { var, count, step, body } => {
				let v = var.name();
				self.line(&format!("for (int {v} = 0; {v} < {count}; {v} += {step}) {{"));
				self.block_body(body);
				self.line("}");
			},
			Stmt::Block(body) => {
				self.line("{");
				self.block_body(body);
				self.line("}");
			},
			Stmt::SetOutput(value) => {
				let value = expr(value);
				self.line(&format!("setOutput({value});"));
			},
		}
	}

	fn block_body(&mut self, body: &[Stmt]) {
		self.depth += 1;
		for stmt in body {
			self.stmt(stmt);
		}
		self.depth -= 1;
	}
}

//--------------------------------------------------------------------------------------------------

fn expr(e: &Expr) -> String {
	let mut out = String::new();
	write_expr(&mut out, e);
	out
}

/// Binary operators get parentheses only when they are an operand of another binary operator.
fn write_operand(out: &mut String, e: &Expr) {
	if e.is_binary_op() {
		out.push('(');
		write_expr(out, e);
		out.push(')');
	} else {
		write_expr(out, e);
	}
}

fn write_call(out: &mut String, name: &str, args: &[&Expr]) {
	out.push_str(name);
	out.push('(');
	for (i, arg) in args.iter().enumerate() {
		if i > 0 {
			out.push_str(", ");
		}
		write_expr(out, arg);
	}
	out.push(')');
}

fn write_binary(out: &mut String, a: &Expr, op: &str, b: &Expr) {
	write_operand(out, a);
	out.push(' ');
	out.push_str(op);
	out.push(' ');
	write_operand(out, b);
}

fn write_expr(out: &mut String, e: &Expr) {
	match e {
		Expr::Int(v) => out.push_str(&v.to_string()),
		Expr::Float(v) => {
			let literal = float_literal(*v);
			if v.is_finite() {
				out.push_str(&literal);
			} else {
				out.push_str(&format!("({literal})"));
			}
		},
		Expr::Neutral => out.push_str(NEUTRAL_NAME),
		Expr::Var(var) => out.push_str(var.name()),
		Expr::OutputCoord(axis) => out.push_str(&format!("getOutputCoords()[{axis}]")),
		Expr::Fetch { batch, index } => write_call(out, FETCH_NAME, &[&**batch, &**index]),
		Expr::Add(a, b) => write_binary(out, a, "+", b),
		Expr::Mul(a, b) => write_binary(out, a, "*", b),
		Expr::GreaterEq(a, b) => write_binary(out, a, ">=", b),
		Expr::And(a, b) => write_binary(out, a, "&&", b),
		Expr::Dot(a, b) => write_call(out, "dot", &[&**a, &**b]),
		Expr::Min(a, b) => write_call(out, "min", &[&**a, &**b]),
		Expr::Max(a, b) => write_call(out, "max", &[&**a, &**b]),
		Expr::Lane(v, lane) => {
			write_operand(out, v);
			out.push_str(&format!("[{lane}]"));
		},
		Expr::Pack { ty, lanes } => {
			let [a, b, c, d] = &**lanes;
			write_call(out, ty_name(*ty), &[a, b, c, d]);
		},
		Expr::Splat { ty, value } => write_call(out, ty_name(*ty), &[&**value]),
		Expr::AllLanes(v) => write_call(out, "all", &[&**v]),
		Expr::ToFloat(v) => write_call(out, "float", &[&**v]),
	}
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
