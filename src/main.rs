//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::process::ExitCode;

use ndarray::Array2;
use x17reduce::ErrPack;
use x17reduce::reduce::{ProgramCache, ReduceDescriptor, ReduceError, ReduceKind, interp};

//--------------------------------------------------------------------------------------------------

const USAGE: &str = "usage: x17reduce [sum|min|max|all] [window_size] [batch_size] [in_size]";

fn parse_size(arg: Option<String>, default: usize) -> Result<usize, ErrPack<ReduceError>> {
	match arg {
		None => Ok(default),
		Some(arg) => arg.parse().map_err(|_| {
			ErrPack::with_message(ReduceError::InvalidArgument, format!("not a size: `{arg}`"))
		}),
	}
}

#[allow(clippy::cast_precision_loss)]
fn run() -> Result<(), ErrPack<ReduceError>> {
	let mut args = std::env::args().skip(1);
	let kind = match args.next() {
		Some(kind) => kind.parse()?,
		None => ReduceKind::Sum,
	};
	let window_size = parse_size(args.next(), 4)?;
	let batch_size = parse_size(args.next(), 1)?;
	let in_size = parse_size(args.next(), 8)?;

	let desc = ReduceDescriptor::new(kind, window_size, batch_size, in_size)?;
	let program = ProgramCache::instance().get_or_build(&desc);

	println!("// bindings: {:?}", program.input_bindings.as_slice());
	println!("// output shape: {:?}", program.output_shape);
	println!("{}", program.source);

	let input = Array2::from_shape_fn((batch_size, in_size), |(b, i)| (b * in_size + i + 1) as f32);
	let output = interp::execute(&program, input.view())?;
	println!("// input:\n{input}");
	println!("// output:\n{output}");
	Ok(())
}

fn main() -> ExitCode {
	let verbosity: usize = std::env::var("X17REDUCE_LOG").ok().and_then(|v| v.parse().ok()).unwrap_or(1);
	let _ = stderrlog::new().module("x17reduce").verbosity(verbosity).init();

	match run() {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			log::error!("{err}");
			eprintln!("{USAGE}");
			ExitCode::FAILURE
		},
	}
}

//--------------------------------------------------------------------------------------------------
