//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::num::NonZeroUsize;
use std::ops::Range;

use crate::ErrPack;
use crate::reduce::error::{InvalidWindowSizeError, ReduceError};
use crate::reduce::kind::ReduceKind;

//--------------------------------------------------------------------------------------------------

/// Number of lanes in one vectorized group.
pub const VEC_WIDTH: usize = 4;

//--------------------------------------------------------------------------------------------------

/// A windowed reduction over a `[batch_size, in_size]` view.
///
/// Every row is split into consecutive windows of `window_size` elements
/// and each window is reduced to a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReduceDescriptor {
	kind: ReduceKind,
	window_size: NonZeroUsize,
	batch_size: usize,
	in_size: usize,
}

impl ReduceDescriptor {
	pub fn new(
		kind: ReduceKind,
		window_size: usize,
		batch_size: usize,
		in_size: usize,
	) -> Result<Self, ErrPack<ReduceError>> {
		let Some(window_size) = NonZeroUsize::new(window_size) else {
			crate::cold_path();
			return Err(InvalidWindowSizeError.into());
		};
		// Window indices are computed in a kernel `int`.
		let last_index = in_size.checked_add(window_size.get() - 1);
		if !last_index.is_some_and(fits_kernel_int) || !fits_kernel_int(batch_size) {
			crate::cold_path();
			return Err(ErrPack::with_message(
				ReduceError::SizeOutOfRange,
				format!(
					"sizes don't fit a kernel int: window={window_size} batch={batch_size} in={in_size}"
				),
			));
		}
		Ok(Self { kind, window_size, batch_size, in_size })
	}

	pub fn kind(&self) -> ReduceKind {
		self.kind
	}

	pub fn window_size(&self) -> usize {
		self.window_size.get()
	}

	pub fn batch_size(&self) -> usize {
		self.batch_size
	}

	pub fn in_size(&self) -> usize {
		self.in_size
	}

	pub fn geometry(&self) -> ReduceGeometry {
		ReduceGeometry::new(self.window_size, self.in_size)
	}

	/// Input indices covered by the window that produces output `out_idx`.
	/// The range may extend past `in_size` for the last window of a row.
	pub fn window_range(&self, out_idx: usize) -> Range<usize> {
		let start = out_idx * self.window_size.get();
		start..start + self.window_size.get()
	}
}

pub fn fits_kernel_int(value: usize) -> bool {
	i32::try_from(value).is_ok()
}

//--------------------------------------------------------------------------------------------------

/// Constants derived from a descriptor. Recomputed on every build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceGeometry {
	pub out_size: usize,

	/// Elements processed in full groups of `VEC_WIDTH`.
	pub vectorized_count: usize,

	/// Trailing elements of a window that don't fill a group. Always `< VEC_WIDTH`.
	pub remainder: usize,

	/// The last window of a row runs past `in_size`.
	pub needs_bounds_guard: bool,
}

impl ReduceGeometry {
	pub fn new(window_size: NonZeroUsize, in_size: usize) -> Self {
		let window_size = window_size.get();
		Self {
			out_size: in_size.div_ceil(window_size),
			vectorized_count: (window_size / VEC_WIDTH) * VEC_WIDTH,
			remainder: window_size % VEC_WIDTH,
			needs_bounds_guard: in_size % window_size > 0,
		}
	}
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
