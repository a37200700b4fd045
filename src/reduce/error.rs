//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use crate::ErrPack;

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct InvalidWindowSizeError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ShapeMismatchError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct IndexOutOfBoundsError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct TypeMismatchError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReduceError {
	InvalidWindowSize,
	SizeOutOfRange,
	ShapeMismatch,
	IndexOutOfBounds,
	TypeMismatch,
	UnboundVariable,
	MissingOutput,
	UnknownKind,
	InvalidArgument,
}

impl From<InvalidWindowSizeError> for ErrPack<ReduceError> {
	#[cold]
	#[inline(never)]
	fn from(_: InvalidWindowSizeError) -> Self {
		Self::with_message(ReduceError::InvalidWindowSize, "window size must be positive")
	}
}

impl From<ShapeMismatchError> for ErrPack<ReduceError> {
	#[cold]
	#[inline(never)]
	fn from(_: ShapeMismatchError) -> Self {
		Self::new(ReduceError::ShapeMismatch)
	}
}

impl From<IndexOutOfBoundsError> for ErrPack<ReduceError> {
	#[cold]
	#[inline(never)]
	fn from(_: IndexOutOfBoundsError) -> Self {
		Self::new(ReduceError::IndexOutOfBounds)
	}
}

impl From<TypeMismatchError> for ErrPack<ReduceError> {
	#[cold]
	#[inline(never)]
	fn from(_: TypeMismatchError) -> Self {
		Self::new(ReduceError::TypeMismatch)
	}
}

//--------------------------------------------------------------------------------------------------
