//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

pub mod builder;
pub mod cache;
pub mod descriptor;
pub mod error;
pub mod glsl;
pub mod interp;
pub mod ir;
pub mod kind;
pub mod plan;

#[cfg(test)]
mod tests;

pub use builder::{INPUT_BINDING, KernelProgram, WindowReduceKernelBuilder};
pub use cache::ProgramCache;
pub use descriptor::{ReduceDescriptor, ReduceGeometry, VEC_WIDTH};
pub use error::ReduceError;
pub use kind::{KindSemantics, ReduceKind};
pub use plan::{PlanConfig, ReducePlan, compute_optimal_window_size};

//--------------------------------------------------------------------------------------------------
