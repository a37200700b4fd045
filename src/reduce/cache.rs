//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use hashbrown::HashMap;

use crate::reduce::builder::{KernelProgram, WindowReduceKernelBuilder};
use crate::reduce::descriptor::ReduceDescriptor;

//--------------------------------------------------------------------------------------------------

/// Memoizes generated programs by descriptor.
///
/// Building is deterministic, so a cached program is identical to a freshly built one.
pub struct ProgramCache {
	programs: RwLock<HashMap<ReduceDescriptor, Arc<KernelProgram>>>,
}

impl Default for ProgramCache {
	fn default() -> Self {
		Self::new()
	}
}

impl ProgramCache {
	pub fn new() -> Self {
		Self { programs: RwLock::new(HashMap::new()) }
	}

	pub fn instance() -> &'static Self {
		static instance: OnceLock<ProgramCache> = OnceLock::new();
		instance.get_or_init(Self::new)
	}

	pub fn get_or_build(&self, desc: &ReduceDescriptor) -> Arc<KernelProgram> {
		{
			let programs = self.programs.read().unwrap_or_else(PoisonError::into_inner);
			if let Some(program) = programs.get(desc) {
				return program.clone();
			}
		}

		crate::cold_path();
		let mut programs = self.programs.write().unwrap_or_else(PoisonError::into_inner);
		programs
			.entry(*desc)
			.or_insert_with(|| {
				log::debug!("program cache miss: {desc:?}");
				Arc::new(WindowReduceKernelBuilder::build(desc))
			})
			.clone()
	}

	pub fn len(&self) -> usize {
		self.programs.read().unwrap_or_else(PoisonError::into_inner).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&self) {
		self.programs.write().unwrap_or_else(PoisonError::into_inner).clear();
	}
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
