// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod cortex_m;
pub mod pipeline;
pub mod registers;

pub use cortex_m::CortexM;
pub use pipeline::Pipeline;
pub use registers::{Psr, RegisterFile};
