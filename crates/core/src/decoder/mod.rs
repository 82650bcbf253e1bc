// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod thumb;

pub use thumb::{decode_bl_offset, decode_thumb_16, Format, Instruction};
