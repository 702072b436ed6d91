// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT

pub mod formulation;
pub mod space;

pub use formulation::{Component, FormulationRow, MixMetrics, ProcessConditions, Role};
pub use space::{Dimension, SearchSpace};
