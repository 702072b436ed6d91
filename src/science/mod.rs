// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
pub mod compatibility;
pub mod cost;
pub mod materials;
pub mod sustainability;
