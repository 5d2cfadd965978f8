// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Core types shared by every layer of the engine

pub mod error;
pub mod stack;
pub mod temporal;

pub use error::{FhirPathError, Result, SourceLocation};
pub use temporal::{
    CalendarDuration, PrecisionDate, PrecisionDateTime, PrecisionTime, TemporalPrecision,
};
