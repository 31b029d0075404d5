// Copyright 2021-2022 Andrew Conway.
// This file is part of ConcreteSTV.
// ConcreteSTV is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// ConcreteSTV is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with ConcreteSTV.  If not, see <https://www.gnu.org/licenses/>.


//! The four disjoint failure categories a count can raise.

use thiserror::Error;

/// Nothing inside a count is ever recovered from; every fallible step surfaces one
/// of these four kinds to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StvError {
    #[error("usage error: {0}")]
    UsageError(String),
    #[error("profile error: {0}")]
    ProfileError(String),
    #[error("arithmetic error: {0}")]
    ArithmeticError(String),
    #[error("election error: {0}")]
    ElectionError(String),
}

pub type StvResult<T> = Result<T, StvError>;
