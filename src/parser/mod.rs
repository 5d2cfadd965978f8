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

//! FHIRPath expression parsing

pub mod ast_cache;
pub mod pratt;
pub mod tokenizer;

pub use ast_cache::{AstCache, AstCacheStats, SharedAst};
pub use pratt::{
    DEFAULT_MAX_PARSE_DEPTH, PrattParser, Precedence, parse_expression, parse_expression_with_depth,
};
pub use tokenizer::{Spanned, Token, Tokenizer, tokenize};
