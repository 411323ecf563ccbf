#![deny(missing_docs)]
#![doc = "Symbolic core of the termination witness engine: polynomials, exponential closed forms, root isolation, sign reasoning and the expression parser."]

pub mod errors;
pub mod symbol;
pub mod poly;
pub mod expr;
pub mod roots;
pub mod sign;
pub mod parse;
pub mod config;
pub mod rng;

pub use config::EngineConfig;
pub use errors::{ErrorInfo, TermwitError};
pub use expr::{Expr, GrowthTerm};
pub use parse::{
    parse_expr, parse_expr_with_domains, parse_poly, parse_poly_with_domains, parse_rational,
};
pub use poly::{rational, ratio, Monomial, Poly, Rational};
pub use rng::{derive_substream_seed, RngHandle};
pub use sign::{
    always_nonnegative, checked_sign, get_sign, has_real_zero, has_real_zero_for_any,
    peak_on_naturals, possible_signs,
};
pub use symbol::{Domain, FreshSymbols, Symbol, ITER_VAR};
