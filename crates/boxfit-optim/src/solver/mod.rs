//! Minimizer backends.

pub mod lbfgsb;
