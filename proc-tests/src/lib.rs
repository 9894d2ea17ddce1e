//! Tests of the procedural macros in `diamond-cut-proc`.
#[cfg(test)]
mod facet;
