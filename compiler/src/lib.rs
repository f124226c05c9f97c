// jamc — JAM cross-compiler
//
// Library root. Translates a JAM-C / JAM-JS program pair into an embedded C
// program and a managed JavaScript program.

pub mod activity;
pub mod ast;
pub mod callgraph;
pub mod config;
pub mod context;
pub mod diag;
pub mod dot;
pub mod embedded;
pub mod emit_c;
pub mod emit_js;
pub mod error;
pub mod jcond;
pub mod jdata;
pub mod lexer;
pub mod managed;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod symbols;
pub mod types;
