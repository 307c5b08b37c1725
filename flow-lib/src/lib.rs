pub mod ast;
pub mod builtins;
pub mod cursor;
pub mod flow;
pub mod lexer;
pub mod parser;
pub mod program;
pub mod scope;
pub mod session;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod lexer_tests;

#[cfg(test)]
mod parser_tests;

#[cfg(test)]
mod scope_tests;

#[cfg(test)]
mod flow_tests;

#[cfg(test)]
mod builtins_tests;
