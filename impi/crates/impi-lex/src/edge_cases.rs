//! Edge case tests for impi-lex
