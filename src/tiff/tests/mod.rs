//! Unit tests for the TIFF container layer

#![cfg(test)]

mod test_utils;
mod byte_order_tests;
mod types_tests;
mod writer_tests;
