//! A library of input and output adapters

pub mod iterator_stream;
