// lib.rs
pub mod alignment_record;
pub mod cigar_walker;
pub mod commands;
pub mod coverage;
pub mod errors;
pub mod faidx;
pub mod filter;
pub mod handler;
pub mod options;
pub mod reference_buffer;
pub mod sequence_index;
pub mod splice;
pub mod window;
