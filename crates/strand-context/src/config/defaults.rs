//! Compile-time defaults
//!
//! Generated by build.rs: library values, overridden by the file named in
//! `STRAND_CONFIG_RS` when it is set at build time.

include!(concat!(env!("OUT_DIR"), "/strand_merged_config.rs"));
