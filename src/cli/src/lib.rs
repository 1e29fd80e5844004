//! Cask CLI library.

pub mod commands;
