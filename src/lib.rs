//! Library crate for the golf league scoring backend: the scoring engine, score
//! stores, the sync controller and the HTTP surface built on them.

pub mod config;
pub mod dao;
pub mod dto;
mod error;
pub mod routes;
pub mod scoring;
pub mod services;
pub mod state;
pub mod sync;
