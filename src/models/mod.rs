//! Data models for Libris entities

pub mod book;
pub mod loan;
pub mod response;
pub mod user;
