//! Core types and trait definitions for the examboard school service.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the domain model, the role policy (route gate, mutation authorizer and
//! row-scoping predicates) and the [`store::SchoolStore`] abstraction.

pub mod auth;
pub mod error;
pub mod exam;
pub mod identity;
pub mod mutation;
pub mod notice;
pub mod policy;
pub mod result;
pub mod scope;
pub mod store;
pub mod subject;
pub mod validate;

pub use error::{Error, Result};
