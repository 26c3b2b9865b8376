//! Functions exposed to SQL alongside the access method.

pub mod functions;
