//! Data models for roster entities.

pub mod student;

pub use student::Student;
