/// Project file model and loading.
pub mod file;
