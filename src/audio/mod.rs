pub(crate) mod analysis;
pub(crate) mod envelope;
pub(crate) mod mix;
