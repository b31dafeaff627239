pub(crate) mod background;
pub(crate) mod backend;
pub(crate) mod compositor;
pub(crate) mod style;
pub(crate) mod text;
pub(crate) mod viz;
