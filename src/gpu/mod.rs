mod context;
mod field_texture;
mod render;

pub use context::GpuContext;
pub use field_texture::FieldTexture;
pub use render::FieldView;
