//! Rendering error types.

use thiserror::Error;

/// Errors that can occur in the wgpu backend.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Shader compilation failed.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// Pipeline creation failed.
    #[error("pipeline creation failed: {0}")]
    PipelineCreationFailed(String),

    /// Uploaded texel data does not match the texture size.
    #[error("texture upload size mismatch: expected {expected} texels, got {actual}")]
    TextureSizeMismatch { expected: u64, actual: u64 },

    /// Mapping a readback buffer failed.
    #[error("failed to map readback buffer")]
    BufferMapFailed,

    /// Error from the backend-agnostic core.
    #[error(transparent)]
    Core(#[from] fluidsim_core::FluidSimError),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
