use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// 아직 아무것도 렌더링하지 않은 상태에서 저장하려 함
    #[error("nothing has been rendered yet")]
    EmptyFrame,

    #[error("failed to export frame: {0}")]
    Image(#[from] image::ImageError),

    #[cfg(feature = "viewer")]
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[cfg(feature = "viewer")]
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[cfg(feature = "viewer")]
    #[error("no graphics adapter compatible with the surface")]
    NoAdapter,

    #[cfg(feature = "viewer")]
    #[error("failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

pub type Result<T> = std::result::Result<T, Error>;
