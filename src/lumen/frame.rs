use std::path::Path;

use bytemuck::cast_slice;
use image::RgbaImage;
use log::{debug, info};
use nalgebra::Vector4;

use crate::error::{Error, Result};

/// 누적 버퍼와 화면에 표시할 RGBA8 버퍼를 같이 관리함.
/// 행은 위에서 아래 순서로 저장됨 (0번 행이 화면 맨 위).
#[derive(Debug, Default)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    accumulation: Vec<Vector4<f32>>,
    pixels: Vec<u32>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize);
        Self {
            width,
            height,
            accumulation: vec![Vector4::zeros(); len],
            pixels: vec![0; len],
        }
    }

    /// 크기가 바뀌었으면 두 버퍼를 새로 만들고 true 반환
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }

        debug!("frame buffer {}x{} -> {}x{}", self.width, self.height, width, height);
        *self = Self::new(width, height);
        true
    }

    pub fn clear_accumulation(&mut self) {
        self.accumulation.fill(Vector4::zeros());
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn accumulation(&self) -> &[Vector4<f32>] {
        &self.accumulation
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn as_bytes(&self) -> &[u8] {
        cast_slice(&self.pixels)
    }

    pub(crate) fn buffers_mut(&mut self) -> (&mut [Vector4<f32>], &mut [u32]) {
        (&mut self.accumulation, &mut self.pixels)
    }

    pub fn to_image(&self) -> Option<RgbaImage> {
        if self.is_empty() {
            return None;
        }

        RgbaImage::from_raw(self.width, self.height, self.as_bytes().to_vec())
    }

    /// 확장자에 맞는 형식으로 지금 화면에 보이는 프레임을 저장함
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let image = self.to_image().ok_or(Error::EmptyFrame)?;
        image.save(path.as_ref())?;

        info!("saved {}x{} frame to {}", self.width, self.height, path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_reallocates_and_zeroes() {
        let mut frame = FrameBuffer::new(2, 2);
        frame.buffers_mut().0[3] = Vector4::new(1.0, 1.0, 1.0, 1.0);

        assert!(!frame.resize(2, 2));
        assert_eq!(frame.accumulation()[3], Vector4::new(1.0, 1.0, 1.0, 1.0));

        assert!(frame.resize(3, 1));
        assert_eq!(frame.accumulation().len(), 3);
        assert_eq!(frame.pixels().len(), 3);
        assert!(frame.accumulation().iter().all(|c| *c == Vector4::zeros()));
    }

    #[test]
    fn zero_sized_frame_is_empty() {
        let mut frame = FrameBuffer::new(4, 4);
        frame.resize(0, 4);

        assert!(frame.is_empty());
        assert!(frame.to_image().is_none());
        assert!(matches!(frame.save("never.png"), Err(Error::EmptyFrame)));
    }

    #[test]
    fn bytes_follow_pixel_order() {
        let mut frame = FrameBuffer::new(2, 1);
        frame.buffers_mut().1.copy_from_slice(&[
            u32::from_le_bytes([1, 2, 3, 4]),
            u32::from_le_bytes([5, 6, 7, 8]),
        ]);

        assert_eq!(frame.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);

        let image = frame.to_image().unwrap();
        assert_eq!(image.get_pixel(1, 0).0, [5, 6, 7, 8]);
    }
}
