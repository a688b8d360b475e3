#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

pub fn png(img: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("png encoding");
    buf
}

/// 像手机拍的海边照片：上半天空、下半海水，叠一层 ±6 的确定性噪声。
///
/// 512x384 时边缘方差大约 300、饱和度标准差约 0.26、平均饱和度约 0.5。
pub fn realistic_scene(width: u32, height: u32) -> RgbImage {
    let mut state: u32 = 0x9E37_79B9;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };
    RgbImage::from_fn(width, height, |_, y| {
        let base: [i32; 3] = if y < height / 2 { [150, 180, 200] } else { [40, 120, 170] };
        let n = (next() % 13) as i32 - 6;
        Rgb(base.map(|c| (c + n) as u8))
    })
}

/// 典型的“生成图”特征：正方形、512 的整数倍、完全平滑、没有饱和度变化
pub fn flat_render(side: u32) -> RgbImage {
    RgbImage::from_pixel(side, side, Rgb([90, 90, 90]))
}
