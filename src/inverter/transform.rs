//! # 像素反色模块
//!
//! 对 RGBA 缓冲逐像素执行 `255 - v`（仅 R/G/B），Alpha 原样保留。
//! 像素之间没有依赖，超过阈值后按行交给 rayon 并行，结果与串行逐位一致。

use image::RgbaImage;
use rayon::prelude::*;

/// 单通道反色。
#[inline]
pub fn invert_channel(value: u8) -> u8 {
    u8::MAX - value
}

/// 原地反色一段 RGBA 字节（长度需为 4 的倍数，多余字节不处理）。
pub fn invert_rgba_in_place(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px[0] = invert_channel(px[0]);
        px[1] = invert_channel(px[1]);
        px[2] = invert_channel(px[2]);
    }
}

/// 生成反色后的新位图，源位图保持不变。
///
/// `parallel_threshold_pixels` 为 0 时始终并行。
pub fn invert_image(source: &RgbaImage, parallel_threshold_pixels: u64) -> RgbaImage {
    let mut output = source.clone();
    let (width, height) = output.dimensions();
    let pixel_count = width as u64 * height as u64;

    if pixel_count == 0 {
        return output;
    }

    if pixel_count >= parallel_threshold_pixels {
        let row_len = width as usize * 4;
        output
            .par_chunks_mut(row_len)
            .for_each(invert_rgba_in_place);
    } else {
        invert_rgba_in_place(&mut output);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn white_becomes_black_and_alpha_is_kept() {
        let white = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let inverted = invert_image(&white, u64::MAX);

        assert_eq!(inverted.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn black_becomes_white() {
        let black = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        let inverted = invert_image(&black, u64::MAX);

        assert_eq!(inverted.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn translucent_alpha_is_untouched() {
        let img = RgbaImage::from_pixel(2, 1, Rgba([10, 128, 250, 37]));
        let inverted = invert_image(&img, u64::MAX);

        assert_eq!(inverted.get_pixel(1, 0).0, [245, 127, 5, 37]);
    }

    #[test]
    fn parallel_and_sequential_paths_agree() {
        let img = RgbaImage::from_fn(97, 31, |x, y| {
            Rgba([(x * 3) as u8, (y * 7) as u8, (x ^ y) as u8, (x + y) as u8])
        });

        let sequential = invert_image(&img, u64::MAX);
        let parallel = invert_image(&img, 0);

        assert_eq!(sequential.as_raw(), parallel.as_raw());
    }

    #[test]
    fn source_buffer_is_not_modified() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 4]));
        let _ = invert_image(&img, 0);

        assert_eq!(img.get_pixel(2, 2).0, [1, 2, 3, 4]);
    }

    #[test]
    fn empty_image_is_returned_as_is() {
        let img = RgbaImage::new(0, 0);
        assert_eq!(invert_image(&img, 0).dimensions(), (0, 0));
    }
}
