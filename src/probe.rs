/// 元数据探针：在文件头部扫一段字节，看有没有 EXIF 标记。
///
/// 相机直出的照片几乎都带 EXIF；生成式模型导出的图通常没有。
/// 只看前 64KB：JPEG 的 APP1 段总是紧挨着 SOI。
pub const PROBE_WINDOW: usize = 64 * 1024;

const EXIF_MARKER: &[u8; 4] = b"Exif";

pub fn has_embedded_metadata(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PROBE_WINDOW)];
    window.windows(EXIF_MARKER.len()).any(|w| w == EXIF_MARKER)
}
