//! Video conform stage: the staging picture buffer and stride-tolerant
//! plane copies.

use crate::encoder::PictureLayout;
use crate::media::VideoFrameRef;

/// Staging picture matching the encoder's expected layout.
///
/// One buffer per output, allocated at open and overwritten for every
/// frame. This is deliberately a plain buffer plus a layout descriptor
/// rather than a view into the encoder's own frame object.
pub struct PictureBuf {
    layout: PictureLayout,
    planes: Vec<Vec<u8>>,
}

impl PictureBuf {
    pub fn new(layout: PictureLayout) -> Self {
        let planes = (0..layout.format.plane_count())
            .map(|plane| {
                let rows = layout.format.plane_rows(plane, layout.height);
                vec![0u8; rows * layout.strides[plane]]
            })
            .collect();
        Self { layout, planes }
    }

    pub fn layout(&self) -> &PictureLayout {
        &self.layout
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn plane(&self, plane: usize) -> &[u8] {
        &self.planes[plane]
    }

    pub fn plane_mut(&mut self, plane: usize) -> &mut [u8] {
        &mut self.planes[plane]
    }

    /// All planes concatenated: the payload of a raw passthrough packet.
    pub fn flattened(&self) -> Vec<u8> {
        self.planes.concat()
    }
}

/// Copy a host frame into the staging picture plane by plane, tolerating
/// stride mismatches between source and destination.
///
/// Each row copies the smaller of the two row sizes; the luma plane covers
/// the full picture height and each chroma plane half of it (planar 4:2:0
/// intermediate). Never reads or writes past either buffer.
pub(crate) fn copy_frame(frame: &VideoFrameRef<'_>, picture: &mut PictureBuf) {
    let height = picture.layout.height;
    let format = picture.layout.format;

    for plane in 0..picture.plane_count().min(frame.planes.len()) {
        let src = frame.planes[plane];
        let dst_stride = picture.layout.strides[plane];
        let rows = format.plane_rows(plane, height);
        copy_plane(src.data, src.stride, picture.plane_mut(plane), dst_stride, rows);
    }
}

fn copy_plane(src: &[u8], src_stride: usize, dst: &mut [u8], dst_stride: usize, rows: usize) {
    let bytes = src_stride.min(dst_stride);
    if bytes == 0 {
        return;
    }

    // Matching strides with full-size buffers collapse to a single copy.
    if src_stride == dst_stride && src.len() >= rows * src_stride && dst.len() >= rows * dst_stride
    {
        dst[..rows * dst_stride].copy_from_slice(&src[..rows * src_stride]);
        return;
    }

    for row in 0..rows {
        let s = row * src_stride;
        let d = row * dst_stride;
        if s + bytes > src.len() || d + bytes > dst.len() {
            break;
        }
        dst[d..d + bytes].copy_from_slice(&src[s..s + bytes]);
    }
}
