//! Raw field access that `ffmpeg-next` does not wrap.
//!
//! All `unsafe` in the crate lives here.

use ffmpeg_next as ffmpeg;

// ── Codec-parameter field accessors ─────────────────────────────────────────

/// Sample rate of a stream's codec parameters
pub fn codec_params_sample_rate(params: &ffmpeg::codec::parameters::Parameters) -> u32 {
    // SAFETY: `params` keeps the pointer valid; plain integer read.
    unsafe { (*params.as_ptr()).sample_rate.max(0) as u32 }
}

/// Channel count of a stream's codec parameters
pub fn codec_params_channels(params: &ffmpeg::codec::parameters::Parameters) -> u16 {
    // SAFETY: as above.
    unsafe { (*params.as_ptr()).ch_layout.nb_channels.max(0) as u16 }
}

/// Stream parameters of an opened encoder, including its initial padding,
/// which the MP3 muxer records in the LAME tag for gapless decoding.
pub fn encoder_codec_parameters(encoder: &ffmpeg::encoder::Audio) -> ffmpeg::codec::Parameters {
    use std::ops::Deref;
    use std::rc::Rc;
    let ctx: &ffmpeg::codec::Context = encoder.deref();
    // SAFETY: the context is open and valid; the copy only reads from it.
    unsafe {
        let params = ffmpeg::ffi::avcodec_parameters_alloc();
        ffmpeg::ffi::avcodec_parameters_from_context(params, ctx.as_ptr());
        ffmpeg::codec::Parameters::wrap(params, None::<Rc<dyn std::any::Any>>)
    }
}

// ── Audio plane access ───────────────────────────────────────────────────────

/// Base pointer and byte length of plane `index`, or `None` when the frame
/// has no such plane. Packed audio has exactly one plane.
///
/// `linesize[0]` holds the size of every plane for planar audio, so it is
/// used for all of them. The length includes alignment padding.
///
/// # Safety
/// `f` must point to a valid `AVFrame` that outlives the returned pointer.
unsafe fn plane_ptr(
    f: *const ffmpeg::ffi::AVFrame,
    planar: bool,
    index: usize,
) -> Option<(*mut u8, usize)> {
    let planes = if planar {
        (*f).ch_layout.nb_channels.max(0) as usize
    } else {
        1
    };
    if index >= planes || (*f).extended_data.is_null() {
        return None;
    }
    let ptr = *(*f).extended_data.add(index);
    if ptr.is_null() {
        return None;
    }
    Some((ptr, (*f).linesize[0].max(0) as usize))
}

/// Bytes of audio plane `index`; empty when out of range.
pub fn audio_plane_data(frame: &ffmpeg::util::frame::Audio, index: usize) -> &[u8] {
    let planar = frame.format().is_planar();
    // SAFETY: the frame owns its planes for the lifetime of the borrow.
    unsafe {
        match plane_ptr(frame.as_ptr(), planar, index) {
            Some((ptr, len)) => std::slice::from_raw_parts(ptr, len),
            None => &[],
        }
    }
}

/// Mutable bytes of audio plane `index`; empty when out of range.
pub fn audio_plane_data_mut(frame: &mut ffmpeg::util::frame::Audio, index: usize) -> &mut [u8] {
    let planar = frame.format().is_planar();
    // SAFETY: as above; `&mut frame` makes the slice exclusive.
    unsafe {
        match plane_ptr(frame.as_mut_ptr(), planar, index) {
            Some((ptr, len)) => std::slice::from_raw_parts_mut(ptr, len),
            None => &mut [],
        }
    }
}

/// Bytes of valid sample data in each plane of `frame`.
pub fn plane_len(frame: &ffmpeg::util::frame::Audio) -> usize {
    let per_sample = frame.format().bytes();
    if frame.format().is_planar() {
        frame.samples() * per_sample
    } else {
        frame.samples() * per_sample * frame.channels() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg::util::channel_layout::ChannelLayout;
    use ffmpeg::util::format::sample::{Sample, Type};

    #[test]
    fn test_planar_planes() {
        let mut frame = ffmpeg::util::frame::Audio::new(
            Sample::I16(Type::Planar),
            1152,
            ChannelLayout::STEREO,
        );
        assert_eq!(plane_len(&frame), 1152 * 2);
        assert!(audio_plane_data(&frame, 0).len() >= 1152 * 2);
        assert!(audio_plane_data(&frame, 1).len() >= 1152 * 2);
        assert!(audio_plane_data(&frame, 2).is_empty());

        audio_plane_data_mut(&mut frame, 1)[0] = 7;
        assert_eq!(audio_plane_data(&frame, 1)[0], 7);
    }

    #[test]
    fn test_packed_single_plane() {
        let frame = ffmpeg::util::frame::Audio::new(
            Sample::I16(Type::Packed),
            100,
            ChannelLayout::STEREO,
        );
        assert_eq!(plane_len(&frame), 100 * 2 * 2);
        assert!(audio_plane_data(&frame, 1).is_empty());
    }
}
